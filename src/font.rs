//! # BDF Bitmap Fonts
//!
//! The panel text uses the same X11 BDF fonts as the stock LED matrix tools
//! (`8x13B.bdf`, `6x13B.bdf`, `texgyre-27.bdf`). This module parses the subset
//! of BDF those fonts use and draws glyphs onto any embedded-graphics
//! [`DrawTarget`] with an [`Rgb888`] color.
//!
//! ## Metrics
//!
//! - **Baseline**: font bounding box height plus its (negative) y offset, i.e.
//!   the number of pixel rows above the baseline
//! - **Character width**: the glyph's `DWIDTH`, the distance the pen moves
//! - **Text origin**: `y` passed to [`BitmapFont::draw_text`] is the baseline
//!   row, not the top of the text

use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::config::{FontConfig, FontRole};
use crate::error::StartupError;

/// Glyph every font must contain; its width drives text centering.
pub const REFERENCE_GLYPH: char = 'M';

/// Drawn in place of characters the font lacks, when the font has it.
pub const REPLACEMENT_GLYPH: char = '\u{FFFD}';

#[derive(Error, Debug)]
pub enum FontError {
    #[error("font file: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("font has no '{}' glyph", REFERENCE_GLYPH)]
    MissingReferenceGlyph,
}

#[derive(Clone, Debug)]
struct Glyph {
    device_width: i32,
    width: u32,
    height: u32,
    y_offset: i32,
    /// One entry per row, left-most pixel in the most significant bit of byte 0
    rows: Vec<Vec<u8>>,
}

impl Glyph {
    fn is_set(&self, x: u32, y: u32) -> bool {
        self.rows
            .get(y as usize)
            .and_then(|row| row.get((x / 8) as usize))
            .map(|byte| byte & (0x80 >> (x % 8)) != 0)
            .unwrap_or(false)
    }
}

/// A parsed BDF font.
#[derive(Clone, Debug)]
pub struct BitmapFont {
    height: u32,
    baseline: i32,
    glyphs: HashMap<char, Glyph>,
}

impl BitmapFont {
    /// Read and parse a BDF file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FontError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse BDF source text.
    pub fn parse(source: &str) -> Result<Self, FontError> {
        let mut bounding_box: Option<(u32, i32)> = None;
        let mut ascent: Option<i32> = None;
        let mut glyphs = HashMap::new();
        let mut current: Option<(Option<char>, Glyph)> = None;
        let mut bitmap_rows: Option<usize> = None;

        for (index, raw) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            // Inside BITMAP every line up to ENDCHAR is a hex row
            if let (Some(remaining), Some((_, glyph))) = (bitmap_rows, current.as_mut()) {
                if line != "ENDCHAR" {
                    if remaining == 0 {
                        return Err(parse_error(line_no, "more bitmap rows than BBX height"));
                    }
                    glyph.rows.push(parse_hex_row(line, line_no)?);
                    bitmap_rows = Some(remaining - 1);
                    continue;
                }
            }

            let mut fields = line.split_whitespace();
            let keyword = fields.next().unwrap_or_default();
            let values: Vec<&str> = fields.collect();

            match keyword {
                "FONTBOUNDINGBOX" => {
                    let [_, height, _, y_offset] = parse_ints::<4>(&values, line_no)?;
                    if height < 0 {
                        return Err(parse_error(line_no, "negative font height"));
                    }
                    bounding_box = Some((height as u32, y_offset));
                }
                "FONT_ASCENT" => {
                    let [value] = parse_ints::<1>(&values, line_no)?;
                    ascent = Some(value);
                }
                "STARTCHAR" => {
                    current = Some((
                        None,
                        Glyph {
                            device_width: 0,
                            width: 0,
                            height: 0,
                            y_offset: 0,
                            rows: Vec::new(),
                        },
                    ));
                }
                "ENCODING" => {
                    let [code] = parse_ints::<1>(&values, line_no)?;
                    if let Some((encoding, _)) = current.as_mut() {
                        *encoding = u32::try_from(code).ok().and_then(char::from_u32);
                    }
                }
                "DWIDTH" => {
                    let [width, _] = parse_ints::<2>(&values, line_no)?;
                    if let Some((_, glyph)) = current.as_mut() {
                        glyph.device_width = width;
                    }
                }
                "BBX" => {
                    // The x offset is not used when drawing, as in the panel tools
                    let [width, height, _, y_offset] = parse_ints::<4>(&values, line_no)?;
                    if width < 0 || height < 0 {
                        return Err(parse_error(line_no, "negative glyph size"));
                    }
                    if let Some((_, glyph)) = current.as_mut() {
                        glyph.width = width as u32;
                        glyph.height = height as u32;
                        glyph.y_offset = y_offset;
                    }
                }
                "BITMAP" => {
                    let Some((_, glyph)) = current.as_ref() else {
                        return Err(parse_error(line_no, "BITMAP outside STARTCHAR"));
                    };
                    bitmap_rows = Some(glyph.height as usize);
                }
                "ENDCHAR" => {
                    let Some((encoding, glyph)) = current.take() else {
                        return Err(parse_error(line_no, "ENDCHAR without STARTCHAR"));
                    };
                    if bitmap_rows.take().unwrap_or(0) != 0 {
                        return Err(parse_error(line_no, "fewer bitmap rows than BBX height"));
                    }
                    // Glyphs with ENCODING -1 have no code point and are unusable
                    if let Some(ch) = encoding {
                        glyphs.insert(ch, glyph);
                    }
                }
                _ => {}
            }
        }

        let (height, baseline) = match (bounding_box, ascent) {
            (Some((height, y_offset)), _) => (height, height as i32 + y_offset),
            (None, Some(ascent)) => (ascent.max(0) as u32, ascent),
            (None, None) => return Err(parse_error(0, "missing FONTBOUNDINGBOX")),
        };

        Ok(BitmapFont {
            height,
            baseline,
            glyphs,
        })
    }

    /// Rows above the baseline.
    pub fn baseline(&self) -> i32 {
        self.baseline
    }

    /// Height of the font bounding box.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Advance width of `ch`, or `None` if the font has no such glyph.
    pub fn character_width(&self, ch: char) -> Option<i32> {
        self.glyphs.get(&ch).map(|glyph| glyph.device_width)
    }

    /// Width of [`REFERENCE_GLYPH`], used as the per-character width when centering.
    pub fn reference_width(&self) -> i32 {
        self.character_width(REFERENCE_GLYPH).unwrap_or(0)
    }

    /// Glyph for `ch`, falling back to [`REPLACEMENT_GLYPH`].
    fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs
            .get(&ch)
            .or_else(|| self.glyphs.get(&REPLACEMENT_GLYPH))
    }

    /// Draw one glyph with its left edge at `x` and its baseline at `y`.
    /// Returns the advance width, 0 when neither `ch` nor the replacement
    /// glyph exists.
    pub fn draw_glyph<D>(
        &self,
        target: &mut D,
        x: i32,
        y: i32,
        color: Rgb888,
        ch: char,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let Some(glyph) = self.glyph(ch) else {
            return Ok(0);
        };

        let top = y - glyph.height as i32 - glyph.y_offset;
        let left = x;
        let pixels = (0..glyph.height).flat_map(|row| {
            (0..glyph.width)
                .filter(move |&column| glyph.is_set(column, row))
                .map(move |column| {
                    Pixel(Point::new(left + column as i32, top + row as i32), color)
                })
        });
        target.draw_iter(pixels)?;

        Ok(glyph.device_width)
    }

    /// Draw `text` with its baseline at `y`, adding `spacing` pixels after
    /// every character. Characters missing from the font draw the replacement
    /// glyph, or advance by `spacing` alone if there is none. Returns the
    /// total horizontal advance.
    pub fn draw_text<D>(
        &self,
        target: &mut D,
        x: i32,
        y: i32,
        color: Rgb888,
        text: &str,
        spacing: i32,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let mut pen = x;
        for ch in text.chars() {
            pen += self.draw_glyph(target, pen, y, color, ch)? + spacing;
        }
        Ok(pen - x)
    }
}

/// The four fonts of the status layout.
#[derive(Clone, Debug)]
pub struct FontSet {
    pub day: BitmapFont,
    pub date: BitmapFont,
    pub time: BitmapFont,
    pub climate: BitmapFont,
}

impl FontSet {
    /// Load all fonts named in the config. Fails on the first font that is
    /// missing, malformed or lacks the reference glyph.
    pub fn load(config: &FontConfig) -> Result<Self, StartupError> {
        let load = |role: FontRole| {
            let path = config.path(role);
            let font = BitmapFont::load(&path)
                .and_then(|font| {
                    if font.character_width(REFERENCE_GLYPH).is_some() {
                        Ok(font)
                    } else {
                        Err(FontError::MissingReferenceGlyph)
                    }
                })
                .map_err(|source| StartupError::Font {
                    path: path.clone(),
                    source,
                })?;
            log::debug!("Loaded font {}", path.display());
            Ok::<_, StartupError>(font)
        };

        Ok(FontSet {
            day: load(FontRole::Day)?,
            date: load(FontRole::Date)?,
            time: load(FontRole::Time)?,
            climate: load(FontRole::Climate)?,
        })
    }

    pub fn get(&self, role: FontRole) -> &BitmapFont {
        match role {
            FontRole::Day => &self.day,
            FontRole::Date => &self.date,
            FontRole::Time => &self.time,
            FontRole::Climate => &self.climate,
        }
    }
}

fn parse_error(line: usize, reason: &str) -> FontError {
    FontError::Parse {
        line,
        reason: reason.to_string(),
    }
}

fn parse_ints<const N: usize>(values: &[&str], line: usize) -> Result<[i32; N], FontError> {
    if values.len() < N {
        return Err(parse_error(line, &format!("expected {} numbers", N)));
    }
    let mut out = [0; N];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value
            .parse()
            .map_err(|_| parse_error(line, &format!("invalid number '{}'", value)))?;
    }
    Ok(out)
}

fn parse_hex_row(line: &str, line_no: usize) -> Result<Vec<u8>, FontError> {
    if line.len() % 2 != 0 || !line.is_ascii() {
        return Err(parse_error(line_no, "bitmap row is not whole hex bytes"));
    }
    (0..line.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&line[i..i + 2], 16)
                .map_err(|_| parse_error(line_no, "invalid hex in bitmap row"))
        })
        .collect()
}

/// A tiny 4x6 font with 'M', '1' and ':' used across the crate's tests.
#[cfg(test)]
pub(crate) const TEST_FONT: &str = "\
STARTFONT 2.1
FONT -test-fixed-medium-r-normal--6-60-75-75-c-40-iso10646-1
SIZE 6 75 75
FONTBOUNDINGBOX 4 6 0 -1
STARTPROPERTIES 2
FONT_ASCENT 5
FONT_DESCENT 1
ENDPROPERTIES
CHARS 3
STARTCHAR M
ENCODING 77
SWIDTH 666 0
DWIDTH 4 0
BBX 4 6 0 -1
BITMAP
90
F0
F0
90
90
00
ENDCHAR
STARTCHAR one
ENCODING 49
SWIDTH 666 0
DWIDTH 4 0
BBX 4 6 0 -1
BITMAP
20
60
20
20
70
00
ENDCHAR
STARTCHAR colon
ENCODING 58
SWIDTH 333 0
DWIDTH 2 0
BBX 1 6 0 -1
BITMAP
00
80
00
80
00
00
ENDCHAR
ENDFONT
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Framebuffer;
    use std::io::Write;
    use tempfile::TempDir;

    const RED: Rgb888 = Rgb888::new(255, 0, 0);

    #[test]
    fn test_parse_metrics() {
        let font = BitmapFont::parse(TEST_FONT).unwrap();
        assert_eq!(font.height(), 6);
        assert_eq!(font.baseline(), 5);
        assert_eq!(font.character_width('M'), Some(4));
        assert_eq!(font.character_width(':'), Some(2));
        assert_eq!(font.character_width('Z'), None);
        assert_eq!(font.reference_width(), 4);
    }

    #[test]
    fn test_glyph_lands_above_baseline() {
        let font = BitmapFont::parse(TEST_FONT).unwrap();
        let mut frame = Framebuffer::new(16, 16);

        let advance = font.draw_glyph(&mut frame, 2, 8, RED, 'M').unwrap();
        assert_eq!(advance, 4);

        // BBX 4x6 with y offset -1: top row sits at 8 - 6 + 1 = 3
        assert_eq!(frame.pixel(2, 3), Some(RED));
        assert_eq!(frame.pixel(5, 3), Some(RED));
        assert_eq!(frame.pixel(3, 3), Some(Rgb888::BLACK));
        assert_eq!(frame.pixel(3, 4), Some(RED));
        assert_eq!(frame.pixel(2, 2), Some(Rgb888::BLACK));
    }

    #[test]
    fn test_draw_text_applies_spacing_to_every_char() {
        let font = BitmapFont::parse(TEST_FONT).unwrap();
        let mut frame = Framebuffer::new(32, 8);

        assert_eq!(font.draw_text(&mut frame, 0, 6, RED, "MM", 0).unwrap(), 8);
        assert_eq!(font.draw_text(&mut frame, 0, 6, RED, "MM", 1).unwrap(), 10);
        assert_eq!(font.draw_text(&mut frame, 0, 6, RED, "M1", -1).unwrap(), 6);
        // No 'x' and no replacement glyph: only the spacing advances
        assert_eq!(font.draw_text(&mut frame, 0, 6, RED, "MxM", 0).unwrap(), 8);
        assert_eq!(font.draw_text(&mut frame, 0, 6, RED, "MxM", 1).unwrap(), 11);
        assert_eq!(font.draw_text(&mut frame, 0, 6, RED, "", 0).unwrap(), 0);
    }

    #[test]
    fn test_missing_char_uses_replacement_glyph() {
        // Solid 2x2 box at code point 0xFFFD with a BBX x offset of 3
        let replacement = "STARTCHAR uniFFFD\nENCODING 65533\nDWIDTH 3 0\nBBX 2 2 3 0\nBITMAP\nC0\nC0\nENDCHAR\nENDFONT\n";
        let font = BitmapFont::parse(&TEST_FONT.replace("ENDFONT\n", replacement)).unwrap();
        let mut frame = Framebuffer::new(16, 8);

        assert_eq!(font.draw_text(&mut frame, 4, 6, RED, "x", 0).unwrap(), 3);
        // Drawn from the pen position; the x offset is ignored
        assert_eq!(frame.pixel(4, 4), Some(RED));
        assert_eq!(frame.pixel(5, 5), Some(RED));
        assert_eq!(frame.pixel(7, 4), Some(Rgb888::BLACK));
        assert_eq!(frame.lit_pixels(), 4);
    }

    #[test]
    fn test_text_clipped_at_panel_edge() {
        let font = BitmapFont::parse(TEST_FONT).unwrap();
        let mut frame = Framebuffer::new(4, 4);

        // Must not panic when most of the glyph falls outside the buffer
        font.draw_text(&mut frame, -2, 2, RED, "M1", 0).unwrap();
        assert_eq!(frame.pixel(1, 0), Some(RED));
    }

    #[test]
    fn test_parse_errors_report_line() {
        let broken = TEST_FONT.replace("DWIDTH 4 0", "DWIDTH four 0");
        match BitmapFont::parse(&broken) {
            Err(FontError::Parse { line, .. }) => assert_eq!(line, 13),
            other => panic!("expected parse error, got {:?}", other),
        }

        let short = TEST_FONT.replacen("90\n90\n00\nENDCHAR", "90\nENDCHAR", 1);
        assert!(matches!(
            BitmapFont::parse(&short),
            Err(FontError::Parse { .. })
        ));

        assert!(BitmapFont::parse("STARTFONT 2.1\nENDFONT\n").is_err());
    }

    #[test]
    fn test_font_set_reports_failing_path() {
        let dir = TempDir::new().unwrap();
        let mut config = FontConfig {
            root: dir.path().to_path_buf(),
            ..FontConfig::default()
        };
        config.day = "day.bdf".to_string();
        config.date = "small.bdf".to_string();
        config.time = "missing.bdf".to_string();
        config.climate = "small.bdf".to_string();

        for name in ["day.bdf", "small.bdf"] {
            let mut file = fs::File::create(dir.path().join(name)).unwrap();
            file.write_all(TEST_FONT.as_bytes()).unwrap();
        }

        match FontSet::load(&config) {
            Err(StartupError::Font { path, .. }) => {
                assert_eq!(path, dir.path().join("missing.bdf"))
            }
            other => panic!("expected font error, got {:?}", other.map(|_| ())),
        }

        config.time = "small.bdf".to_string();
        let fonts = FontSet::load(&config).unwrap();
        assert_eq!(fonts.get(FontRole::Time).baseline(), 5);
    }

    #[test]
    fn test_font_without_reference_glyph_rejected() {
        let dir = TempDir::new().unwrap();
        let no_m = TEST_FONT.replace("ENCODING 77", "ENCODING 78");
        fs::write(dir.path().join("n.bdf"), no_m).unwrap();
        let config = FontConfig {
            root: dir.path().to_path_buf(),
            day: "n.bdf".to_string(),
            date: "n.bdf".to_string(),
            time: "n.bdf".to_string(),
            climate: "n.bdf".to_string(),
        };

        assert!(matches!(
            FontSet::load(&config),
            Err(StartupError::Font {
                source: FontError::MissingReferenceGlyph,
                ..
            })
        ));
    }
}
