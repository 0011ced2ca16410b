//! # Frame Composer
//!
//! Turns one tick's [`Frame`] into positioned text and draws it onto a
//! [`DisplaySurface`]. Layout is computed separately from drawing
//! ([`FrameComposer::layout`]) so positions can be checked without pixels.
//!
//! ## Status Layout (64x64)
//!
//! ```text
//!  +--------------------------------+
//!  |            4diena              |  day font, centered
//!  |           (15.03)              |  date font, centered
//!  |  14:05                         |  time font, left
//!  |                                |
//!  |  22 C                   55%    |  climate font, left / right
//!  +--------------------------------+
//! ```
//!
//! Rows are stacked from the fonts' baselines, so a taller day or date font
//! pushes the rows beneath it down. Centering uses the width of the font's
//! `M` glyph for every character.
//!
//! ## Brightness Overlay
//!
//! Two centered lines, the "Brightness" label and the new level, drawn instead
//! of the status layout.

use embedded_graphics::pixelcolor::Rgb888;

use crate::config::FontRole;
use crate::display::DisplaySurface;
use crate::font::FontSet;
use crate::{BrightnessLevel, EnvironmentReading, Frame, TimeSnapshot};

/// Weekday labels indexed by `TimeSnapshot::weekday` (0 = Sunday).
pub const WEEKDAYS: [&str; 7] = [
    "7diena", "1diena", "2diena", "3diena", "4diena", "5diena", "6diena",
];

pub const OVERLAY_LABEL: &str = "Brightness";

/// Text colors of the two layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub day: Rgb888,
    pub date: Rgb888,
    pub time: Rgb888,
    pub temperature: Rgb888,
    pub humidity: Rgb888,
    pub overlay_label: Rgb888,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            day: Rgb888::new(100, 10, 10),
            date: Rgb888::new(255, 255, 0),
            time: Rgb888::new(0, 100, 0),
            temperature: Rgb888::new(255, 100, 0),
            humidity: Rgb888::new(0, 179, 255),
            overlay_label: Rgb888::new(255, 255, 255),
        }
    }
}

/// One text draw: content, font, baseline-anchored position, color and
/// extra spacing between glyphs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextItem {
    pub text: String,
    pub font: FontRole,
    pub x: i32,
    pub y: i32,
    pub color: Rgb888,
    pub spacing: i32,
}

/// Left edge that centers `chars` glyphs of `glyph_width` on a panel
/// `panel_width` wide. Text wider than the panel starts at 0.
pub fn center_x(panel_width: i32, chars: usize, glyph_width: i32) -> i32 {
    (panel_width / 2 - (chars as i32 * glyph_width) / 2).max(0)
}

/// Weekday label for `index`, `"?"` outside 0..=6.
pub fn weekday_label(index: u8) -> &'static str {
    WEEKDAYS.get(index as usize).copied().unwrap_or("?")
}

/// Temperature and humidity strings, placeholders when the sensor failed.
pub fn climate_text(environment: &EnvironmentReading) -> (String, String) {
    match environment.measurement() {
        Some(m) => (
            format!("{} C", m.temperature),
            format!("{}%", m.humidity),
        ),
        None => ("-- C".to_string(), "--%".to_string()),
    }
}

pub struct FrameComposer {
    fonts: FontSet,
    palette: Palette,
    panel_width: i32,
}

impl FrameComposer {
    pub fn new(fonts: FontSet, palette: Palette, panel_width: u32) -> Self {
        Self {
            fonts,
            palette,
            panel_width: panel_width as i32,
        }
    }

    /// Positioned text for `frame`, in draw order.
    pub fn layout(&self, frame: &Frame) -> Vec<TextItem> {
        match frame {
            Frame::Status { time, environment } => self.status_layout(time, environment),
            Frame::BrightnessOverlay { level } => self.overlay_layout(*level),
        }
    }

    /// Draw `frame` onto the surface's off-screen buffer.
    pub fn compose<S: DisplaySurface>(&self, surface: &mut S, frame: &Frame) {
        for item in self.layout(frame) {
            surface.draw_text(
                self.fonts.get(item.font),
                item.x,
                item.y,
                item.color,
                &item.text,
                item.spacing,
            );
        }
    }

    fn centered(&self, role: FontRole, text: &str) -> i32 {
        let width = self.fonts.get(role).reference_width();
        center_x(self.panel_width, text.chars().count(), width)
    }

    fn status_layout(&self, time: &TimeSnapshot, environment: &EnvironmentReading) -> Vec<TextItem> {
        let day = &self.fonts.day;
        let date = &self.fonts.date;
        let clock = &self.fonts.time;
        let climate = &self.fonts.climate;

        let day_text = weekday_label(time.weekday).to_string();
        let date_text = format!("({})", time.date);
        let (temperature_text, humidity_text) = climate_text(environment);

        let climate_y = 51 + climate.baseline();
        let humidity_x = self.panel_width
            - 4
            - humidity_text.chars().count() as i32 * climate.reference_width();

        vec![
            TextItem {
                x: self.centered(FontRole::Day, &day_text),
                y: 1 + day.baseline(),
                text: day_text,
                font: FontRole::Day,
                color: self.palette.day,
                spacing: 0,
            },
            TextItem {
                x: self.centered(FontRole::Date, &date_text),
                y: 2 + day.baseline() + date.baseline(),
                text: date_text,
                font: FontRole::Date,
                color: self.palette.date,
                spacing: 0,
            },
            TextItem {
                text: time.time.clone(),
                font: FontRole::Time,
                x: 2,
                y: 5 + date.baseline() + clock.baseline(),
                color: self.palette.time,
                spacing: -1,
            },
            TextItem {
                text: temperature_text,
                font: FontRole::Climate,
                x: 2,
                y: climate_y,
                color: self.palette.temperature,
                spacing: 0,
            },
            TextItem {
                text: humidity_text,
                font: FontRole::Climate,
                x: humidity_x,
                y: climate_y,
                color: self.palette.humidity,
                spacing: 1,
            },
        ]
    }

    fn overlay_layout(&self, level: BrightnessLevel) -> Vec<TextItem> {
        let label_y = 16 + self.fonts.date.baseline();
        let value_text = level.to_string();

        vec![
            TextItem {
                text: OVERLAY_LABEL.to_string(),
                font: FontRole::Date,
                x: self.centered(FontRole::Date, OVERLAY_LABEL),
                y: label_y,
                color: self.palette.overlay_label,
                spacing: 0,
            },
            TextItem {
                x: self.centered(FontRole::Time, &value_text),
                y: label_y + 6 + self.fonts.time.baseline(),
                text: value_text,
                font: FontRole::Time,
                color: self.palette.time,
                spacing: -1,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{BitmapFont, TEST_FONT};

    fn composer() -> FrameComposer {
        let font = BitmapFont::parse(TEST_FONT).unwrap();
        let fonts = FontSet {
            day: font.clone(),
            date: font.clone(),
            time: font.clone(),
            climate: font,
        };
        FrameComposer::new(fonts, Palette::default(), 64)
    }

    #[test]
    fn test_center_x_formula() {
        assert_eq!(center_x(64, 6, 8), 32 - 24);
        assert_eq!(center_x(64, 7, 6), 32 - 21);
        assert_eq!(center_x(64, 0, 8), 32);
        assert_eq!(center_x(64, 5, 5), 32 - 12);
    }

    #[test]
    fn test_center_x_never_negative_for_expected_lengths() {
        // 8x13B and 6x13B are the widest fonts on the status layout
        for glyph_width in [6, 8] {
            for chars in 0..=7 {
                let x = center_x(64, chars, glyph_width);
                assert_eq!(x, 32 - (chars as i32 * glyph_width) / 2);
                assert!(x >= 0);
            }
        }
        assert_eq!(center_x(64, 20, 8), 0);
    }

    #[test]
    fn test_weekday_table() {
        for index in 0..7u8 {
            assert_eq!(weekday_label(index), WEEKDAYS[index as usize]);
        }
        assert_eq!(weekday_label(0), "7diena");
        assert_eq!(weekday_label(3), "3diena");
        assert_eq!(weekday_label(7), "?");
    }

    #[test]
    fn test_climate_placeholders() {
        assert_eq!(
            climate_text(&EnvironmentReading::valid(22, 55)),
            ("22 C".to_string(), "55%".to_string())
        );
        assert_eq!(
            climate_text(&EnvironmentReading::valid(0, 0)),
            ("0 C".to_string(), "0%".to_string())
        );
        assert_eq!(
            climate_text(&EnvironmentReading::Unavailable),
            ("-- C".to_string(), "--%".to_string())
        );
    }

    #[test]
    fn test_status_layout_positions() {
        let composer = composer();
        let frame = Frame::Status {
            time: TimeSnapshot {
                weekday: 3,
                date: "15.03".to_string(),
                time: "14:05".to_string(),
            },
            environment: EnvironmentReading::valid(22, 55),
        };

        let items = composer.layout(&frame);
        let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["3diena", "(15.03)", "14:05", "22 C", "55%"]);

        // Test font: baseline 5, 'M' width 4
        let positions: Vec<(i32, i32)> = items.iter().map(|i| (i.x, i.y)).collect();
        assert_eq!(
            positions,
            vec![
                (32 - 12, 6),
                (32 - 14, 12),
                (2, 15),
                (2, 56),
                (64 - 4 - 12, 56),
            ]
        );
        assert_eq!(items[2].spacing, -1);
        assert_eq!(items[4].spacing, 1);
        assert_eq!(items[0].color, Rgb888::new(100, 10, 10));
    }

    #[test]
    fn test_overlay_layout() {
        let composer = composer();
        let frame = Frame::BrightnessOverlay {
            level: BrightnessLevel::new(100).unwrap(),
        };

        let items = composer.layout(&frame);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "Brightness");
        assert_eq!(items[0].x, 32 - 20);
        assert_eq!(items[0].y, 21);
        assert_eq!(items[1].text, "100");
        assert_eq!(items[1].x, 32 - 6);
        assert_eq!(items[1].y, 32);
    }
}
