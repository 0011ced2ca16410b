//! # Display Surface
//!
//! The panel is double buffered: the loop draws into an off-screen
//! [`Framebuffer`] while the panel shows the previous one, then the two are
//! exchanged on vertical sync.
//!
//! ## Ownership
//!
//! [`Panel::swap_on_vsync`] takes the finished framebuffer by value and hands
//! back the buffer that becomes the next off-screen target. [`FrameSurface`]
//! keeps exactly one off-screen buffer at a time and never draws into a buffer
//! the panel still owns.
//!
//! ## Panels
//!
//! - [`TerminalPanel`]: development mode, prints each frame as text
//! - [`MemoryPanel`]: keeps the last frame in memory (tests, headless runs)
//! - `LedMatrixPanel`: the real HUB75 matrix (`hardware` feature, Linux only)

use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use std::convert::Infallible;
use std::io::{self, Write};

use crate::font::BitmapFont;
use crate::BrightnessLevel;

/// Width x height grid of RGB pixels, row major.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgb888>,
}

impl Framebuffer {
    /// A black framebuffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb888::BLACK; width as usize * height as usize],
        }
    }

    /// Set every pixel to black.
    pub fn clear(&mut self) {
        self.pixels.fill(Rgb888::BLACK);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color at `(x, y)`, `None` outside the buffer.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb888> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Number of pixels that are not black.
    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&p| p != Rgb888::BLACK).count()
    }

    /// Iterate rows of pixels top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Rgb888]> {
        self.pixels.chunks(self.width.max(1) as usize)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Framebuffer {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            // Text running off the panel edge is clipped, not an error
            if let Some(i) = self.index(point.x, point.y) {
                self.pixels[i] = color;
            }
        }
        Ok(())
    }
}

/// Physical (or simulated) panel that shows one framebuffer at a time.
pub trait Panel {
    /// Show `frame` at the next vertical sync and return the buffer to draw
    /// the following frame into.
    fn swap_on_vsync(&mut self, frame: Framebuffer) -> Framebuffer;

    /// Brightness in percent.
    fn set_brightness(&mut self, percent: u8);

    fn brightness(&self) -> u8;

    /// Visible pixels as (width, height).
    fn size(&self) -> (u32, u32);
}

/// What the composer and the loop need from the display.
pub trait DisplaySurface {
    /// Black out the off-screen buffer.
    fn clear(&mut self);

    /// Draw text into the off-screen buffer with its baseline at `y`.
    /// Returns the horizontal advance.
    fn draw_text(
        &mut self,
        font: &BitmapFont,
        x: i32,
        y: i32,
        color: Rgb888,
        text: &str,
        spacing: i32,
    ) -> i32;

    fn set_brightness(&mut self, level: BrightnessLevel);

    fn brightness(&self) -> BrightnessLevel;

    /// Swap the off-screen buffer onto the panel.
    fn present(&mut self);
}

/// Double-buffered [`DisplaySurface`] over any [`Panel`].
pub struct FrameSurface<P> {
    panel: P,
    offscreen: Framebuffer,
    brightness: BrightnessLevel,
}

impl<P: Panel> FrameSurface<P> {
    pub fn new(mut panel: P, brightness: BrightnessLevel) -> Self {
        let (width, height) = panel.size();
        panel.set_brightness(brightness.percent());
        Self {
            panel,
            offscreen: Framebuffer::new(width, height),
            brightness,
        }
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    /// The buffer the next frame is drawn into.
    pub fn offscreen(&self) -> &Framebuffer {
        &self.offscreen
    }
}

impl<P: Panel> DisplaySurface for FrameSurface<P> {
    fn clear(&mut self) {
        self.offscreen.clear();
    }

    fn draw_text(
        &mut self,
        font: &BitmapFont,
        x: i32,
        y: i32,
        color: Rgb888,
        text: &str,
        spacing: i32,
    ) -> i32 {
        match font.draw_text(&mut self.offscreen, x, y, color, text, spacing) {
            Ok(advance) => advance,
            Err(never) => match never {},
        }
    }

    fn set_brightness(&mut self, level: BrightnessLevel) {
        self.brightness = level;
        self.panel.set_brightness(level.percent());
    }

    fn brightness(&self) -> BrightnessLevel {
        self.brightness
    }

    fn present(&mut self) {
        let finished = std::mem::take(&mut self.offscreen);
        self.offscreen = self.panel.swap_on_vsync(finished);
    }
}

/// Keeps the on-screen frame in memory.
#[derive(Debug)]
pub struct MemoryPanel {
    onscreen: Framebuffer,
    brightness: u8,
    swaps: usize,
}

impl MemoryPanel {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            onscreen: Framebuffer::new(width, height),
            brightness: 0,
            swaps: 0,
        }
    }

    /// The frame currently "visible".
    pub fn onscreen(&self) -> &Framebuffer {
        &self.onscreen
    }

    pub fn swaps(&self) -> usize {
        self.swaps
    }
}

impl Panel for MemoryPanel {
    fn swap_on_vsync(&mut self, frame: Framebuffer) -> Framebuffer {
        self.swaps += 1;
        std::mem::replace(&mut self.onscreen, frame)
    }

    fn set_brightness(&mut self, percent: u8) {
        self.brightness = percent;
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }

    fn size(&self) -> (u32, u32) {
        (self.onscreen.width(), self.onscreen.height())
    }
}

/// Development panel: writes every presented frame to a text stream.
///
/// Lit pixels are drawn as `#`, dark ones as `.`, followed by a status line
/// with the brightness.
pub struct TerminalPanel<W: Write> {
    out: W,
    spare: Framebuffer,
    brightness: u8,
}

impl TerminalPanel<io::Stdout> {
    pub fn stdout(width: u32, height: u32) -> Self {
        Self::new(io::stdout(), width, height)
    }
}

impl<W: Write> TerminalPanel<W> {
    pub fn new(out: W, width: u32, height: u32) -> Self {
        Self {
            out,
            spare: Framebuffer::new(width, height),
            brightness: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, frame: &Framebuffer) -> io::Result<()> {
        // Home the cursor so successive frames overwrite each other
        write!(self.out, "\x1b[H")?;
        for row in frame.rows() {
            let line: String = row
                .iter()
                .map(|&p| if p == Rgb888::BLACK { '.' } else { '#' })
                .collect();
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out, "brightness {:>3}%", self.brightness)?;
        self.out.flush()
    }
}

impl<W: Write> Panel for TerminalPanel<W> {
    fn swap_on_vsync(&mut self, frame: Framebuffer) -> Framebuffer {
        if let Err(e) = self.render(&frame) {
            log::warn!("terminal panel write failed: {}", e);
        }
        std::mem::replace(&mut self.spare, frame)
    }

    fn set_brightness(&mut self, percent: u8) {
        self.brightness = percent;
    }

    fn brightness(&self) -> u8 {
        self.brightness
    }

    fn size(&self) -> (u32, u32) {
        (self.spare.width(), self.spare.height())
    }
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
pub use self::hardware::LedMatrixPanel;

#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hardware {
    use super::{Framebuffer, Panel};
    use crate::config::PanelConfig;
    use crate::error::StartupError;
    use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
    use rpi_led_matrix::{LedCanvas, LedColor, LedMatrix, LedMatrixOptions, LedRuntimeOptions};

    /// HUB75 panel driven through the rpi-rgb-led-matrix library.
    ///
    /// Brightness is applied by scaling each channel while copying the
    /// framebuffer onto the matrix canvas.
    pub struct LedMatrixPanel {
        matrix: LedMatrix,
        canvas: Option<LedCanvas>,
        width: u32,
        height: u32,
        brightness: u8,
    }

    impl LedMatrixPanel {
        pub fn new(config: &PanelConfig) -> Result<Self, StartupError> {
            let mut options = LedMatrixOptions::new();
            options.set_hardware_mapping(&config.hardware_mapping);
            options.set_rows(config.rows);
            options.set_cols(config.cols);
            options.set_chain_length(config.chain_length);
            options.set_parallel(config.parallel);
            // Full PWM range; the configured level is applied per pixel
            options
                .set_brightness(100)
                .map_err(|e| StartupError::Matrix(e.to_string()))?;

            let mut runtime = LedRuntimeOptions::new();
            runtime.set_gpio_slowdown(config.gpio_slowdown);
            runtime.set_drop_privileges(config.drop_privileges);

            let matrix = LedMatrix::new(Some(options), Some(runtime))
                .map_err(|e| StartupError::Matrix(e.to_string()))?;
            let canvas = matrix.offscreen_canvas();

            Ok(Self {
                matrix,
                canvas: Some(canvas),
                width: config.cols * config.chain_length,
                height: config.rows * config.parallel,
                brightness: config.brightness,
            })
        }

        fn scale(&self, channel: u8) -> u8 {
            (u16::from(channel) * u16::from(self.brightness) / 100) as u8
        }
    }

    impl Panel for LedMatrixPanel {
        fn swap_on_vsync(&mut self, frame: Framebuffer) -> Framebuffer {
            let Some(mut canvas) = self.canvas.take() else {
                return frame;
            };
            canvas.clear();
            for (y, row) in frame.rows().enumerate() {
                for (x, pixel) in row.iter().enumerate() {
                    if *pixel == Rgb888::BLACK {
                        continue;
                    }
                    let color = LedColor {
                        red: self.scale(pixel.r()),
                        green: self.scale(pixel.g()),
                        blue: self.scale(pixel.b()),
                    };
                    canvas.set(x as i32, y as i32, &color);
                }
            }
            self.canvas = Some(self.matrix.swap(canvas));
            // Pixels were copied, so the same buffer can be drawn into again
            frame
        }

        fn set_brightness(&mut self, percent: u8) {
            self.brightness = percent.min(100);
        }

        fn brightness(&self) -> u8 {
            self.brightness
        }

        fn size(&self) -> (u32, u32) {
            (self.width, self.height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::TEST_FONT;

    const GREEN: Rgb888 = Rgb888::new(0, 100, 0);

    #[test]
    fn test_framebuffer_clips_and_clears() {
        let mut frame = Framebuffer::new(4, 3);
        frame
            .draw_iter([
                Pixel(Point::new(1, 1), GREEN),
                Pixel(Point::new(-1, 0), GREEN),
                Pixel(Point::new(4, 0), GREEN),
                Pixel(Point::new(0, 3), GREEN),
            ])
            .unwrap();

        assert_eq!(frame.pixel(1, 1), Some(GREEN));
        assert_eq!(frame.lit_pixels(), 1);
        assert_eq!(frame.pixel(4, 0), None);

        frame.clear();
        assert_eq!(frame.lit_pixels(), 0);
    }

    #[test]
    fn test_present_swaps_buffers() {
        let font = BitmapFont::parse(TEST_FONT).unwrap();
        let mut surface = FrameSurface::new(MemoryPanel::new(16, 8), BrightnessLevel::INITIAL);

        surface.draw_text(&font, 0, 6, GREEN, "M", 0);
        let drawn = surface.offscreen().lit_pixels();
        assert!(drawn > 0);

        surface.present();
        assert_eq!(surface.panel().swaps(), 1);
        assert_eq!(surface.panel().onscreen().lit_pixels(), drawn);
        // The buffer handed back is the previously visible (blank) one
        assert_eq!(surface.offscreen().lit_pixels(), 0);

        surface.clear();
        surface.present();
        assert_eq!(surface.panel().onscreen().lit_pixels(), 0);
        assert_eq!(surface.offscreen().lit_pixels(), drawn);
    }

    #[test]
    fn test_brightness_reaches_panel() {
        let mut surface = FrameSurface::new(MemoryPanel::new(8, 8), BrightnessLevel::INITIAL);
        assert_eq!(surface.panel().brightness(), 30);

        for percent in (10..=100).step_by(10) {
            let level = BrightnessLevel::new(percent).unwrap();
            surface.set_brightness(level);
            assert_eq!(surface.brightness(), level);
            assert_eq!(surface.panel().brightness(), percent);
        }
    }

    #[test]
    fn test_terminal_panel_prints_frame() {
        let font = BitmapFont::parse(TEST_FONT).unwrap();
        let panel = TerminalPanel::new(Vec::new(), 6, 6);
        let mut surface = FrameSurface::new(panel, BrightnessLevel::new(50).unwrap());

        surface.draw_text(&font, 0, 5, GREEN, "M", 0);
        surface.present();

        let FrameSurface { panel, .. } = surface;
        let output = String::from_utf8(panel.into_inner()).unwrap();
        let lines: Vec<&str> = output.trim_start_matches("\x1b[H").lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "#..#..");
        assert_eq!(lines[1], "####..");
        assert_eq!(lines[6], "brightness  50%");
    }
}
