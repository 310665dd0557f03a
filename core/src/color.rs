use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::display::{ColorMode, Display, HIRES_HEIGHT, HIRES_WIDTH};

pub const DEFAULT_BACKGROUND_COLOR: Chip8Color = Chip8Color::new(0, 0, 0);
pub const DEFAULT_FOREGROUND_COLOR: Chip8Color = Chip8Color::new(255, 255, 255);
pub const DEFAULT_PLANE2_COLOR: Chip8Color = Chip8Color::new(170, 170, 170);
pub const DEFAULT_BLEND_COLOR: Chip8Color = Chip8Color::new(85, 85, 85);

/// Pixels in a rendered frame, always at the high resolution
pub const FRAME_PIXELS: usize = HIRES_WIDTH * HIRES_HEIGHT;

/// One RGBX8888 pixel, laid out so a slice of them can be handed to SDL as
/// raw texture bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Chip8Color {
    padding: u8,
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Chip8Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Chip8Color {
        Chip8Color { r, g, b, padding: 0 }
    }
}

impl FromStr for Chip8Color {
    type Err = Chip8ColorParseError;

    /// Parses `RRGGBB`, optionally prefixed by `0x` or `#`
    fn from_str(s: &str) -> Result<Chip8Color, Chip8ColorParseError> {
        let err = || Chip8ColorParseError(s.to_string());
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix('#'))
            .unwrap_or(s);

        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        Ok(Chip8Color::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse hex color '{0}'")]
pub struct Chip8ColorParseError(String);

/// Colours indexed by pixel value: background, plane 1, plane 2, both
/// planes. Mono frames only use the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub colors: [Chip8Color; 4],
}

impl Default for Palette {
    fn default() -> Palette {
        Palette {
            colors: [
                DEFAULT_BACKGROUND_COLOR,
                DEFAULT_FOREGROUND_COLOR,
                DEFAULT_PLANE2_COLOR,
                DEFAULT_BLEND_COLOR,
            ],
        }
    }
}

impl Palette {
    pub fn new(
        background: Chip8Color,
        foreground: Chip8Color,
        plane2: Chip8Color,
        blend: Chip8Color,
    ) -> Palette {
        Palette {
            colors: [background, foreground, plane2, blend],
        }
    }

    pub fn color(&self, pixel: u8, mode: ColorMode) -> Chip8Color {
        match mode {
            ColorMode::Mono if pixel & 1 != 0 => self.colors[1],
            ColorMode::Mono => self.colors[0],
            ColorMode::TwoPlane => self.colors[(pixel & 0b11) as usize],
        }
    }

    /// Render the visible screen into a 128x64 frame. Low resolution pixels
    /// are doubled in both directions so the frame size never changes.
    pub fn render(&self, display: &Display, out: &mut [Chip8Color]) {
        let scale = HIRES_WIDTH / display.width();
        let mode = display.color_mode();
        for (idx, dst) in out.iter_mut().take(FRAME_PIXELS).enumerate() {
            let (x, y) = (idx % HIRES_WIDTH, idx / HIRES_WIDTH);
            *dst = self.color(display.get_pixel(x / scale, y / scale), mode);
        }
    }
}

/// View a rendered frame as the raw bytes of an RGBX8888 texture
pub fn frame_bytes(frame: &[Chip8Color]) -> &[u8] {
    bytemuck::cast_slice(frame)
}
