pub const LOWRES_WIDTH: usize = 64;
pub const LOWRES_HEIGHT: usize = 32;
pub const HIRES_WIDTH: usize = 128;
pub const HIRES_HEIGHT: usize = 64;

/// Number of bit planes in XO-CHIP colour mode
pub const PLANE_COUNT: usize = 2;

/// Horizontal scroll distance, in pixels
pub const SCROLL_COLUMNS: usize = 4;

pub type Framebuffer = [[u8; HIRES_WIDTH]; HIRES_HEIGHT];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resolution {
    /// 64x32
    Low,
    /// 128x64
    High,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ColorMode {
    /// 1 bit per pixel
    Mono,
    /// 2 bits per pixel, one per plane
    TwoPlane,
}

/// How sprite pixels that fall off the screen edge are handled
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpriteEdge {
    /// Origin wraps around, pixels past the edge are dropped (CHIP-8)
    WrapOriginClip,
    /// Origin is masked to the screen size, pixels past the edge are dropped (SUPER-CHIP)
    MaskOriginClip,
    /// Every pixel wraps around (XO-CHIP)
    Wrap,
}

/// Framebuffer sized for the largest resolution. Each cell holds two plane
/// bits; in mono mode only bit 0 is ever set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Display {
    fb: Box<Framebuffer>,
    resolution: Resolution,
    color_mode: ColorMode,
    active_planes: u8,
}

impl Default for Display {
    fn default() -> Display {
        Display {
            fb: Box::new([[0u8; HIRES_WIDTH]; HIRES_HEIGHT]),
            resolution: Resolution::Low,
            color_mode: ColorMode::Mono,
            active_planes: 0b01,
        }
    }
}

impl Display {
    pub fn new() -> Display {
        Display::default()
    }

    pub fn clear(&mut self) {
        self.fb.iter_mut().for_each(|row| row.fill(0));
    }

    pub fn width(&self) -> usize {
        match self.resolution {
            Resolution::Low => LOWRES_WIDTH,
            Resolution::High => HIRES_WIDTH,
        }
    }

    pub fn height(&self) -> usize {
        match self.resolution {
            Resolution::Low => LOWRES_HEIGHT,
            Resolution::High => HIRES_HEIGHT,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Switching resolution always wipes the screen
    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
        self.clear();
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Switching colour mode always wipes the screen
    pub fn set_color_mode(&mut self, color_mode: ColorMode) {
        self.color_mode = color_mode;
        self.clear();
    }

    pub fn active_planes(&self) -> u8 {
        self.active_planes
    }

    pub fn set_active_planes(&mut self, mask: u8) {
        self.active_planes = mask & 0b11;
    }

    /// Planes that drawing and scrolling currently touch
    pub fn target_planes(&self) -> u8 {
        match self.color_mode {
            ColorMode::Mono => 0b01,
            ColorMode::TwoPlane => self.active_planes,
        }
    }

    /// Pixel value (0/1 in mono, 0..=3 in colour). Anything outside the
    /// current resolution reads as 0.
    pub fn get_pixel(&self, x: usize, y: usize) -> u8 {
        if x >= self.width() || y >= self.height() {
            return 0;
        }
        self.fb[y][x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, value: u8) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        self.fb[y][x] = value & 0b11;
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.fb
    }

    /// True if any visible pixel is lit
    pub fn any_lit(&self) -> bool {
        let (w, h) = (self.width(), self.height());
        self.fb[..h].iter().any(|row| row[..w].iter().any(|p| *p != 0))
    }

    /// XOR an 8 pixel wide sprite into every target plane. Returns true if
    /// any lit pixel was turned off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, data: &[u8], edge: SpriteEdge) -> bool {
        let mut collision = false;
        for plane in planes_in(self.target_planes()) {
            collision |= self.draw_plane(x, y, data, false, plane, edge);
        }
        collision
    }

    /// XOR a sprite into a single plane (`plane` is the plane's bit, 1 or 2).
    /// Narrow sprites take one byte per row; wide sprites are 16x16 and take
    /// two big-endian bytes per row and always wrap.
    pub fn draw_plane(
        &mut self,
        x: u8,
        y: u8,
        data: &[u8],
        wide: bool,
        plane: u8,
        edge: SpriteEdge,
    ) -> bool {
        let (w, h) = (self.width(), self.height());
        let (ox, oy) = match edge {
            SpriteEdge::MaskOriginClip => (x as usize & (w - 1), y as usize & (h - 1)),
            _ => (x as usize % w, y as usize % h),
        };
        let clip = !wide && edge != SpriteEdge::Wrap;
        let (columns, rows): (usize, Vec<u16>) = if wide {
            let rows = data
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            (16, rows)
        } else {
            (8, data.iter().map(|b| (*b as u16) << 8).collect())
        };

        let mut collision = false;
        for (row, bits) in rows.into_iter().enumerate() {
            let mut py = oy + row;
            if py >= h {
                if clip {
                    break;
                }
                py %= h;
            }

            for column in 0..columns {
                if bits & (0x8000 >> column) == 0 {
                    continue;
                }
                let mut px = ox + column;
                if px >= w {
                    if clip {
                        break;
                    }
                    px %= w;
                }

                let cell = &mut self.fb[py][px];
                if *cell & plane != 0 {
                    collision = true;
                }
                *cell ^= plane;
            }
        }
        collision
    }

    pub fn scroll_up(&mut self, lines: usize) {
        if lines > 0 {
            self.shift(0, -(lines.min(HIRES_HEIGHT) as isize));
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        if lines > 0 {
            self.shift(0, lines.min(HIRES_HEIGHT) as isize);
        }
    }

    pub fn scroll_left(&mut self) {
        self.shift(-(SCROLL_COLUMNS as isize), 0);
    }

    pub fn scroll_right(&mut self) {
        self.shift(SCROLL_COLUMNS as isize, 0);
    }

    /// Move the target planes by (dx, dy) inside the visible area, filling
    /// vacated pixels with 0. Other planes stay put.
    fn shift(&mut self, dx: isize, dy: isize) {
        let mask = self.target_planes();
        let (w, h) = (self.width() as isize, self.height() as isize);
        let src = self.fb.clone();
        for y in 0..h {
            for x in 0..w {
                let (sx, sy) = (x - dx, y - dy);
                let bits = if (0..w).contains(&sx) && (0..h).contains(&sy) {
                    src[sy as usize][sx as usize] & mask
                } else {
                    0
                };
                let cell = &mut self.fb[y as usize][x as usize];
                *cell = (*cell & !mask) | bits;
            }
        }
    }

    pub(crate) fn restore(
        &mut self,
        fb: Framebuffer,
        resolution: Resolution,
        color_mode: ColorMode,
        active_planes: u8,
    ) {
        *self.fb = fb;
        self.resolution = resolution;
        self.color_mode = color_mode;
        self.active_planes = active_planes & 0b11;
    }
}

/// Plane bits (1, 2) present in `mask`, lowest first
pub fn planes_in(mask: u8) -> impl Iterator<Item = u8> {
    (0..PLANE_COUNT as u8)
        .map(|p| 1u8 << p)
        .filter(move |bit| mask & bit != 0)
}

impl Resolution {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Resolution::Low => 0,
            Resolution::High => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Resolution> {
        match tag {
            0 => Some(Resolution::Low),
            1 => Some(Resolution::High),
            _ => None,
        }
    }
}

impl ColorMode {
    pub(crate) fn tag(self) -> u8 {
        match self {
            ColorMode::Mono => 0,
            ColorMode::TwoPlane => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<ColorMode> {
        match tag {
            0 => Some(ColorMode::Mono),
            1 => Some(ColorMode::TwoPlane),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOX: [u8; 4] = [0xF0, 0x90, 0x90, 0xF0];

    fn lit_pixels(display: &Display) -> Vec<(usize, usize)> {
        let mut lit = Vec::new();
        for y in 0..display.height() {
            for x in 0..display.width() {
                if display.get_pixel(x, y) != 0 {
                    lit.push((x, y));
                }
            }
        }
        lit
    }

    #[test]
    fn test_defaults() {
        let display = Display::new();
        assert_eq!(display.resolution(), Resolution::Low);
        assert_eq!(display.color_mode(), ColorMode::Mono);
        assert_eq!((display.width(), display.height()), (64, 32));
        assert!(!display.any_lit());
    }

    #[test]
    fn test_draw_twice_restores_screen() {
        // Arrange
        let mut display = Display::new();
        display.set_pixel(0, 0, 1);
        let before = display.clone();

        // Act
        let first = display.draw_sprite(10, 5, &BOX, SpriteEdge::WrapOriginClip);
        let second = display.draw_sprite(10, 5, &BOX, SpriteEdge::WrapOriginClip);

        // Assert
        assert!(!first);
        assert!(second);
        assert_eq!(display, before);
    }

    #[test]
    fn test_collision_only_on_set_to_unset() {
        let mut display = Display::new();
        display.draw_sprite(0, 0, &[0x80], SpriteEdge::Wrap);
        // touching a neighbouring pixel is not a collision
        assert!(!display.draw_sprite(1, 0, &[0x80], SpriteEdge::Wrap));
        assert!(display.draw_sprite(0, 0, &[0x80], SpriteEdge::Wrap));
        assert_eq!(display.get_pixel(0, 0), 0);
    }

    #[test]
    fn test_origin_wraps_before_drawing() {
        let mut display = Display::new();
        // x = 66 lands on column 2
        display.draw_sprite(66, 33, &[0x80], SpriteEdge::WrapOriginClip);
        assert_eq!(lit_pixels(&display), vec![(2, 1)]);
    }

    #[test]
    fn test_clip_at_right_and_bottom_edges() {
        let mut display = Display::new();
        display.draw_sprite(60, 30, &[0xFF, 0xFF, 0xFF, 0xFF], SpriteEdge::WrapOriginClip);
        let lit = lit_pixels(&display);
        assert_eq!(lit.len(), 4 * 2);
        assert!(lit.iter().all(|(x, y)| *x >= 60 && *y >= 30));
    }

    #[test]
    fn test_mask_origin_clip() {
        let mut display = Display::new();
        display.draw_sprite(0x41, 0x21, &[0xC0], SpriteEdge::MaskOriginClip);
        assert_eq!(lit_pixels(&display), vec![(1, 1), (2, 1)]);

        let mut display = Display::new();
        display.draw_sprite(63, 0, &[0xC0], SpriteEdge::MaskOriginClip);
        assert_eq!(lit_pixels(&display), vec![(63, 0)]);
    }

    #[test]
    fn test_wrap_edge_wraps_pixels() {
        let mut display = Display::new();
        display.draw_sprite(63, 31, &[0xC0, 0xC0], SpriteEdge::Wrap);
        assert_eq!(
            lit_pixels(&display),
            vec![(0, 0), (63, 0), (0, 31), (63, 31)]
        );
    }

    #[test]
    fn test_wide_sprite_always_wraps() {
        let mut display = Display::new();
        display.set_resolution(Resolution::High);
        let mut data = [0u8; 32];
        data[0] = 0x80;
        data[1] = 0x01;
        let collision =
            display.draw_plane(120, 0, &data, true, 0b01, SpriteEdge::MaskOriginClip);
        assert!(!collision);
        // column 0 at x=120, column 15 wraps to x=7
        assert_eq!(lit_pixels(&display), vec![(7, 0), (120, 0)]);
    }

    #[test]
    fn test_two_plane_draw_respects_mask() {
        let mut display = Display::new();
        display.set_color_mode(ColorMode::TwoPlane);
        display.set_active_planes(0b10);
        display.draw_sprite(0, 0, &[0x80], SpriteEdge::Wrap);
        assert_eq!(display.get_pixel(0, 0), 0b10);

        display.set_active_planes(0b11);
        let collision = display.draw_sprite(0, 0, &[0x80], SpriteEdge::Wrap);
        assert!(collision);
        assert_eq!(display.get_pixel(0, 0), 0b01);
    }

    #[test]
    fn test_no_planes_selected_draws_nothing() {
        let mut display = Display::new();
        display.set_color_mode(ColorMode::TwoPlane);
        display.set_active_planes(0);
        assert!(!display.draw_sprite(0, 0, &BOX, SpriteEdge::Wrap));
        assert!(!display.any_lit());
    }

    #[test]
    fn test_mode_switch_clears() {
        let mut display = Display::new();
        display.draw_sprite(0, 0, &BOX, SpriteEdge::Wrap);
        display.set_resolution(Resolution::High);
        assert!(!display.any_lit());

        display.draw_sprite(0, 0, &BOX, SpriteEdge::Wrap);
        display.set_color_mode(ColorMode::TwoPlane);
        assert!(!display.any_lit());
    }

    #[test]
    fn test_scroll_down() {
        let mut display = Display::new();
        display.set_pixel(3, 0, 1);
        display.set_pixel(3, 31, 1);
        display.scroll_down(2);
        assert_eq!(lit_pixels(&display), vec![(3, 2)]);
    }

    #[test]
    fn test_scroll_up() {
        let mut display = Display::new();
        display.set_pixel(3, 0, 1);
        display.set_pixel(4, 5, 1);
        display.scroll_up(2);
        assert_eq!(lit_pixels(&display), vec![(4, 3)]);
    }

    #[test]
    fn test_scroll_zero_is_noop() {
        let mut display = Display::new();
        display.draw_sprite(5, 5, &BOX, SpriteEdge::Wrap);
        let before = display.clone();
        display.scroll_up(0);
        display.scroll_down(0);
        assert_eq!(display, before);
    }

    #[test]
    fn test_scroll_past_height_clears() {
        let mut display = Display::new();
        for y in 0..32 {
            display.draw_sprite(0, y, &[0xFF], SpriteEdge::Wrap);
        }
        display.scroll_up(32);
        assert!(!display.any_lit());

        display.draw_sprite(0, 0, &BOX, SpriteEdge::Wrap);
        display.scroll_down(200);
        assert!(!display.any_lit());
    }

    #[test]
    fn test_scroll_left_right() {
        let mut display = Display::new();
        display.set_pixel(2, 0, 1);
        display.set_pixel(10, 0, 1);
        display.scroll_left();
        assert_eq!(lit_pixels(&display), vec![(6, 0)]);

        display.set_pixel(62, 1, 1);
        display.scroll_right();
        assert_eq!(lit_pixels(&display), vec![(10, 0)]);
    }

    #[test]
    fn test_scroll_only_moves_active_planes() {
        let mut display = Display::new();
        display.set_color_mode(ColorMode::TwoPlane);
        display.set_pixel(0, 0, 0b11);
        display.set_active_planes(0b10);
        display.scroll_down(1);
        assert_eq!(display.get_pixel(0, 0), 0b01);
        assert_eq!(display.get_pixel(0, 1), 0b10);
    }

    #[test]
    fn test_scroll_clear_keeps_inactive_plane() {
        let mut display = Display::new();
        display.set_color_mode(ColorMode::TwoPlane);
        display.set_pixel(4, 4, 0b11);
        display.set_active_planes(0b01);
        display.scroll_up(40);
        assert_eq!(display.get_pixel(4, 4), 0b10);
    }

    #[test]
    fn test_get_pixel_outside_resolution() {
        let mut display = Display::new();
        display.set_pixel(100, 40, 1);
        assert_eq!(display.get_pixel(100, 40), 0);
        assert!(!display.any_lit());
    }

    #[test]
    fn test_planes_in() {
        assert_eq!(planes_in(0b00).collect::<Vec<_>>(), Vec::<u8>::new());
        assert_eq!(planes_in(0b01).collect::<Vec<_>>(), vec![1]);
        assert_eq!(planes_in(0b11).collect::<Vec<_>>(), vec![1, 2]);
    }
}
