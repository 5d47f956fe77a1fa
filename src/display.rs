pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;

/// Monochrome pixel state. A pixel is `true` if it is turned on.
///
/// This only holds state. Painting it somewhere is the job of whoever receives the
/// frame-dirty notification, see [`crate::cpu::Host`].
pub struct Display {
    pixels: [bool; SCREEN_WIDTH * SCREEN_HEIGHT],
    // Set whenever `pixels` changes. The renderer must redraw and then clear this flag.
    dirty: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    pub fn new() -> Self {
        Display {
            pixels: [false; SCREEN_WIDTH * SCREEN_HEIGHT],
            dirty: false,
        }
    }

    /// Turn every pixel off.
    pub fn clear(&mut self) {
        self.pixels = [false; SCREEN_WIDTH * SCREEN_HEIGHT];
        self.dirty = true;
    }

    /// XOR a single pixel. Coordinates wrap around the screen edges.
    ///
    /// Returns true if the pixel was lit and got erased.
    pub fn set_pixel(&mut self, x: usize, y: usize) -> bool {
        let index = (y % SCREEN_HEIGHT) * SCREEN_WIDTH + (x % SCREEN_WIDTH);
        self.pixels[index] ^= true;
        self.dirty = true;
        !self.pixels[index]
    }

    pub fn is_lit(&self, x: usize, y: usize) -> bool {
        self.pixels[(y % SCREEN_HEIGHT) * SCREEN_WIDTH + (x % SCREEN_WIDTH)]
    }

    /// Row-major pixel buffer.
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether the display is dirty, and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_blank_and_clean() {
        let d = Display::new();
        assert!(d.pixels().iter().all(|&p| !p));
        assert!(!d.is_dirty());
    }

    #[test]
    fn test_set_pixel_twice_restores() {
        let mut d = Display::new();
        let first = d.set_pixel(10, 5);
        assert!(d.is_lit(10, 5));
        let second = d.set_pixel(10, 5);
        assert!(!d.is_lit(10, 5));
        assert!(!first);
        assert_eq!(second, !first);
    }

    #[test]
    fn test_coordinates_wrap() {
        let mut d = Display::new();
        d.set_pixel(SCREEN_WIDTH, 0);
        assert!(d.is_lit(0, 0));
        assert!(d.set_pixel(0, SCREEN_HEIGHT));
        assert!(!d.is_lit(0, 0));

        d.set_pixel(SCREEN_WIDTH + 3, 2 * SCREEN_HEIGHT + 1);
        assert!(d.pixels()[SCREEN_WIDTH + 3]);
    }

    #[test]
    fn test_dirty_flag() {
        let mut d = Display::new();
        d.set_pixel(1, 1);
        assert!(d.take_dirty());
        assert!(!d.take_dirty());
        d.clear();
        assert!(d.take_dirty());
        assert!(!d.is_lit(1, 1));
    }
}
