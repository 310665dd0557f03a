pub const NUM_KEYS: usize = 16;

/// Latched state of the 16-key hex keypad
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Keypad {
    keys: [bool; NUM_KEYS],
}

impl Keypad {
    pub fn new() -> Keypad {
        Keypad::default()
    }

    /// Keys outside 0x0..=0xF are ignored
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        if let Some(k) = self.keys.get_mut(key as usize) {
            *k = pressed;
        }
    }

    pub fn is_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    /// Lowest-numbered key currently held down
    pub fn pressed_key(&self) -> Option<u8> {
        self.keys.iter().position(|k| *k).map(|k| k as u8)
    }

    pub fn release_all(&mut self) {
        self.keys = [false; NUM_KEYS];
    }

    pub fn keys(&self) -> &[bool; NUM_KEYS] {
        &self.keys
    }

    pub(crate) fn set_keys(&mut self, keys: [bool; NUM_KEYS]) {
        self.keys = keys;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_key_pressed() {
        let keypad = Keypad::new();
        assert_eq!(keypad.pressed_key(), None);
        assert!(!keypad.is_pressed(0x0));
    }

    #[test]
    fn test_lowest_key_wins() {
        let mut keypad = Keypad::new();
        keypad.set_key(0xC, true);
        keypad.set_key(0x3, true);
        assert_eq!(keypad.pressed_key(), Some(0x3));
        keypad.set_key(0x3, false);
        assert_eq!(keypad.pressed_key(), Some(0xC));
    }

    #[test]
    fn test_out_of_range_key_ignored() {
        let mut keypad = Keypad::new();
        keypad.set_key(16, true);
        keypad.set_key(0xFF, true);
        assert_eq!(keypad.pressed_key(), None);
        assert!(!keypad.is_pressed(16));
    }

    #[test]
    fn test_release_all() {
        let mut keypad = Keypad::new();
        keypad.set_key(0x1, true);
        keypad.set_key(0xF, true);
        keypad.release_all();
        assert_eq!(keypad.pressed_key(), None);
    }
}
