/// Number of keys on the hex keypad.
pub const KEY_COUNT: usize = 16;

/// Browser key codes for the conventional layout, left-hand side of a qwerty keyboard:
///
/// ```text
/// 1 2 3 4        1 2 3 C
/// Q W E R   ->   4 5 6 D
/// A S D F        7 8 9 E
/// Z X C V        A 0 B F
/// ```
const KEYMAP: [(u32, u8); KEY_COUNT] = [
    (49, 0x1), // 1
    (50, 0x2), // 2
    (51, 0x3), // 3
    (52, 0xC), // 4
    (81, 0x4), // q
    (87, 0x5), // w
    (69, 0x6), // e
    (82, 0xD), // r
    (65, 0x7), // a
    (83, 0x8), // s
    (68, 0x9), // d
    (70, 0xE), // f
    (90, 0xA), // z
    (88, 0x0), // x
    (67, 0xB), // c
    (86, 0xF), // v
];

/// Map a host key code to a keypad symbol.
pub fn symbol_for_key_code(key_code: u32) -> Option<u8> {
    KEYMAP
        .iter()
        .find(|(code, _)| *code == key_code)
        .map(|&(_, symbol)| symbol)
}

/// Pressed/released state of the 16 keys, plus a one-shot latch for "the next key released".
#[derive(Debug, Default, Clone)]
pub struct Keyboard {
    pressed: [bool; KEY_COUNT],
    next_key_armed: bool,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Keyboard::new();
    }

    /// Symbols outside the keypad are never pressed.
    pub fn is_pressed(&self, symbol: u8) -> bool {
        self.pressed
            .get(symbol as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn press(&mut self, symbol: u8) {
        match self.pressed.get_mut(symbol as usize) {
            Some(key) => *key = true,
            None => log::warn!("ignoring press of unknown key {:#x}", symbol),
        }
    }

    /// Mark a key as released. If the next-key latch was armed it fires exactly once: the
    /// latch is cleared and the released symbol returned.
    pub fn release(&mut self, symbol: u8) -> Option<u8> {
        match self.pressed.get_mut(symbol as usize) {
            Some(key) => *key = false,
            None => {
                log::warn!("ignoring release of unknown key {:#x}", symbol);
                return None;
            }
        }

        if std::mem::replace(&mut self.next_key_armed, false) {
            Some(symbol)
        } else {
            None
        }
    }

    /// Arm the one-shot latch. Arming again just overwrites the previous arm.
    pub fn arm_next_key(&mut self) {
        self.next_key_armed = true;
    }

    pub fn disarm(&mut self) {
        self.next_key_armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.next_key_armed
    }

    /// Replace the whole key state. Keys that go from pressed to released count as releases,
    /// so the first of them (lowest symbol) can fire the latch.
    pub fn update(&mut self, new_state: &[bool; KEY_COUNT]) -> Option<u8> {
        let mut fired = None;
        for (symbol, &now_pressed) in new_state.iter().enumerate() {
            if self.pressed[symbol] && !now_pressed {
                let released = self.release(symbol as u8);
                fired = fired.or(released);
            } else {
                self.pressed[symbol] = now_pressed;
            }
        }
        fired
    }
}
