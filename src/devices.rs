use crate::definitions::keyboard;

#[cfg_attr(test, mockall::automock)]
/// The traits responsible for the display based code
pub trait DisplayCommands {
    /// Will display all from the pixels, one byte per pixel (`0` or `1`) in
    /// row-major order.
    fn display(&mut self, pixels: &[u8]);
}

#[cfg_attr(test, mockall::automock)]
/// The trait responsible for the sound output
pub trait SoundCommands {
    /// Called whenever the sound timer switches between zero and nonzero.
    fn set_playing(&mut self, playing: bool);
}

#[cfg_attr(test, mockall::automock)]
/// The input provider consumed by the interpreter.
pub trait Keypad {
    /// Checks if the given key (`0x0-0xF`) is currently held down.
    fn is_key_pressed(&self, key: u8) -> bool;

    /// Takes the next key down event, if there was one since the last call.
    /// Every event is handed out exactly once.
    fn take_key_press(&mut self) -> Option<u8>;
}

/// Will represent the last set key with the previous
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    index: usize,
    last: bool,
    current: bool,
}

impl Key {
    fn new(index: usize, last: bool, current: bool) -> Self {
        Self {
            index,
            last,
            current,
        }
    }

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn get_last(&self) -> bool {
        self.last
    }

    pub fn get_current(&self) -> bool {
        self.current
    }

    /// The key went from released to pressed.
    pub fn is_key_down(&self) -> bool {
        !self.last && self.current
    }
}

/// Will store the last change to the given keybord
/// and represent the internal keyboard as well
///
/// Input is done with a hex keyboard that has 16 keys ranging `0-F`. The `8`, `4`, `6`, and
/// `2` keys are typically used for directional input. Three opcodes are used to detect input.
/// One skips an instruction if a specific key is pressed, while another does the same if a
/// specific key is not pressed. The third waits for a key press, and then stores it in one of
/// the data registers.
#[derive(Default, Debug, Clone)]
pub struct Keyboard {
    keys: [bool; keyboard::SIZE],
    last: Option<Key>,
    /// The key down event not yet taken by the interpreter.
    pending: Option<u8>,
}

impl Keyboard {
    pub fn new() -> Self {
        Keyboard::default()
    }

    pub fn press(&mut self, key: usize) {
        self.set_key(key, true)
    }

    pub fn release(&mut self, key: usize) {
        self.set_key(key, false)
    }

    pub fn toggle_key(&mut self, key: usize) {
        if let Some(&state) = self.keys.get(key) {
            self.set_key(key, !state)
        } else {
            log::warn!("Ignoring the unknown key {:#X}", key);
        }
    }

    pub fn set_key(&mut self, key: usize, to: bool) {
        if key >= keyboard::SIZE {
            log::warn!("Ignoring the unknown key {:#X}", key);
            return;
        }

        let last = Key::new(key, self.keys[key], to);
        if last.is_key_down() {
            self.pending = Some(key as u8);
        }

        self.last = Some(last);
        self.keys[key] = to;
    }

    /// Will overwrite the full keyboard state, this does not generate any
    /// key down events.
    pub fn set_mult(&mut self, keys: &[bool]) {
        if keys.len() != self.keys.len() {
            log::warn!(
                "Ignoring a keyboard state with {} instead of {} keys",
                keys.len(),
                self.keys.len()
            );
            return;
        }
        self.keys.copy_from_slice(keys);
        self.last = None;
    }

    pub fn get_keys(&self) -> &[bool] {
        &self.keys
    }

    pub fn get_last(&self) -> Option<Key> {
        self.last
    }
}

impl Keypad for Keyboard {
    fn is_key_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    fn take_key_press(&mut self) -> Option<u8> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let mut keyboard = Keyboard::new();
        assert!(!keyboard.is_key_pressed(0x4));

        keyboard.press(0x4);
        assert!(keyboard.is_key_pressed(0x4));
        assert_eq!(keyboard.get_last(), Some(Key::new(0x4, false, true)));

        keyboard.release(0x4);
        assert!(!keyboard.is_key_pressed(0x4));
        assert_eq!(keyboard.get_last(), Some(Key::new(0x4, true, false)));
    }

    #[test]
    fn test_key_press_is_taken_once() {
        let mut keyboard = Keyboard::new();
        assert_eq!(keyboard.take_key_press(), None);

        keyboard.press(0xA);
        assert_eq!(keyboard.take_key_press(), Some(0xA));
        assert_eq!(keyboard.take_key_press(), None);
    }

    #[test]
    fn test_held_key_is_not_a_new_press() {
        let mut keyboard = Keyboard::new();
        keyboard.press(0x1);
        assert_eq!(keyboard.take_key_press(), Some(0x1));

        // pressing an already held key is no key down event
        keyboard.press(0x1);
        assert_eq!(keyboard.take_key_press(), None);

        keyboard.release(0x1);
        assert_eq!(keyboard.take_key_press(), None);
    }

    #[test]
    fn test_toggle_key() {
        let mut keyboard = Keyboard::new();
        keyboard.toggle_key(0x2);
        assert!(keyboard.is_key_pressed(0x2));
        keyboard.toggle_key(0x2);
        assert!(!keyboard.is_key_pressed(0x2));
    }

    #[test]
    fn test_out_of_range_keys_are_ignored() {
        let mut keyboard = Keyboard::new();
        keyboard.press(keyboard::SIZE);
        keyboard.toggle_key(keyboard::SIZE + 3);

        assert!(keyboard.get_last().is_none());
        assert_eq!(keyboard.take_key_press(), None);
        assert!(!keyboard.is_key_pressed(0xFF));
    }

    #[test]
    fn test_set_mult() {
        let mut keyboard = Keyboard::new();
        let mut keys = [false; keyboard::SIZE];
        keys[3] = true;
        keys[0xF] = true;

        keyboard.set_mult(&keys);

        assert_eq!(keyboard.get_keys(), &keys[..]);
        assert!(keyboard.get_last().is_none());
        assert_eq!(keyboard.take_key_press(), None);

        // a wrongly sized state is rejected
        keyboard.set_mult(&[true; 3]);
        assert_eq!(keyboard.get_keys(), &keys[..]);
    }
}
