//! Joypad implementation, heavily inspired by MoonEyeGB, as the polarity of
//! P1 (active-low, selected row ANDed onto the visible nibble) is easy to
//! get backwards if implemented straight off the pandocs prose.
use bitflags::bitflags;

use crate::io::interrupts::{Interrupt, Interrupts};

pub const JOYPAD_REGISTER: u16 = 0xFF00;

#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub enum InputKey {
    Start,
    Select,
    A,
    B,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct JoyPad {
    pressed_buttons: JoypadFlags,
    pressed_directions: JoypadFlags,
    selected_mode: JoypadFlags,
}

impl JoyPad {
    pub fn new() -> Self {
        JoyPad {
            pressed_buttons: JoypadFlags::empty(),
            pressed_directions: JoypadFlags::empty(),
            selected_mode: JoypadFlags::from_bits_truncate(0xFF),
        }
    }

    /// Get the current JoyPad register for the most recently selected mode (Button, Direction)
    pub fn get_register(&self) -> u8 {
        !self.selected_mode.bits
    }

    /// Set the register, primarily used to set the current mode (Button, Direction) by games.
    /// If a game tries to write to the lower nibble for some reason those bits will just be
    /// discarded.
    pub fn set_register(&mut self, mode: u8, interrupts: &mut Interrupts) {
        self.selected_mode = JoypadFlags::from_bits_truncate(!mode);
        self.update_flags(interrupts);
    }

    /// Register a key as pressed down.
    pub fn press_key(&mut self, input: InputKey, interrupts: &mut Interrupts) {
        use InputKey::*;
        match input {
            Down | Up | Left | Right => self.pressed_directions.insert(input.flag_value()),
            A | B | Select | Start => self.pressed_buttons.insert(input.flag_value()),
        }
        self.update_flags(interrupts);
    }

    /// Release a key that was pressed down before.
    pub fn release_key(&mut self, input: InputKey, interrupts: &mut Interrupts) {
        use InputKey::*;
        match input {
            Down | Up | Left | Right => self.pressed_directions.remove(input.flag_value()),
            A | B | Select | Start => self.pressed_buttons.remove(input.flag_value()),
        }
        self.update_flags(interrupts);
    }

    /// Recomputes the visible low nibble from the currently selected row(s)
    /// and the pressed-key sets, firing INPUT on a not-pressed→pressed edge
    /// of any bit that is currently selected.
    fn update_flags(&mut self, interrupts: &mut Interrupts) {
        let visible_before = self.selected_mode.bits() & JoypadFlags::VISIBLE.bits();

        // Discard any writes that may have been made to the lower nibble.
        self.selected_mode = JoypadFlags::from_bits_truncate(self.selected_mode.bits() & 0b0011_0000);
        if self.selected_mode.contains(JoypadFlags::BUTTON_KEYS) {
            self.selected_mode.insert(self.pressed_buttons);
        }
        if self.selected_mode.contains(JoypadFlags::DIRECTION_KEYS) {
            self.selected_mode.insert(self.pressed_directions);
        }

        let visible_after = self.selected_mode.bits() & JoypadFlags::VISIBLE.bits();
        if visible_after & !visible_before != 0 {
            interrupts.request(Interrupt::Input);
        }
    }
}

impl InputKey {
    fn flag_value(&self) -> JoypadFlags {
        match self {
            InputKey::Start | InputKey::Down => JoypadFlags::DOWN_START,
            InputKey::Select | InputKey::Up => JoypadFlags::UP_SELECT,
            InputKey::B | InputKey::Left => JoypadFlags::LEFT_B,
            InputKey::A | InputKey::Right => JoypadFlags::RIGHT_A,
        }
    }
}

bitflags! {
    #[derive(Default)]
    struct JoypadFlags: u8 {
        /// Right or A
        const RIGHT_A         = 0b0000_0001;
        /// Left or B
        const LEFT_B          = 0b0000_0010;
        /// Input Up or Select
        const UP_SELECT       = 0b0000_0100;
        /// Input Down or Start
        const DOWN_START      = 0b0000_1000;
        /// Select Direction Keys
        const DIRECTION_KEYS  = 0b0001_0000;
        /// Select Button Keys
        const BUTTON_KEYS     = 0b0010_0000;
        /// Unused, but necessary for bits() to return 0xFF
        const UNUSED_0        = 0b0100_0000;
        /// Unused, but necessary for bits() to return 0xFF
        const UNUSED_1        = 0b1000_0000;
        const VISIBLE = Self::RIGHT_A.bits | Self::LEFT_B.bits | Self::UP_SELECT.bits | Self::DOWN_START.bits;
    }
}

impl Default for JoyPad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_on_selected_row_raises_input_interrupt() {
        let mut pad = JoyPad::new();
        let mut interrupts = Interrupts::new();
        // Select the button row (bit 5 low = selected, so write with bit 5 clear).
        pad.set_register(0b0010_0000, &mut interrupts);
        assert!(!interrupts.any_pending_unmasked());

        interrupts.interrupt_enable = crate::io::interrupts::InterruptFlags::INPUT;
        pad.press_key(InputKey::A, &mut interrupts);
        assert_eq!(interrupts.pending(), Some(Interrupt::Input));
    }

    #[test]
    fn press_on_unselected_row_does_not_raise_interrupt() {
        let mut pad = JoyPad::new();
        let mut interrupts = Interrupts::new();
        interrupts.interrupt_enable = crate::io::interrupts::InterruptFlags::INPUT;
        // Select only the direction row; button presses should stay invisible.
        pad.set_register(0b0001_0000, &mut interrupts);
        pad.press_key(InputKey::A, &mut interrupts);
        assert!(interrupts.pending().is_none());
    }
}
