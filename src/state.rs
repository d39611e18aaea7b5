use core::convert::TryFrom;

use crate::{
    Backlight, BitMode, DisplayControl, InstructionTable, Lines, Mode, Power, CONTRAST_MAX,
    LINE1_ADDR, LINE2_ADDR,
};

/// Zero-based cursor position as tracked by the driver.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CursorPosition {
    pub column: u8,
    pub row: u8,
}

/// Everything the driver remembers about the controller between calls.
pub(crate) struct DisplayState {
    pub(crate) display_control: u8,
    pub(crate) contrast: u8,
    pub(crate) backlight: Backlight,
    pub(crate) cursor: CursorPosition,
    /// `None` until the first function set, the controller state is unknown before that.
    pub(crate) table: Option<InstructionTable>,
}

impl DisplayState {
    pub(crate) fn new(contrast: u8) -> Self {
        Self {
            display_control: DisplayControl::Off as u8,
            contrast: wrap_contrast(contrast),
            backlight: Backlight::On,
            cursor: CursorPosition::default(),
            table: None,
        }
    }

    /// Sets or clears one flag and returns the full display on/off instruction to send.
    pub(crate) fn toggle(&mut self, flag: DisplayControl, on: bool) -> u8 {
        if on {
            self.display_control |= flag as u8;
        } else {
            self.display_control &= !(flag as u8);
        }
        Mode::DisplayControl as u8 | self.display_control
    }

    pub(crate) fn home(&mut self) {
        self.cursor = CursorPosition::default();
    }

    pub(crate) fn advance(&mut self) {
        self.cursor.column = self.cursor.column.saturating_add(1);
    }
}

/// Values above [`CONTRAST_MAX`] wrap to zero so an encoder can cycle through the range.
pub(crate) fn wrap_contrast(value: u8) -> u8 {
    if value > CONTRAST_MAX {
        0
    } else {
        value
    }
}

/// Low nibble, sent with [`Mode::ContrastSet`].
pub(crate) fn contrast_low(value: u8) -> u8 {
    value & 0x0f
}

/// Two high bits, sent with [`Mode::PowerIconContrast`] keeping icon and booster on.
pub(crate) fn contrast_high(value: u8) -> u8 {
    ((value >> 4) & 0x03) | Power::IconOn as u8 | Power::BoosterOn as u8
}

pub(crate) fn function_set(table: InstructionTable) -> u8 {
    Mode::FunctionSet as u8 | BitMode::Bit8 as u8 | Lines::Two as u8 | table as u8
}

/// DDRAM address of a cell, `None` when it lies outside the configured geometry.
pub(crate) fn ddram_address(columns: u8, rows: u8, column: u8, row: u8) -> Option<u8> {
    if column >= columns || row >= rows {
        return None;
    }
    let base = if row == 0 { LINE1_ADDR } else { LINE2_ADDR };
    Some(base + column)
}

pub(crate) fn cgram_address(position: u8) -> u8 {
    (position & 0x07) << 3
}

/// Byte sent for `c`. Characters beyond Latin-1 have no ROM cell and become `?`, so they can
/// never reach the glyph slots.
pub(crate) fn encode_char(c: char) -> u8 {
    u8::try_from(c).unwrap_or(b'?')
}

/// Maps the aliases 0x80..=0x87 onto the user glyphs 0..=7, zero can't live in a string.
pub(crate) fn remap_glyph(c: u8) -> u8 {
    match c {
        0x80..=0x87 => c & 0x07,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contrast_wraps_instead_of_clamping() {
        assert_eq!(wrap_contrast(0), 0);
        assert_eq!(wrap_contrast(32), 32);
        assert_eq!(wrap_contrast(63), 63);
        assert_eq!(wrap_contrast(64), 0);
        assert_eq!(wrap_contrast(255), 0);
    }

    #[test]
    fn contrast_is_split_over_two_instructions() {
        assert_eq!(contrast_low(32), 0x00);
        assert_eq!(contrast_high(32), 0x0e);
        assert_eq!(contrast_low(63), 0x0f);
        assert_eq!(contrast_high(63), 0x0f);
        assert_eq!(contrast_low(42), 0x0a);
        assert_eq!(contrast_high(0), 0x0c);
    }

    #[test]
    fn function_set_encodes_table() {
        assert_eq!(function_set(InstructionTable::Extended), 0x39);
        assert_eq!(function_set(InstructionTable::Normal), 0x38);
    }

    #[test]
    fn second_line_is_not_linear_continuation() {
        let first = ddram_address(16, 2, 0, 0).unwrap();
        let second = ddram_address(16, 2, 0, 1).unwrap();
        assert_eq!(second - first, LINE2_ADDR);
        assert_ne!(second - first, 16);
        assert_eq!(ddram_address(16, 2, 15, 1), Some(0x4f));
    }

    #[test]
    fn out_of_range_cells_have_no_address() {
        assert_eq!(ddram_address(16, 2, 16, 0), None);
        assert_eq!(ddram_address(16, 2, 0, 2), None);
        assert_eq!(ddram_address(16, 1, 0, 1), None);
    }

    #[test]
    fn glyph_aliases_are_remapped() {
        assert_eq!(remap_glyph(0x83), 3);
        assert_eq!(remap_glyph(0x80), 0);
        assert_eq!(remap_glyph(0x87), 7);
        assert_eq!(remap_glyph(0x88), 0x88);
        assert_eq!(remap_glyph(b'A'), b'A');
    }

    #[test]
    fn wide_chars_never_hit_glyph_slots() {
        assert_eq!(encode_char('A'), b'A');
        assert_eq!(encode_char('\u{83}'), 0x83);
        assert_eq!(encode_char('\u{e9}'), 0xe9);
        assert_eq!(encode_char('\u{100}'), b'?');
        assert_eq!(encode_char('\u{183}'), b'?');
        assert_eq!(encode_char('\u{2603}'), b'?');
        for c in ['\u{100}', '\u{107}', '\u{180}', '\u{187}', '\u{1f600}'] {
            assert!(remap_glyph(encode_char(c)) > 0x07);
        }
    }

    #[test]
    fn cgram_address_is_position_times_eight() {
        assert_eq!(cgram_address(0), 0x00);
        assert_eq!(cgram_address(3), 0x18);
        assert_eq!(cgram_address(7), 0x38);
    }

    #[test]
    fn toggle_resends_full_mask() {
        let mut state = DisplayState::new(32);
        assert_eq!(state.toggle(DisplayControl::DisplayOn, true), 0x0c);
        assert_eq!(state.toggle(DisplayControl::CursorOn, true), 0x0e);
        assert_eq!(state.toggle(DisplayControl::CursorOn, true), 0x0e);
        assert_eq!(state.toggle(DisplayControl::CursorBlink, true), 0x0f);
        assert_eq!(state.toggle(DisplayControl::CursorOn, false), 0x0d);
    }
}
