//! Settings applied before the display is initialized.

use heapless::Vec;
use log::debug;

use crate::{state::wrap_contrast, DEFAULT_ADDRESS, MAX_COLUMNS};

/// The controller offers room for eight 5x8 glyphs.
pub const MAX_USER_CHARACTERS: usize = 8;

/// A user-defined 5x8 glyph.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UserCharacter {
    /// Slot 0..=7, printed with the alias `0x80 + position`.
    pub position: u8,
    /// One byte per pixel row, only the low five bits are used.
    pub pattern: [u8; 8],
}

impl UserCharacter {
    /// Missing rows are left blank, extra ones are ignored.
    pub fn new(position: u8, rows: &[u8]) -> Self {
        let mut pattern = [0u8; 8];
        for (dst, src) in pattern.iter_mut().zip(rows) {
            *dst = src & 0x1f;
        }
        Self {
            position: position & 0x07,
            pattern,
        }
    }
}

/// Geometry, contrast and glyphs of a display.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) address: u8,
    pub(crate) columns: u8,
    pub(crate) rows: u8,
    pub(crate) contrast: u8,
    pub(crate) user_characters: Vec<UserCharacter, MAX_USER_CHARACTERS>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            columns: 16,
            rows: 2,
            contrast: 32,
            user_characters: Vec::new(),
        }
    }
}

impl Config {
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Clamped to 1..=40.
    pub fn set_columns(&mut self, columns: u8) {
        self.columns = columns.clamp(1, MAX_COLUMNS);
    }

    /// Clamped to 1..=2.
    pub fn set_rows(&mut self, rows: u8) {
        self.rows = rows.clamp(1, 2);
    }

    pub fn set_contrast(&mut self, contrast: u8) {
        self.contrast = wrap_contrast(contrast);
    }

    /// Queues a glyph for loading during setup. Entries beyond eight are dropped.
    pub fn add_user_character(&mut self, character: UserCharacter) {
        if self.user_characters.push(character).is_err() {
            debug!(
                "dropping user character {}, all {} slots taken",
                character.position, MAX_USER_CHARACTERS
            );
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn columns(&self) -> u8 {
        self.columns
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn contrast(&self) -> u8 {
        self.contrast
    }

    pub fn user_characters(&self) -> &[UserCharacter] {
        &self.user_characters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cog_2x16() {
        let config = Config::default();
        assert_eq!(config.address(), 0x3e);
        assert_eq!(config.columns(), 16);
        assert_eq!(config.rows(), 2);
        assert_eq!(config.contrast(), 32);
        assert!(config.user_characters().is_empty());
    }

    #[test]
    fn geometry_is_clamped() {
        let mut config = Config::default();
        config.set_columns(0);
        config.set_rows(4);
        assert_eq!(config.columns(), 1);
        assert_eq!(config.rows(), 2);
        config.set_columns(80);
        config.set_rows(0);
        assert_eq!(config.columns(), 40);
        assert_eq!(config.rows(), 1);
    }

    #[test]
    fn configured_contrast_wraps() {
        let mut config = Config::default();
        config.set_contrast(64);
        assert_eq!(config.contrast(), 0);
        config.set_contrast(63);
        assert_eq!(config.contrast(), 63);
    }

    #[test]
    fn glyph_rows_are_masked_and_padded() {
        let glyph = UserCharacter::new(9, &[0xff, 0x11, 0x0e]);
        assert_eq!(glyph.position, 1);
        assert_eq!(glyph.pattern, [0x1f, 0x11, 0x0e, 0, 0, 0, 0, 0]);

        let long = UserCharacter::new(2, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(long.pattern, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn at_most_eight_glyphs_are_kept() {
        let mut config = Config::default();
        for position in 0..10 {
            config.add_user_character(UserCharacter::new(position, &[0; 8]));
        }
        assert_eq!(config.user_characters().len(), MAX_USER_CHARACTERS);
        assert_eq!(config.user_characters()[7].position, 7);
    }
}
