#![no_std]
//! Driver for character LCD modules built on the Sitronix ST7032i controller, such as the
//! ATNEL COG 2x16 with a 3.3V I2C interface. It requires an I2C instance implementing
//! [`embedded_hal::i2c::I2c`] and an instance to delay execution with
//! [`embedded_hal::delay::DelayNs`]. An optional active-low reset line can be handed over as an
//! [`embedded_hal::digital::OutputPin`].
//!
//! Usage:
//! ```ignore
//! let dp = arduino_hal::Peripherals::take().unwrap();
//! let pins = arduino_hal::pins!(dp);
//! let mut i2c = arduino_hal::I2c::new(
//!     dp.TWI,
//!     pins.a4.into_pull_up_input(),
//!     pins.a5.into_pull_up_input(),
//!     50000,
//! );
//! let mut delay = arduino_hal::Delay::new();
//!
//! let mut lcd = lcd_st7032_i2c::Lcd::new(&mut i2c, &mut delay)
//!     .with_columns(16)
//!     .with_rows(2)
//!     .with_contrast(32)
//!     // glyph 0 is printed with '\u{80}'
//!     .with_user_character(0, &[0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1f])
//!     .init()
//!     .unwrap();
//!
//! lcd.print_at(0, 1, "Battery \u{80}").unwrap();
//!
//! // ufmt is re-exported, `uwrite!` works without a separate dependency
//! use lcd_st7032_i2c::ufmt;
//! ufmt::uwrite!(&mut lcd, " {}%", 87u8).unwrap();
//! ```
//!
//! Text is sent one byte per character. Characters up to U+00FF map to the ROM cell of the same
//! value, anything beyond that is printed as `?`.
//!
//! A rendering function can be stored with `with_writer` and is run by every `refresh`, right
//! after the display was cleared. Its signature names the reset pin type, so `with_reset_pin` has
//! to come first; a writer configured before it is dropped. The async driver stores no writer,
//! its `refresh` only clears and the frame is printed by the caller afterwards:
//!
//! ```ignore
//! lcd.refresh().await?;
//! lcd.print_at(0, 0, "Hello").await?;
//! ```
//!
//! The controller multiplexes its opcodes over two instruction tables ([datasheet]). The driver
//! tracks the active table and switches on its own whenever an instruction needs the other one,
//! so the public API never has to care about it.
//!
//! [datasheet]: https://www.newhavendisplay.com/app_notes/ST7032.pdf

#[cfg(feature = "async")]
pub mod async_lcd;
pub mod config;
pub mod error;
mod state;
pub mod sync_lcd;
mod text;

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

pub use ufmt;

pub use config::{Config, UserCharacter, MAX_USER_CHARACTERS};
pub use error::Error;
pub use state::CursorPosition;
pub use text::{TextBuffer, TimeFormat, TEXT_BUFFER_LEN};

/// Fixed I2C address of the ST7032i.
pub const DEFAULT_ADDRESS: u8 = 0x3E;

/// Highest contrast value, anything above wraps to zero.
pub const CONTRAST_MAX: u8 = 63;

/// Number of columns a single DDRAM line holds in two-line mode.
pub const MAX_COLUMNS: u8 = 40;

/// Flags of the display on/off instruction.
#[derive(Copy, Clone)]
pub enum DisplayControl {
    Off = 0x00,
    CursorBlink = 0x01,
    CursorOn = 0x02,
    DisplayOn = 0x04,
}

/// State of the backlight. The COG module wires it to a separate line which is not driven by
/// this crate, the flag only exists to be consulted by whoever owns that line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backlight {
    Off,
    On,
}

/// Kind of display reported through [`CharacterDisplay`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisplayType {
    Binary,
}

/// Capabilities a host display framework can query.
pub trait CharacterDisplay {
    /// Number of characters per line.
    fn columns(&self) -> u8;

    /// Number of lines.
    fn rows(&self) -> u8;

    fn display_type(&self) -> DisplayType {
        DisplayType::Binary
    }

    /// Character displays have no pixel addressing, this does nothing.
    fn draw_pixel_at(&mut self, _x: i32, _y: i32, _on: bool) {}
}

/// Placeholder for modules without a wired reset line.
pub struct NoResetPin;

impl ErrorType for NoResetPin {
    type Error = Infallible;
}

impl OutputPin for NoResetPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// First byte of each transfer, tells the controller what the second one is.
#[repr(u8)]
#[derive(Copy, Clone)]
enum Control {
    Cmd = 0x00,
    Data = 0x40,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum InstructionTable {
    Normal = 0x00,
    Extended = 0x01,
}

#[repr(u8)]
#[derive(Copy, Clone)]
enum Mode {
    DisplayControl = 0x08,
    OscFrequency = 0x10,
    FunctionSet = 0x20,
    CGRAMAddr = 0x40,
    PowerIconContrast = 0x50,
    FollowerControl = 0x60,
    ContrastSet = 0x70,
    DDRAMAddr = 0x80,
}

impl Mode {
    /// Table the opcode is defined on, `None` for instructions shared by both.
    fn table(self) -> Option<InstructionTable> {
        match self {
            Mode::DisplayControl | Mode::FunctionSet | Mode::DDRAMAddr => None,
            Mode::CGRAMAddr => Some(InstructionTable::Normal),
            Mode::OscFrequency
            | Mode::PowerIconContrast
            | Mode::FollowerControl
            | Mode::ContrastSet => Some(InstructionTable::Extended),
        }
    }
}

enum Commands {
    Clear = 0x01,
    ReturnHome = 0x02,
}

enum BitMode {
    Bit8 = 0x1 << 4,
}

enum Lines {
    Two = 0x08,
}

enum Oscillator {
    BiasQuarter = 0x08,
    F2 = 0x04,
}

enum Power {
    IconOn = 0x08,
    BoosterOn = 0x04,
}

enum Follower {
    On = 0x08,
    Rab2 = 0x04,
}

const LINE1_ADDR: u8 = 0x00;
const LINE2_ADDR: u8 = 0x40;

const WRITE_DELAY_US: u32 = 30;
const CLEAR_DELAY_US: u32 = 1200;
const DISPLAY_ON_DELAY_US: u32 = 300;
const RESET_PULSE_MS: u32 = 10;
const POWER_ON_DELAY_MS: u32 = 40;
const FOLLOWER_SETTLE_MS: u32 = 200;
