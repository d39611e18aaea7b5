use embedded_hal::digital::OutputPin;
use embedded_hal_async::{delay::DelayNs, i2c::I2c};
use log::{debug, info};

use crate::config::{Config, UserCharacter};
use crate::error::Error;
use crate::state::{self, CursorPosition, DisplayState};
use crate::text::{self, TextBuffer, TimeFormat};
use crate::{
    Backlight, CharacterDisplay, Commands, Control, DisplayControl, Follower, InstructionTable,
    Mode, NoResetPin, Oscillator, Power, CLEAR_DELAY_US, DISPLAY_ON_DELAY_US, FOLLOWER_SETTLE_MS,
    LINE1_ADDR, POWER_ON_DELAY_MS, RESET_PULSE_MS, WRITE_DELAY_US,
};

/// API to write to the LCD.
///
/// Unlike [`crate::sync_lcd::Lcd`] there is no stored writer, await [`Lcd::refresh`] and render
/// right after it.
pub struct Lcd<'a, I, D, RST = NoResetPin>
where
    I: I2c,
    D: DelayNs,
    RST: OutputPin,
{
    i2c: &'a mut I,
    delay: &'a mut D,
    reset: Option<RST>,
    config: Config,
    state: DisplayState,
}

impl<'a, I, D> Lcd<'a, I, D, NoResetPin>
where
    I: I2c,
    D: DelayNs,
{
    /// Create new instance with only the I2C and delay instance.
    pub fn new(i2c: &'a mut I, delay: &'a mut D) -> Self {
        let config = Config::default();
        Self {
            i2c,
            delay,
            reset: None,
            state: DisplayState::new(config.contrast),
            config,
        }
    }
}

impl<'a, I, D, RST> Lcd<'a, I, D, RST>
where
    I: I2c,
    D: DelayNs,
    RST: OutputPin,
{
    /// Set I2C address, only needed if the module is strapped to something else than 0x3E.
    pub fn with_address(mut self, address: u8) -> Self {
        self.config.set_address(address);
        self
    }

    /// Number of characters per line, 1 to 40.
    pub fn with_columns(mut self, columns: u8) -> Self {
        self.config.set_columns(columns);
        self
    }

    /// Number of lines, 1 or 2.
    pub fn with_rows(mut self, rows: u8) -> Self {
        self.config.set_rows(rows);
        self
    }

    pub fn with_contrast(mut self, contrast: u8) -> Self {
        self.config.set_contrast(contrast);
        self.state.contrast = self.config.contrast;
        self
    }

    pub fn with_user_character(mut self, position: u8, pattern: &[u8]) -> Self {
        self.config
            .add_user_character(UserCharacter::new(position, pattern));
        self
    }

    /// Use an active-low reset line, pulsed at the start of every setup.
    pub fn with_reset_pin<P: OutputPin>(self, pin: P) -> Lcd<'a, I, D, P> {
        Lcd {
            i2c: self.i2c,
            delay: self.delay,
            reset: Some(pin),
            config: self.config,
            state: self.state,
        }
    }

    /// Initializes the hardware and loads the user characters.
    pub async fn init(mut self) -> Result<Self, Error<I::Error, RST::Error>> {
        self.setup().await?;
        Ok(self)
    }

    /// Runs the power on sequence, followed by loading the user characters if there are any.
    pub async fn setup(&mut self) -> Result<(), Error<I::Error, RST::Error>> {
        debug!(
            "setting up ST7032 display at {:#04x}",
            self.config.address
        );
        if let Some(reset) = self.reset.as_mut() {
            reset.set_low().map_err(Error::ResetPin)?;
            self.delay.delay_ms(RESET_PULSE_MS).await;
            reset.set_high().map_err(Error::ResetPin)?;
        }
        self.delay.delay_ms(POWER_ON_DELAY_MS).await;

        self.power_on().await.map_err(Error::I2c)?;
        if !self.config.user_characters.is_empty() {
            self.load_user_characters().await.map_err(Error::I2c)?;
        }
        info!("ST7032 display initialized");
        Ok(())
    }

    async fn power_on(&mut self) -> Result<(), I::Error> {
        self.function_set(InstructionTable::Extended).await?;
        self.command(
            Mode::OscFrequency,
            Oscillator::BiasQuarter as u8 | Oscillator::F2 as u8,
        )
        .await?;
        self.command(Mode::PowerIconContrast, Power::IconOn as u8)
            .await?;
        self.set_contrast(self.config.contrast).await?;
        self.command(
            Mode::FollowerControl,
            Follower::On as u8 | Follower::Rab2 as u8,
        )
        .await?;

        self.delay.delay_ms(FOLLOWER_SETTLE_MS).await;

        self.state.display_control = DisplayControl::Off as u8;
        let display_on = self.state.toggle(DisplayControl::DisplayOn, true);
        self.send(Control::Cmd, display_on).await?;
        self.delay.delay_us(DISPLAY_ON_DELAY_US).await;

        self.clear().await
    }

    async fn load_user_characters(&mut self) -> Result<(), I::Error> {
        self.select_table(InstructionTable::Normal).await?;
        for i in 0..self.config.user_characters.len() {
            let character = self.config.user_characters[i];
            self.command(Mode::CGRAMAddr, state::cgram_address(character.position))
                .await?;
            for row in character.pattern {
                self.send(Control::Data, row).await?;
            }
        }
        self.select_table(InstructionTable::Extended).await?;
        self.command(Mode::DDRAMAddr, LINE1_ADDR).await
    }

    async fn send(&mut self, control: Control, data: u8) -> Result<(), I::Error> {
        self.i2c
            .write(self.config.address, &[control as u8, data])
            .await?;
        self.delay.delay_us(WRITE_DELAY_US).await;
        Ok(())
    }

    async fn function_set(&mut self, table: InstructionTable) -> Result<(), I::Error> {
        self.send(Control::Cmd, state::function_set(table)).await?;
        self.state.table = Some(table);
        Ok(())
    }

    async fn select_table(&mut self, table: InstructionTable) -> Result<(), I::Error> {
        if self.state.table == Some(table) {
            return Ok(());
        }
        self.function_set(table).await
    }

    async fn command(&mut self, mode: Mode, data: u8) -> Result<(), I::Error> {
        if let Some(table) = mode.table() {
            self.select_table(table).await?;
        }
        self.send(Control::Cmd, mode as u8 | data).await
    }

    /// Write a single character, `0x80..=0x87` print the user characters 0 to 7.
    pub async fn write_char(&mut self, c: u8) -> Result<(), I::Error> {
        self.send(Control::Data, state::remap_glyph(c)).await?;
        self.state.advance();
        Ok(())
    }

    /// Write string to display.
    pub async fn print(&mut self, data: &str) -> Result<(), I::Error> {
        for c in data.chars() {
            self.write_char(state::encode_char(c)).await?;
        }
        Ok(())
    }

    pub async fn print_at(&mut self, column: u8, row: u8, data: &str) -> Result<(), I::Error> {
        self.set_cursor(column, row).await?;
        self.print(data).await
    }

    /// Write formatted text, cut at [`crate::TEXT_BUFFER_LEN`] bytes.
    pub async fn print_fmt(&mut self, args: core::fmt::Arguments<'_>) -> Result<(), I::Error> {
        let text = text::render(args);
        self.print(&text).await
    }

    pub async fn print_fmt_at(
        &mut self,
        column: u8,
        row: u8,
        args: core::fmt::Arguments<'_>,
    ) -> Result<(), I::Error> {
        self.set_cursor(column, row).await?;
        self.print_fmt(args).await
    }

    pub async fn strftime<T: TimeFormat>(
        &mut self,
        format: &str,
        time: &T,
    ) -> Result<(), I::Error> {
        let text = text::render_time(format, time);
        self.print(&text).await
    }

    pub async fn strftime_at<T: TimeFormat>(
        &mut self,
        column: u8,
        row: u8,
        format: &str,
        time: &T,
    ) -> Result<(), I::Error> {
        self.set_cursor(column, row).await?;
        self.strftime(format, time).await
    }

    /// Clear the display
    pub async fn clear(&mut self) -> Result<(), I::Error> {
        self.send(Control::Cmd, Commands::Clear as u8).await?;
        self.delay.delay_us(CLEAR_DELAY_US).await;
        self.state.home();
        Ok(())
    }

    /// Return cursor to upper left corner, i.e. (0,0).
    pub async fn return_home(&mut self) -> Result<(), I::Error> {
        self.send(Control::Cmd, Commands::ReturnHome as u8).await?;
        self.delay.delay_us(CLEAR_DELAY_US).await;
        self.state.home();
        Ok(())
    }

    pub async fn clear_line(&mut self, row: u8) -> Result<(), I::Error> {
        if row >= self.config.rows {
            return Ok(());
        }
        self.set_cursor(0, row).await?;
        for _ in 0..self.config.columns {
            self.send(Control::Data, b' ').await?;
        }
        self.set_cursor(0, row).await
    }

    /// Set the cursor to (column, row). Positions outside the display are ignored.
    pub async fn set_cursor(&mut self, column: u8, row: u8) -> Result<(), I::Error> {
        let address = match state::ddram_address(self.config.columns, self.config.rows, column, row)
        {
            Some(address) => address,
            None => return Ok(()),
        };
        self.command(Mode::DDRAMAddr, address).await?;
        self.state.cursor = CursorPosition { column, row };
        Ok(())
    }

    pub async fn cursor_on(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::CursorOn, true).await
    }

    pub async fn cursor_off(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::CursorOn, false).await
    }

    pub async fn blink_on(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::CursorBlink, true)
            .await
    }

    pub async fn blink_off(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::CursorBlink, false)
            .await
    }

    async fn display_control(&mut self, flag: DisplayControl, on: bool) -> Result<(), I::Error> {
        let instruction = self.state.toggle(flag, on);
        self.send(Control::Cmd, instruction).await
    }

    /// Set contrast 0..=63, larger values wrap to 0.
    pub async fn set_contrast(&mut self, value: u8) -> Result<(), I::Error> {
        let value = state::wrap_contrast(value);
        self.state.contrast = value;
        self.config.contrast = value;
        self.command(Mode::ContrastSet, state::contrast_low(value))
            .await?;
        self.command(Mode::PowerIconContrast, state::contrast_high(value))
            .await
    }

    pub fn backlight(&mut self) {
        self.state.backlight = Backlight::On;
        debug!("backlight on, needs external control");
    }

    pub fn no_backlight(&mut self) {
        self.state.backlight = Backlight::Off;
        debug!("backlight off, needs external control");
    }

    pub fn backlight_state(&self) -> Backlight {
        self.state.backlight
    }

    pub fn contrast(&self) -> u8 {
        self.state.contrast
    }

    pub fn cursor_position(&self) -> CursorPosition {
        self.state.cursor
    }

    pub fn display_control_flags(&self) -> u8 {
        self.state.display_control
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clear the display ahead of rendering a new frame. Nothing is rendered here, print the
    /// frame right after awaiting this.
    pub async fn refresh(&mut self) -> Result<(), I::Error> {
        self.clear().await
    }

    pub fn describe(&self) -> TextBuffer {
        text::render(format_args!(
            "ST7032 I2C LCD {}x{} at {:#04x}, contrast {}, {} user characters",
            self.config.columns,
            self.config.rows,
            self.config.address,
            self.state.contrast,
            self.config.user_characters.len()
        ))
    }

    pub fn dump_config(&self) {
        info!("{}", self.describe());
    }

    pub fn release(self) -> Option<RST> {
        self.reset
    }
}

impl<'a, I, D, RST> CharacterDisplay for Lcd<'a, I, D, RST>
where
    I: I2c,
    D: DelayNs,
    RST: OutputPin,
{
    fn columns(&self) -> u8 {
        self.config.columns
    }

    fn rows(&self) -> u8 {
        self.config.rows
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction as I2cTransaction},
    };
    use std::vec::Vec;

    const ADDR: u8 = 0x3e;

    fn cmd(byte: u8) -> I2cTransaction {
        I2cTransaction::write(ADDR, std::vec![0x00, byte])
    }

    fn data(byte: u8) -> I2cTransaction {
        I2cTransaction::write(ADDR, std::vec![0x40, byte])
    }

    fn init_sequence() -> Vec<I2cTransaction> {
        std::vec![
            cmd(0x39),
            cmd(0x1c),
            cmd(0x58),
            cmd(0x70),
            cmd(0x5e),
            cmd(0x6c),
            cmd(0x0c),
            cmd(0x01),
        ]
    }

    #[tokio::test]
    async fn setup_sends_power_on_sequence() {
        let mut i2c = I2cMock::new(&init_sequence());
        let mut delay = NoopDelay::new();

        let lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
        assert_eq!(lcd.contrast(), 32);
        i2c.done();
    }

    #[tokio::test]
    async fn user_characters_end_on_extended_table() {
        let mut expectations = init_sequence();
        expectations.push(cmd(0x38));
        expectations.push(cmd(0x48));
        expectations.extend((0..8).map(|_| data(0x11)));
        expectations.push(cmd(0x39));
        expectations.push(cmd(0x80));
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = NoopDelay::new();

        Lcd::new(&mut i2c, &mut delay)
            .with_user_character(1, &[0x11; 8])
            .init()
            .await
            .unwrap();
        i2c.done();
    }

    #[tokio::test]
    async fn clear_line_and_glyph_remap() {
        let mut expectations = init_sequence();
        expectations.push(cmd(0xc0));
        expectations.extend((0..16).map(|_| data(b' ')));
        expectations.push(cmd(0xc0));
        expectations.push(data(0x05));
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = NoopDelay::new();

        let mut lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
        lcd.clear_line(1).await.unwrap();
        lcd.print("\u{85}").await.unwrap();
        assert_eq!(lcd.cursor_position(), CursorPosition { column: 1, row: 1 });
        i2c.done();
    }

    #[tokio::test]
    async fn chars_beyond_latin1_print_placeholder() {
        let mut expectations = init_sequence();
        expectations.push(data(b'?'));
        expectations.push(data(0x07));
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = NoopDelay::new();

        let mut lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
        lcd.print("\u{107}\u{87}").await.unwrap();
        i2c.done();
    }

    #[tokio::test]
    async fn refresh_clears_and_homes() {
        let mut expectations = init_sequence();
        expectations.push(cmd(0xc7));
        expectations.push(cmd(0x01));
        let mut i2c = I2cMock::new(&expectations);
        let mut delay = NoopDelay::new();

        let mut lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
        lcd.set_cursor(7, 1).await.unwrap();
        lcd.refresh().await.unwrap();
        assert_eq!(lcd.cursor_position(), CursorPosition::default());
        i2c.done();
    }
}
