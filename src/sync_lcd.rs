use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use ufmt_write::uWrite;

use crate::config::{Config, UserCharacter};
use crate::error::Error;
use crate::state::{self, CursorPosition, DisplayState};
use crate::text::{self, TextBuffer, TimeFormat};
use crate::{
    Backlight, CharacterDisplay, Commands, Control, DisplayControl, Follower, InstructionTable,
    Mode, NoResetPin, Oscillator, Power, CLEAR_DELAY_US, DISPLAY_ON_DELAY_US, FOLLOWER_SETTLE_MS,
    LINE1_ADDR, POWER_ON_DELAY_MS, RESET_PULSE_MS, WRITE_DELAY_US,
};

/// Renders the display content, called by [`Lcd::refresh`] on a freshly cleared display.
pub type Writer<'a, I, D, RST> =
    fn(&mut Lcd<'a, I, D, RST>) -> Result<(), <I as embedded_hal::i2c::ErrorType>::Error>;

/// API to write to the LCD.
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
    writer: Option<Writer<'a, I, D, RST>>,
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
            writer: None,
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

    /// Contrast applied during setup, see [`Lcd::set_contrast`].
    pub fn with_contrast(mut self, contrast: u8) -> Self {
        self.config.set_contrast(contrast);
        self.state.contrast = self.config.contrast;
        self
    }

    /// Glyph loaded into slot `position` during setup.
    pub fn with_user_character(mut self, position: u8, pattern: &[u8]) -> Self {
        self.config
            .add_user_character(UserCharacter::new(position, pattern));
        self
    }

    /// Use an active-low reset line, pulsed at the start of every setup.
    ///
    /// The writer names the pin type in its signature, so a writer configured before this call
    /// is dropped and [`Lcd::refresh`] only clears. Configure the pin first.
    pub fn with_reset_pin<P: OutputPin>(self, pin: P) -> Lcd<'a, I, D, P> {
        if self.writer.is_some() {
            warn!("reset pin configured after writer, writer dropped");
        }
        Lcd {
            i2c: self.i2c,
            delay: self.delay,
            reset: Some(pin),
            config: self.config,
            state: self.state,
            writer: None,
        }
    }

    /// Rendering function run on every [`Lcd::refresh`]. Call after [`Lcd::with_reset_pin`].
    pub fn with_writer(mut self, writer: Writer<'a, I, D, RST>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Initializes the hardware and loads the user characters.
    pub fn init(mut self) -> Result<Self, Error<I::Error, RST::Error>> {
        self.setup()?;
        Ok(self)
    }

    /// Runs the power on sequence, followed by loading the user characters if there are any.
    ///
    /// Can be called again to recover a display that was left in an unknown state.
    pub fn setup(&mut self) -> Result<(), Error<I::Error, RST::Error>> {
        debug!(
            "setting up ST7032 display at {:#04x}",
            self.config.address
        );
        self.init_display()?;
        if !self.config.user_characters.is_empty() {
            self.load_user_characters().map_err(Error::I2c)?;
        }
        info!("ST7032 display initialized");
        Ok(())
    }

    /// Power on procedure from the ST7032 [datasheet], 8 bit I2C variant.
    ///
    /// [datasheet]: https://www.newhavendisplay.com/app_notes/ST7032.pdf
    fn init_display(&mut self) -> Result<(), Error<I::Error, RST::Error>> {
        if let Some(reset) = self.reset.as_mut() {
            debug!("pulsing reset line");
            reset.set_low().map_err(Error::ResetPin)?;
            self.delay.delay_ms(RESET_PULSE_MS);
            reset.set_high().map_err(Error::ResetPin)?;
        }

        // Required even without reset line, covers a cold power on.
        self.delay.delay_ms(POWER_ON_DELAY_MS);

        self.power_on().map_err(Error::I2c)
    }

    fn power_on(&mut self) -> Result<(), I::Error> {
        self.function_set(InstructionTable::Extended)?;
        self.command(
            Mode::OscFrequency,
            Oscillator::BiasQuarter as u8 | Oscillator::F2 as u8,
        )?;
        // Booster stays off here, the contrast write turns it on.
        self.command(Mode::PowerIconContrast, Power::IconOn as u8)?;
        self.set_contrast(self.config.contrast)?;
        self.command(
            Mode::FollowerControl,
            Follower::On as u8 | Follower::Rab2 as u8,
        )?;

        // Follower and booster need this long before the display can be switched on.
        debug!("waiting {} ms for the voltage follower", FOLLOWER_SETTLE_MS);
        self.delay.delay_ms(FOLLOWER_SETTLE_MS);

        self.state.display_control = DisplayControl::Off as u8;
        let display_on = self.state.toggle(DisplayControl::DisplayOn, true);
        self.send(Control::Cmd, display_on)?;
        self.delay.delay_us(DISPLAY_ON_DELAY_US);

        self.clear()
    }

    /// Writes the configured glyphs to CGRAM, only reachable on the normal instruction table.
    fn load_user_characters(&mut self) -> Result<(), I::Error> {
        debug!(
            "loading {} user characters",
            self.config.user_characters.len()
        );
        self.select_table(InstructionTable::Normal)?;
        for i in 0..self.config.user_characters.len() {
            let character = self.config.user_characters[i];
            self.command(Mode::CGRAMAddr, state::cgram_address(character.position))?;
            for row in character.pattern {
                self.send(Control::Data, row)?;
            }
        }
        self.select_table(InstructionTable::Extended)?;
        // Leave the address counter in DDRAM again.
        self.command(Mode::DDRAMAddr, LINE1_ADDR)
    }

    fn send(&mut self, control: Control, data: u8) -> Result<(), I::Error> {
        self.i2c.write(self.config.address, &[control as u8, data])?;
        self.delay.delay_us(WRITE_DELAY_US);
        Ok(())
    }

    fn function_set(&mut self, table: InstructionTable) -> Result<(), I::Error> {
        self.send(Control::Cmd, state::function_set(table))?;
        self.state.table = Some(table);
        Ok(())
    }

    /// Switches the instruction table if the active one is a different one.
    fn select_table(&mut self, table: InstructionTable) -> Result<(), I::Error> {
        if self.state.table == Some(table) {
            return Ok(());
        }
        self.function_set(table)
    }

    /// Sends an instruction, making sure the table it's defined on is active.
    fn command(&mut self, mode: Mode, data: u8) -> Result<(), I::Error> {
        if let Some(table) = mode.table() {
            self.select_table(table)?;
        }
        self.send(Control::Cmd, mode as u8 | data)
    }

    fn write_data(&mut self, data: u8) -> Result<(), I::Error> {
        self.send(Control::Data, data)
    }

    /// Write a single character, `0x80..=0x87` print the user characters 0 to 7.
    ///
    /// The cursor is not wrapped at the end of the line.
    pub fn write_char(&mut self, c: u8) -> Result<(), I::Error> {
        self.write_data(state::remap_glyph(c))?;
        self.state.advance();
        Ok(())
    }

    /// Write string to display.
    pub fn print(&mut self, data: &str) -> Result<(), I::Error> {
        for c in data.chars() {
            self.write_char(state::encode_char(c))?;
        }
        Ok(())
    }

    /// Write string starting at (column, row).
    pub fn print_at(&mut self, column: u8, row: u8, data: &str) -> Result<(), I::Error> {
        self.set_cursor(column, row)?;
        self.print(data)
    }

    /// Write formatted text, cut at [`crate::TEXT_BUFFER_LEN`] bytes.
    ///
    /// ```ignore
    /// lcd.print_fmt(format_args!("{:>5.1} C", temperature))?;
    /// ```
    pub fn print_fmt(&mut self, args: core::fmt::Arguments<'_>) -> Result<(), I::Error> {
        let text = text::render(args);
        self.print(&text)
    }

    pub fn print_fmt_at(
        &mut self,
        column: u8,
        row: u8,
        args: core::fmt::Arguments<'_>,
    ) -> Result<(), I::Error> {
        self.set_cursor(column, row)?;
        self.print_fmt(args)
    }

    /// Write `time` rendered with a strftime-like `format`.
    pub fn strftime<T: TimeFormat>(&mut self, format: &str, time: &T) -> Result<(), I::Error> {
        let text = text::render_time(format, time);
        self.print(&text)
    }

    pub fn strftime_at<T: TimeFormat>(
        &mut self,
        column: u8,
        row: u8,
        format: &str,
        time: &T,
    ) -> Result<(), I::Error> {
        self.set_cursor(column, row)?;
        self.strftime(format, time)
    }

    /// Clear the display
    pub fn clear(&mut self) -> Result<(), I::Error> {
        self.send(Control::Cmd, Commands::Clear as u8)?;
        self.delay.delay_us(CLEAR_DELAY_US);
        self.state.home();
        Ok(())
    }

    /// Return cursor to upper left corner, i.e. (0,0).
    pub fn return_home(&mut self) -> Result<(), I::Error> {
        self.send(Control::Cmd, Commands::ReturnHome as u8)?;
        self.delay.delay_us(CLEAR_DELAY_US);
        self.state.home();
        Ok(())
    }

    /// Overwrite one line with spaces and put the cursor at its start. Ignored for rows outside
    /// the display.
    pub fn clear_line(&mut self, row: u8) -> Result<(), I::Error> {
        if row >= self.config.rows {
            return Ok(());
        }
        self.set_cursor(0, row)?;
        for _ in 0..self.config.columns {
            self.write_data(b' ')?;
        }
        self.set_cursor(0, row)
    }

    /// Set the cursor to (column, row). Coordinates are zero-based, positions outside the
    /// display are ignored.
    pub fn set_cursor(&mut self, column: u8, row: u8) -> Result<(), I::Error> {
        let address = match state::ddram_address(self.config.columns, self.config.rows, column, row)
        {
            Some(address) => address,
            None => return Ok(()),
        };
        self.command(Mode::DDRAMAddr, address)?;
        self.state.cursor = CursorPosition { column, row };
        Ok(())
    }

    pub fn cursor_on(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::CursorOn, true)
    }

    pub fn cursor_off(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::CursorOn, false)
    }

    pub fn blink_on(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::CursorBlink, true)
    }

    pub fn blink_off(&mut self) -> Result<(), I::Error> {
        self.display_control(DisplayControl::CursorBlink, false)
    }

    fn display_control(&mut self, flag: DisplayControl, on: bool) -> Result<(), I::Error> {
        let instruction = self.state.toggle(flag, on);
        self.send(Control::Cmd, instruction)
    }

    /// Set contrast 0..=63, larger values wrap to 0.
    pub fn set_contrast(&mut self, value: u8) -> Result<(), I::Error> {
        let value = state::wrap_contrast(value);
        self.state.contrast = value;
        self.config.contrast = value;
        self.command(Mode::ContrastSet, state::contrast_low(value))?;
        self.command(Mode::PowerIconContrast, state::contrast_high(value))
    }

    /// Only records the state, the backlight is driven outside of this driver.
    pub fn backlight(&mut self) {
        self.state.backlight = Backlight::On;
        debug!("backlight on, needs external control");
    }

    /// Only records the state, the backlight is driven outside of this driver.
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

    /// Currently set [`DisplayControl`] flags.
    pub fn display_control_flags(&self) -> u8 {
        self.state.display_control
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clear the display and run the writer, if one is configured.
    pub fn refresh(&mut self) -> Result<(), I::Error> {
        self.clear()?;
        if let Some(writer) = self.writer {
            writer(self)?;
        }
        Ok(())
    }

    /// Short human-readable summary of the configuration.
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

    /// Hand back the reset line.
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

impl<'a, I, D, RST> uWrite for Lcd<'a, I, D, RST>
where
    I: I2c,
    D: DelayNs,
    RST: OutputPin,
{
    type Error = I::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.print(s)
    }
}

impl<'a, I, D, RST> core::fmt::Write for Lcd<'a, I, D, RST>
where
    I: I2c,
    D: DelayNs,
    RST: OutputPin,
{
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.print(s).map_err(|_| core::fmt::Error)
    }
}
