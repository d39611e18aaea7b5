/// Errors returned while bringing the display up.
///
/// Everything after setup only touches the bus and returns the I2C error as is.
#[derive(Debug, PartialEq, Eq)]
pub enum Error<I2cE, PinE> {
    /// The I2C implementation failed to write, e.g. the module did not acknowledge.
    I2c(I2cE),
    /// Driving the reset line failed.
    ResetPin(PinE),
}

impl<I2cE, PinE> core::fmt::Display for Error<I2cE, PinE>
where
    I2cE: core::fmt::Debug,
    PinE: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {:?}", e),
            Error::ResetPin(e) => write!(f, "reset pin error: {:?}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl<I2cE, PinE> defmt::Format for Error<I2cE, PinE> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::I2c(_e) => defmt::write!(fmt, "I2C error"),
            Error::ResetPin(_e) => defmt::write!(fmt, "Reset pin error"),
        }
    }
}
