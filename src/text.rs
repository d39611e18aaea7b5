use core::fmt::{self, Write};

/// Capacity of the buffer formatted output is rendered into.
pub const TEXT_BUFFER_LEN: usize = 64;

/// Rendered text, silently cut at [`TEXT_BUFFER_LEN`] bytes.
pub type TextBuffer = heapless::String<TEXT_BUFFER_LEN>;

/// Something that knows how to render itself from a strftime-like pattern.
pub trait TimeFormat {
    fn format_time<W: Write>(&self, format: &str, out: &mut W) -> fmt::Result;
}

#[cfg(feature = "chrono")]
impl<Tz> TimeFormat for chrono::DateTime<Tz>
where
    Tz: chrono::TimeZone,
    Tz::Offset: fmt::Display,
{
    fn format_time<W: Write>(&self, format: &str, out: &mut W) -> fmt::Result {
        write!(out, "{}", self.format(format))
    }
}

#[cfg(feature = "chrono")]
impl TimeFormat for chrono::NaiveDateTime {
    fn format_time<W: Write>(&self, format: &str, out: &mut W) -> fmt::Result {
        write!(out, "{}", self.format(format))
    }
}

#[cfg(feature = "chrono")]
impl TimeFormat for chrono::NaiveTime {
    fn format_time<W: Write>(&self, format: &str, out: &mut W) -> fmt::Result {
        write!(out, "{}", self.format(format))
    }
}

/// Writer that keeps what fits and drops the rest.
struct Truncating {
    buf: TextBuffer,
    full: bool,
}

impl Truncating {
    fn new() -> Self {
        Self {
            buf: TextBuffer::new(),
            full: false,
        }
    }
}

impl Write for Truncating {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.full {
                break;
            }
            self.full = self.buf.push(c).is_err();
        }
        Ok(())
    }
}

pub(crate) fn render(args: fmt::Arguments<'_>) -> TextBuffer {
    let mut out = Truncating::new();
    // Only a failing Display impl can error here, keep what it produced.
    let _ = out.write_fmt(args);
    out.buf
}

pub(crate) fn render_time<T: TimeFormat>(format: &str, time: &T) -> TextBuffer {
    let mut out = Truncating::new();
    let _ = time.format_time(format, &mut out);
    out.buf
}
