//! Output sinks and the decorators that can be stacked over them
//!
//! Sinks ([`StringWriter`], [`IoWriter`], [`FileWriter`]) store or emit
//! text. Decorators ([`BufferWriter`], [`MuteWriter`], [`TrimWriter`],
//! [`CollapseWriter`]) wrap another writer and transform what passes
//! through. Every writer refuses further use once closed.

mod buffer;
mod collapse;
mod mute;
mod trim;

pub use buffer::BufferWriter;
pub use collapse::CollapseWriter;
pub use mute::MuteWriter;
pub use trim::{TrimMode, TrimWriter};

use crate::error::WriterError;
use crate::value::Value;
use camino::Utf8Path;
use std::fs::File;
use std::io::{self, BufWriter};

type Result<T, E = WriterError> = std::result::Result<T, E>;

/// Destination for rendered output
pub trait Writer {
    /// Write rendered text
    fn write_str(&mut self, text: &str) -> Result<()>;

    /// Write a value in its rendered form
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::String(text) => self.write_str(text),
            other => self.write_str(&other.render_to_string()),
        }
    }

    fn flush(&mut self) -> Result<()>;

    /// Discard output not yet handed on, where the writer can
    fn clear(&mut self) -> Result<()> {
        Err(WriterError::Unsupported { operation: "clear" })
    }

    /// Flush, then refuse every further write, flush and close
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

impl<W: Writer + ?Sized> Writer for &mut W {
    fn write_str(&mut self, text: &str) -> Result<()> {
        (**self).write_str(text)
    }

    fn write(&mut self, value: &Value) -> Result<()> {
        (**self).write(value)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        (**self).write_str(text)
    }

    fn write(&mut self, value: &Value) -> Result<()> {
        (**self).write(value)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// Fail with [`WriterError::Closed`] once `closed` is set
pub(crate) fn ensure_open(closed: bool) -> Result<()> {
    if closed {
        Err(WriterError::Closed)
    } else {
        Ok(())
    }
}

/// Collects output in memory
#[derive(Debug, Default)]
pub struct StringWriter {
    buffer: String,
    closed: bool,
}

impl StringWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl Writer for StringWriter {
    fn write_str(&mut self, text: &str) -> Result<()> {
        ensure_open(self.closed)?;
        self.buffer.push_str(text);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        ensure_open(self.closed)
    }

    fn close(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Writes UTF-8 text to any [`io::Write`]
#[derive(Debug)]
pub struct IoWriter<W: io::Write> {
    inner: W,
    closed: bool,
}

impl<W: io::Write> IoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> Writer for IoWriter<W> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        ensure_open(self.closed)?;
        self.inner.write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.inner.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Buffered output to a file; dropping it releases the handle
pub type FileWriter = IoWriter<BufWriter<File>>;

impl IoWriter<BufWriter<File>> {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}
