use super::{Result, Writer, ensure_open};

/// Holds output until flushed, so it can still be discarded
#[derive(Debug)]
pub struct BufferWriter<W: Writer> {
    inner: W,
    buffer: String,
    closed: bool,
}

impl<W: Writer> BufferWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: String::new(),
            closed: false,
        }
    }

    /// Text written since the last flush or clear
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Hand the buffered text on and return the inner writer, still open
    pub fn finish(mut self) -> Result<W> {
        ensure_open(self.closed)?;
        self.drain()?;
        Ok(self.inner)
    }

    fn drain(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.inner.write_str(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }
}

impl<W: Writer> Writer for BufferWriter<W> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        ensure_open(self.closed)?;
        self.buffer.push_str(text);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.drain()?;
        self.inner.flush()
    }

    fn clear(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.buffer.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriterError;
    use crate::writer::StringWriter;

    #[test]
    fn test_clear_discards_unflushed_output() {
        let mut w = BufferWriter::new(StringWriter::new());
        w.write_str("draft").unwrap();
        w.clear().unwrap();
        w.write_str("final").unwrap();
        assert_eq!(w.buffered(), "final");
        let inner = w.finish().unwrap();
        assert_eq!(inner.as_str(), "final");
        assert!(!inner.is_closed());
    }

    #[test]
    fn test_flush_hands_text_on() {
        let mut sink = StringWriter::new();
        let mut w = BufferWriter::new(&mut sink);
        w.write_str("a").unwrap();
        w.flush().unwrap();
        w.write_str("b").unwrap();
        w.clear().unwrap();
        w.close().unwrap();
        assert!(matches!(w.write_str("c"), Err(WriterError::Closed)));
        assert!(matches!(w.clear(), Err(WriterError::Closed)));
        assert_eq!(sink.as_str(), "a");
        assert!(sink.is_closed());
    }
}
