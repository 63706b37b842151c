use super::{Result, Writer, ensure_open};

/// Drops everything written while muted
#[derive(Debug)]
pub struct MuteWriter<W: Writer> {
    inner: W,
    muted: bool,
    closed: bool,
}

impl<W: Writer> MuteWriter<W> {
    pub fn new(inner: W, muted: bool) -> Self {
        Self {
            inner,
            muted,
            closed: false,
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn finish(self) -> Result<W> {
        ensure_open(self.closed)?;
        Ok(self.inner)
    }
}

impl<W: Writer> Writer for MuteWriter<W> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        ensure_open(self.closed)?;
        if self.muted {
            return Ok(());
        }
        self.inner.write_str(text)
    }

    fn flush(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.inner.flush()
    }

    fn clear(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.inner.clear()
    }

    fn close(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.closed = true;
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
