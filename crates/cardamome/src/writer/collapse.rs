use super::{Result, Writer, ensure_open};

/// Replaces runs of a repeated whitespace unit with a single unit.
///
/// Runs shorter than the threshold pass through unchanged. A run still
/// open when writing stops is settled on flush, close or finish, so a run
/// that spans a flush is settled as two runs.
#[derive(Debug)]
pub struct CollapseWriter<W: Writer> {
    inner: W,
    unit: char,
    threshold: usize,
    run: usize,
    closed: bool,
}

impl<W: Writer> CollapseWriter<W> {
    pub fn new(inner: W, unit: char, threshold: usize) -> Self {
        Self {
            inner,
            unit,
            threshold: threshold.max(1),
            run: 0,
            closed: false,
        }
    }

    /// Blank-line collapsing: two or more newlines become one
    pub fn newlines(inner: W) -> Self {
        Self::new(inner, '\n', 2)
    }

    pub fn finish(mut self) -> Result<W> {
        ensure_open(self.closed)?;
        self.settle()?;
        Ok(self.inner)
    }

    fn settled_run(&mut self, out: &mut String) {
        let count = if self.run >= self.threshold { 1 } else { self.run };
        out.extend(std::iter::repeat_n(self.unit, count));
        self.run = 0;
    }

    fn settle(&mut self) -> Result<()> {
        let mut out = String::new();
        self.settled_run(&mut out);
        if out.is_empty() {
            return Ok(());
        }
        self.inner.write_str(&out)
    }
}

impl<W: Writer> Writer for CollapseWriter<W> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        ensure_open(self.closed)?;
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if c == self.unit {
                self.run += 1;
            } else {
                self.settled_run(&mut out);
                out.push(c);
            }
        }
        if out.is_empty() {
            return Ok(());
        }
        self.inner.write_str(&out)
    }

    fn flush(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.settle()?;
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
        self.settle()?;
        self.closed = true;
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
