use super::{Result, Writer, ensure_open};

/// Which ends of the output (or of each line) lose their whitespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimMode {
    Leading,
    Trailing,
    #[default]
    Both,
}

impl TrimMode {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "leading" => Some(TrimMode::Leading),
            "trailing" => Some(TrimMode::Trailing),
            "both" => Some(TrimMode::Both),
            _ => None,
        }
    }

    fn leading(self) -> bool {
        matches!(self, TrimMode::Leading | TrimMode::Both)
    }

    fn trailing(self) -> bool {
        matches!(self, TrimMode::Trailing | TrimMode::Both)
    }
}

/// Strips whitespace from the start and/or end of the output.
///
/// In multi-line mode every line is trimmed on its own and the line
/// endings (`\n` or `\r\n`) are kept. Trailing whitespace is held back
/// until something other than whitespace follows it, so the final decision
/// is only made on [`close`](Writer::close) or
/// [`finish`](TrimWriter::finish). [`flush`](Writer::flush) does not
/// release it.
#[derive(Debug)]
pub struct TrimWriter<W: Writer> {
    inner: W,
    mode: TrimMode,
    multi_line: bool,
    at_line_start: bool,
    pending: String,
    /// A `\r` that may turn out to start a `\r\n`
    held_cr: bool,
    closed: bool,
}

impl<W: Writer> TrimWriter<W> {
    pub fn new(inner: W, mode: TrimMode, multi_line: bool) -> Self {
        Self {
            inner,
            mode,
            multi_line,
            at_line_start: true,
            pending: String::new(),
            held_cr: false,
            closed: false,
        }
    }

    /// Drop held-back trailing whitespace and return the inner writer, still open
    pub fn finish(mut self) -> Result<W> {
        ensure_open(self.closed)?;
        self.settle()?;
        Ok(self.inner)
    }

    /// Resolve a `\r` left at the very end, then drop trailing whitespace
    fn settle(&mut self) -> Result<()> {
        if self.held_cr {
            self.held_cr = false;
            let mut out = String::new();
            self.push_char('\r', &mut out);
            if !out.is_empty() {
                self.inner.write_str(&out)?;
            }
        }
        self.pending.clear();
        Ok(())
    }

    fn trim(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if self.held_cr {
                self.held_cr = false;
                if c == '\n' {
                    self.end_line("\r\n", &mut out);
                    continue;
                }
                self.push_char('\r', &mut out);
            }
            match c {
                '\r' if self.multi_line => self.held_cr = true,
                '\n' if self.multi_line => self.end_line("\n", &mut out),
                c => self.push_char(c, &mut out),
            }
        }
        out
    }

    fn end_line(&mut self, ending: &str, out: &mut String) {
        if !self.mode.trailing() {
            out.push_str(&self.pending);
        }
        self.pending.clear();
        out.push_str(ending);
        self.at_line_start = true;
    }

    fn push_char(&mut self, c: char, out: &mut String) {
        if c.is_whitespace() {
            if self.at_line_start && self.mode.leading() {
                return;
            }
            if self.mode.trailing() {
                self.pending.push(c);
            } else {
                out.push(c);
            }
        } else {
            out.push_str(&self.pending);
            self.pending.clear();
            out.push(c);
            self.at_line_start = false;
        }
    }
}

impl<W: Writer> Writer for TrimWriter<W> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        ensure_open(self.closed)?;
        let out = self.trim(text);
        if out.is_empty() {
            return Ok(());
        }
        self.inner.write_str(&out)
    }

    fn flush(&mut self) -> Result<()> {
        ensure_open(self.closed)?;
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
