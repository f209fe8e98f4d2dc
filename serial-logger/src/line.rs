/// Default marker printed by the firmware on reset.
pub const RESET_MARKER: &str = "------";

/// Accumulates raw serial chunks and yields complete lines.
///
/// Chunks may split a line anywhere, including inside a `\r\n` pair or inside a
/// multi-byte character; bytes are held until the terminating `\n` arrives.
#[derive(Debug, Clone)]
pub struct LineAssembler {
    buf: Vec<u8>,
    reset_marker: String,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(RESET_MARKER)
    }
}

impl LineAssembler {
    pub fn new(reset_marker: impl Into<String>) -> Self {
        Self {
            buf: Vec::new(),
            reset_marker: reset_marker.into(),
        }
    }

    /// Bytes received but not yet terminated by `\n`.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Feeds a chunk and returns the lines it completed, in order.
    ///
    /// A line containing the reset marker drops everything still buffered and
    /// is not returned itself. Blank lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1])
                .trim()
                .to_string();

            if !self.reset_marker.is_empty() && line.contains(&self.reset_marker) {
                debug!("Reset marker detected, flushing {} buffered bytes", self.buf.len());
                self.buf.clear();
                continue;
            }

            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}
