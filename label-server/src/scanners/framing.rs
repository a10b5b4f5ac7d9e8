//! Line framing for scanner byte streams

/// Accumulates bytes and yields complete lines.
///
/// Lines end at any run of `\r` / `\n`. Complete lines are trimmed and empty
/// ones dropped; the trailing partial line stays buffered for the next read.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the lines it completed, in arrival order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let Some(last_break) = self.buffer.rfind(['\r', '\n']) else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_break + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Bytes waiting for a line terminator
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
