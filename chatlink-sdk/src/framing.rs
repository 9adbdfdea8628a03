//! Reassembly of protocol lines from transport frames.
//!
//! A WebSocket text frame may carry several `\r\n`-terminated lines, and a
//! line may straddle two frames. [`LineBuffer`] keeps the unterminated tail of
//! one frame and completes it with the next.

/// Upper bound on an unterminated line. Longer tails are discarded.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame and return every line it completes, without
    /// terminators and with empty lines dropped.
    pub fn push(&mut self, frame: &str) -> Vec<String> {
        self.pending.push_str(frame);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.pending[consumed..].find('\n') {
            let end = consumed + pos;
            let line = self.pending[consumed..end].trim_end_matches('\r');
            if !line.is_empty() {
                lines.push(line.to_string());
            }
            consumed = end + 1;
        }
        self.pending.drain(..consumed);

        if self.pending.len() > MAX_PENDING_BYTES {
            tracing::warn!(
                bytes = self.pending.len(),
                "Discarding oversized unterminated line"
            );
            self.pending.clear();
        }
        lines
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
