//! Copy action for code blocks: refused while the message is still
//! streaming, with a transient acknowledgment after a successful write.

use std::time::{Duration, Instant};

use crate::export::{ExportError, ExportSink};
use crate::tree::CodeBlock;

pub const COPY_ACK_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct CopyControl {
    ack: Duration,
    copied_at: Option<Instant>,
}

impl Default for CopyControl {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyControl {
    pub fn new() -> Self {
        Self::with_ack(COPY_ACK_DURATION)
    }

    pub fn with_ack(ack: Duration) -> Self {
        Self {
            ack,
            copied_at: None,
        }
    }

    /// Copy the code block source to the clipboard. Refused while streaming:
    /// a half-formed block must not be copied.
    pub fn copy(
        &mut self,
        block: &CodeBlock,
        streaming: bool,
        sink: &dyn ExportSink,
        now: Instant,
    ) -> Result<(), ExportError> {
        if streaming {
            return Err(ExportError::StreamingInProgress);
        }
        sink.write_clipboard_text(&block.source)?;
        self.copied_at = Some(now);
        Ok(())
    }

    /// True while the "copied" acknowledgment should still be shown.
    pub fn acknowledged(&self, now: Instant) -> bool {
        self.copied_at
            .is_some_and(|at| now.duration_since(at) < self.ack)
    }
}
