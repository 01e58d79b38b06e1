//! Host-supplied side-effect capability for the user-initiated export
//! actions (clipboard, file save). Keeps the core free of platform calls and
//! testable with a recording sink.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("clipboard write failed: {0}")]
    Clipboard(String),
    #[error("file save failed: {0}")]
    File(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("action unavailable while the response is still streaming")]
    StreamingInProgress,
}

pub trait ExportSink {
    /// Write both representations at once so the paste target can pick.
    fn write_clipboard(&self, html: &str, text: &str) -> Result<(), ExportError>;

    fn write_clipboard_text(&self, text: &str) -> Result<(), ExportError>;

    fn save_file(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError>;
}
