use std::fmt;

/// What went wrong at a publisher, consumer or sink seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad settings; the client could not be built or pointed somewhere
    /// that does not exist.
    Config,
    /// Broker or database I/O.
    Io,
    /// Payload did not encode or decode.
    Format,
    /// Operation not valid in the current state (poll before subscribe,
    /// a panicked background task).
    State,
}

impl ErrorKind {
    /// Repeating the same call cannot succeed until someone intervenes.
    /// I/O may clear up on its own; a bad payload is skipped, not retried.
    pub fn is_permanent(self) -> bool {
        matches!(self, ErrorKind::Config | ErrorKind::State)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Format => "format",
            ErrorKind::State => "state",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every capability trait in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StageError {
    fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Io, message)
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Format, message)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::State, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for StageError {}

/// Lets record encoding use `?` on serde_json results.
impl From<serde_json::Error> for StageError {
    fn from(e: serde_json::Error) -> Self {
        Self::format(e.to_string())
    }
}
