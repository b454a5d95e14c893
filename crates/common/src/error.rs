use thiserror::Error;

/// Failures the watcher can run into while polling, interpreting or
/// delivering. Every variant is retryable; the poll loop catches all of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server returned code {code} ({reason})")]
    Server { code: u16, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Missing field \"{0}\"")]
    MissingField(String),

    #[error("Unexpected status value \"{0}\"")]
    UnknownStatus(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WatchError {
    /// Build a `Server` error, filling in the canonical reason phrase for `code`.
    pub fn server(code: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown Status");
        WatchError::Server {
            code,
            reason: reason.to_string(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        WatchError::MissingField(field.to_string())
    }

    /// Short machine-friendly tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WatchError::Transport(_) => "transport",
            WatchError::Server { .. } => "server",
            WatchError::Decode(_) => "decode",
            WatchError::MissingField(_) => "missing_field",
            WatchError::UnknownStatus(_) => "unknown_status",
            WatchError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for WatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WatchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            WatchError::server(status.as_u16())
        } else {
            WatchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(err: serde_json::Error) -> Self {
        WatchError::Decode(err.to_string())
    }
}
