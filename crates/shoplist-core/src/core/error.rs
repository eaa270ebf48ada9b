use std::fmt;

/// Categories of failures that can reach the update handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backend has no such record. Nodes render an empty state for it.
    NotFound,
    /// Malformed button token or operation.
    Validation,
    /// Backend unreachable, timed out, or answered with a non-2xx status.
    Transport,
    /// The token or session points at a node nobody registered.
    NodeNotFound,
    /// The session expired between lookup and dispatch.
    RaceAnomaly,
}

impl ErrorKind {
    /// Text shown to the user when an error of this kind ends processing.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "Nothing here yet.",
            ErrorKind::Validation => "Sorry, that button is no longer valid.",
            ErrorKind::Transport => "The list service is unavailable. Try again later.",
            ErrorKind::NodeNotFound => "Sorry, something went wrong.",
            ErrorKind::RaceAnomaly => "Your session expired. Please try again.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::NodeNotFound => write!(f, "node_not_found"),
            ErrorKind::RaceAnomaly => write!(f, "race_anomaly"),
        }
    }
}

/// Structured error from the routing core and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    /// Error category
    pub kind: ErrorKind,
    /// One-line summary suitable for logs
    pub message: String,
    /// Optional additional details (e.g., raw response body)
    pub details: Option<String>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn node_not_found(node: &str) -> Self {
        Self::new(ErrorKind::NodeNotFound, format!("node '{node}' not found"))
    }

    pub fn race_anomaly(user_id: i64) -> Self {
        Self::new(
            ErrorKind::RaceAnomaly,
            format!("session for user {user_id} expired during lookup"),
        )
    }

    /// Creates an HTTP status error. 404 maps to `NotFound`.
    pub fn http_status(status: u16, body: &str) -> Self {
        let kind = if status == 404 {
            ErrorKind::NotFound
        } else {
            ErrorKind::Transport
        };
        let error = Self::new(kind, format!("HTTP {status}"));
        if body.trim().is_empty() {
            error
        } else {
            error.with_details(body.to_string())
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Prefixes the message with the node that produced it.
    #[must_use]
    pub fn in_node(mut self, node: &str) -> Self {
        self.message = format!("{node}: {}", self.message);
        self
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CoreError {}

/// Result type for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_404_is_not_found() {
        let err = CoreError::http_status(404, "");
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.details.is_none());
    }

    #[test]
    fn http_5xx_is_transport_with_body() {
        let err = CoreError::http_status(502, "bad gateway");
        assert_eq!(err.kind, ErrorKind::Transport);
        assert_eq!(err.details.as_deref(), Some("bad gateway"));
        assert_eq!(err.to_string(), "transport: HTTP 502");
    }

    #[test]
    fn node_prefix_keeps_kind() {
        let err = CoreError::validation("bad list id").in_node("checklist");
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.message, "checklist: bad list id");
    }
}
