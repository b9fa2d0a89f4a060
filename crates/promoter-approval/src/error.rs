//! Approval-service error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval request failed: {0}")]
    Transport(String),

    #[error("approval service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("approval service error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("malformed approval response: {0}")]
    Decode(String),

    #[error("invalid approval client settings: {0}")]
    Config(String),
}

impl ApprovalError {
    /// Whether retrying on a later cycle might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApprovalError::Transport(_) => true,
            ApprovalError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApprovalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApprovalError::Decode(e.to_string())
        } else {
            ApprovalError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ApprovalError::Transport("reset".to_string()).is_transient());
        assert!(ApprovalError::Status { status: 503, body: String::new() }.is_transient());
        assert!(ApprovalError::Status { status: 429, body: String::new() }.is_transient());
        assert!(!ApprovalError::Status { status: 403, body: String::new() }.is_transient());
        assert!(!ApprovalError::Api { code: 99991663, msg: "token invalid".to_string() }.is_transient());
        assert!(!ApprovalError::Decode("bad form".to_string()).is_transient());
    }

    #[test]
    fn error_display() {
        let err = ApprovalError::Api { code: 1, msg: "denied".to_string() };
        assert_eq!(err.to_string(), "approval service error 1: denied");
    }
}
