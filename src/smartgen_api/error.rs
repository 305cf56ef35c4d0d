use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// Timeout, DNS failure, refused connection and friends.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The vendor answered with JSON that signals a failure.
    #[error("request rejected by SmartGen (code {code:?}): {message}")]
    Rejected { code: Option<i64>, message: String },
    /// HTML error page or any other body that is not a JSON object.
    #[error("malformed response (HTTP {status})")]
    Malformed { status: u16, snippet: String },
}

impl ApiError {
    /// Rejections that will not go away by retrying with the same tokens.
    pub fn is_credential_problem(&self) -> bool {
        match self {
            ApiError::Rejected { code, message } => {
                if matches!(code, Some(401) | Some(403)) {
                    return true;
                }
                let message = message.to_ascii_lowercase();
                message.contains("token")
                    && (message.contains("invalid") || message.contains("expired"))
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport",
            ApiError::Rejected { .. } => "rejected",
            ApiError::Malformed { .. } => "malformed",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Transport(format!("request timed out: {}", e))
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}
