#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Can not write {count} session cookies to the response, only {limit} allowed")]
    TooManyCookies { count: usize, limit: usize },

    #[error("Can not write {bytes} bytes of session cookies to the response, only {limit} allowed")]
    CookiesTooLarge { bytes: usize, limit: usize },

    #[error("No fragment of at least {floor} bytes fits within the {limit} byte cookie ceiling")]
    ChunkBudget { floor: usize, limit: usize },

    #[error("Invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),

    #[error("\"{0}\" is a reserved session attribute name")]
    ReservedAttribute(String),

    #[error("Failed to serialize session data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Session cookie is not a valid header value")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
}
