//! Failure taxonomy for a single poll cycle.
//!
//! Every variant is recoverable: the heartbeat logs it and the scheduler
//! decides when the next attempt may run. Nothing here is process-fatal.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AirlyError {
    /// DNS, TLS or socket failure before a status line was received.
    #[error("connection to airly api failed: {0}")]
    Transport(String),

    /// Body bytes of a 200 response were not valid UTF-8 JSON.
    #[error("response body could not be decoded: {0}")]
    Decode(String),

    /// 401/403/404: bad API key or no access to the installation.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// 200 response without a current measurements section.
    #[error("sensor id ({0}) not exists")]
    NotFound(u32),

    /// 429: daily or per-minute request quota exhausted.
    #[error("too many requests: {0}")]
    RateLimited(String),

    /// Any other status, or a payload with an unexpected shape.
    #[error("unrecognized error: {status}: {message}")]
    Unrecognized { status: u16, message: String },
}

impl AirlyError {
    /// Short tag used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AirlyError::Transport(_) => "transport",
            AirlyError::Decode(_) => "decode",
            AirlyError::Unauthorized(_) => "unauthorized",
            AirlyError::NotFound(_) => "not_found",
            AirlyError::RateLimited(_) => "rate_limited",
            AirlyError::Unrecognized { .. } => "unrecognized",
        }
    }
}
