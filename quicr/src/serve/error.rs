/// Per-dialog and per-track errors. These never close the connection; they
/// surface as `*Error` replies or handler status changes.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ServeError {
    /// Graceful end of the dialog or track.
    #[error("done")]
    Done,

    #[error("cancelled")]
    Cancel,

    /// Closed by the peer with an application error code.
    #[error("closed, code={0}")]
    Closed(u64),

    #[error("not authorized")]
    NotAuthorized,

    #[error("track not found")]
    NotFound,

    #[error("duplicate")]
    Duplicate,

    /// The publisher requires a different track alias.
    #[error("retry with track alias {0}")]
    RetryTrackAlias(u64),

    #[error("timeout")]
    Timeout,

    #[error("invalid range")]
    InvalidRange,

    #[error("no objects available")]
    NoObjects,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServeError {
    /// The error code carried in SUBSCRIBE_ERROR, FETCH_ERROR, etc.
    pub fn code(&self) -> u64 {
        match self {
            Self::Done => 0x0,
            Self::Internal(_) => 0x0,
            Self::NotAuthorized => 0x1,
            Self::Cancel => 0x1,
            Self::RetryTrackAlias(_) => 0x2,
            Self::Timeout => 0x3,
            Self::NotFound => 0x4,
            Self::Duplicate => 0x5,
            Self::InvalidRange => 0x5,
            Self::NoObjects => 0x6,
            Self::Closed(code) => *code,
        }
    }
}
