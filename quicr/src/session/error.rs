use crate::coding::{self, DecodeError, EncodeError};
use crate::serve::ServeError;
use crate::setup::Versions;
use crate::transport::TransportError;

#[derive(thiserror::Error, Debug, Clone)]
pub enum SessionError {
    #[error("webtransport session: {0}")]
    Session(#[from] web_transport::SessionError),

    #[error("webtransport write: {0}")]
    Write(#[from] web_transport::WriteError),

    #[error("webtransport read: {0}")]
    Read(#[from] web_transport::ReadError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("unsupported versions: offered={0:?} supported={1:?}")]
    Version(Versions, Versions),

    /// The peer broke a protocol rule; always closes the connection.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// A request id was reused or went backwards.
    #[error("duplicate request id: {0}")]
    DuplicateRequestId(u64),

    /// A track alias is already bound on this connection.
    #[error("duplicate track alias: {0}")]
    DuplicateTrackAlias(u64),

    /// The peer did not close within the drain window after GoAway.
    #[error("goaway timeout")]
    GoAwayTimeout,

    /// The peer's MaxRequestId window is exhausted.
    #[error("too many requests")]
    TooManyRequests,

    #[error("not connected")]
    NotConnected,

    /// Some VarInt was too large and we were too lazy to handle it
    #[error("varint bounds exceeded")]
    BoundsExceeded(#[from] coding::BoundsExceeded),

    #[error("internal error")]
    Internal,

    #[error("serve error: {0}")]
    Serve(#[from] ServeError),

    #[error("wrong size")]
    WrongSize,
}

impl SessionError {
    /// The termination code sent over the wire when this error closes the
    /// connection.
    pub fn code(&self) -> u64 {
        match self {
            // INTERNAL_ERROR
            Self::Session(_) => 0x1,
            Self::Read(_) => 0x1,
            Self::Write(_) => 0x1,
            Self::Encode(_) => 0x1,
            Self::Transport(_) => 0x1,
            Self::BoundsExceeded(_) => 0x1,
            Self::Internal => 0x1,
            Self::NotConnected => 0x1,
            // PROTOCOL_VIOLATION
            Self::ProtocolViolation(_) => 0x3,
            Self::Decode(_) => 0x3,
            Self::DuplicateRequestId(_) => 0x3,
            Self::WrongSize => 0x3,
            // DUPLICATE_TRACK_ALIAS
            Self::DuplicateTrackAlias(_) => 0x5,
            // GOAWAY_TIMEOUT
            Self::GoAwayTimeout => 0x10,
            // TOO_MANY_REQUESTS
            Self::TooManyRequests => 0x11,
            // VERSION_NEGOTIATION_FAILED
            Self::Version(..) => 0x15,
            // Delegate per-request codes
            Self::Serve(err) => err.code(),
        }
    }
}

impl From<SessionError> for ServeError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Serve(err) => err,
            _ => ServeError::Internal(format!("session error: {}", err)),
        }
    }
}
