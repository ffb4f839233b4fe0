use super::BoundsExceeded;

/// A type that can be decoded from a byte buffer.
pub trait Decode: Sized {
    fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;

    /// Helper: return Err(DecodeError::More) if the buffer does not contain
    /// the required number of bytes.
    fn decode_remaining<B: bytes::Buf>(buf: &B, required: usize) -> Result<(), DecodeError> {
        let needed = required.saturating_sub(buf.remaining());
        if needed > 0 {
            Err(DecodeError::More(needed))
        } else {
            Ok(())
        }
    }
}

/// A decode error.
#[derive(thiserror::Error, Debug, Clone)]
pub enum DecodeError {
    #[error("fill the buffer: {0} more bytes needed")]
    More(usize),

    #[error("invalid payload value")]
    InvalidValue,

    #[error("invalid message type: {0}")]
    InvalidMessage(u64),

    #[error("invalid filter type")]
    InvalidFilterType,

    #[error("invalid group order")]
    InvalidGroupOrder,

    #[error("invalid fetch type")]
    InvalidFetchType,

    #[error("invalid object status")]
    InvalidObjectStatus,

    #[error("invalid stream header type")]
    InvalidHeaderType,

    #[error("invalid datagram type")]
    InvalidDatagramType,

    #[error("duplicate parameter: {0}")]
    DuplicateParameter(u64),

    #[error("parameter value length exceeded")]
    KeyValuePairLengthExceeded,

    #[error("missing parameter")]
    MissingParameter,

    #[error("invalid parameter")]
    InvalidParameter,

    #[error("field too large: {0}")]
    FieldBoundsExceeded(String),

    #[error("message length mismatch: declared {declared} consumed {consumed}")]
    LengthMismatch { declared: usize, consumed: usize },

    #[error("varint bounds exceeded")]
    BoundsExceeded(#[from] BoundsExceeded),

    #[error("invalid string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
