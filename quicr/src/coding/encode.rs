use super::BoundsExceeded;

/// A type that can be encoded into a byte buffer.
pub trait Encode: Sized {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError>;

    /// Helper: return Err(EncodeError::More) if the buffer cannot fit the
    /// required number of bytes.
    fn encode_remaining<W: bytes::BufMut>(buf: &W, required: usize) -> Result<(), EncodeError> {
        let needed = required.saturating_sub(buf.remaining_mut());
        if needed > 0 {
            Err(EncodeError::More(needed))
        } else {
            Ok(())
        }
    }
}

/// An encode error.
#[derive(thiserror::Error, Debug, Clone)]
pub enum EncodeError {
    #[error("short buffer: {0} more bytes needed")]
    More(usize),

    #[error("invalid value")]
    InvalidValue,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field too large: {0}")]
    FieldBoundsExceeded(String),

    #[error("message exceeds the maximum control message length")]
    MsgBoundsExceeded,

    #[error("varint bounds exceeded")]
    BoundsExceeded(#[from] BoundsExceeded),
}
