use crate::coding::{Decode, DecodeError, Encode, EncodeError, ReasonPhrase};

/// Fetch error codes.
pub mod fetch_error_code {
    pub const INTERNAL: u64 = 0x0;
    pub const UNAUTHORIZED: u64 = 0x1;
    pub const TIMEOUT: u64 = 0x2;
    pub const TRACK_DOES_NOT_EXIST: u64 = 0x4;
    pub const INVALID_RANGE: u64 = 0x5;
    pub const NO_OBJECTS: u64 = 0x6;
    pub const UNKNOWN_REQUEST_ID: u64 = 0x7;
}

/// Sent by the publisher to reject a Fetch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchError {
    /// The request ID of the FETCH this message is replying to
    pub id: u64,

    pub error_code: u64,
    pub reason: ReasonPhrase,
}

impl Decode for FetchError {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let error_code = u64::decode(r)?;
        let reason = ReasonPhrase::decode(r)?;

        Ok(Self {
            id,
            error_code,
            reason,
        })
    }
}

impl Encode for FetchError {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.error_code.encode(w)?;
        self.reason.encode(w)?;

        Ok(())
    }
}
