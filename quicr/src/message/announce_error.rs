use crate::coding::{Decode, DecodeError, Encode, EncodeError, ReasonPhrase};

/// Announce error codes.
pub mod announce_error_code {
    pub const INTERNAL: u64 = 0x0;
    pub const UNAUTHORIZED: u64 = 0x1;
    pub const TIMEOUT: u64 = 0x2;
    pub const UNINTERESTED: u64 = 0x4;
}

/// Sent by the subscriber/relay to reject an Announce.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnnounceError {
    /// The request ID of the ANNOUNCE this message is replying to
    pub id: u64,

    pub error_code: u64,
    pub reason: ReasonPhrase,
}

impl Decode for AnnounceError {
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

impl Encode for AnnounceError {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.error_code.encode(w)?;
        self.reason.encode(w)?;

        Ok(())
    }
}
