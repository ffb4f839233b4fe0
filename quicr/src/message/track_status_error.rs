use crate::coding::{Decode, DecodeError, Encode, EncodeError, ReasonPhrase};

/// Sent by the publisher when a TrackStatusRequest cannot be served.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackStatusError {
    /// The request ID of the TRACK_STATUS_REQUEST this replies to
    pub id: u64,

    pub error_code: u64,
    pub reason: ReasonPhrase,
}

impl Decode for TrackStatusError {
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

impl Encode for TrackStatusError {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.error_code.encode(w)?;
        self.reason.encode(w)?;

        Ok(())
    }
}
