use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Sent by the subscriber to abandon a fetch in flight.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchCancel {
    /// The request ID of the FETCH being cancelled
    pub id: u64,
}

impl Decode for FetchCancel {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        Ok(Self { id })
    }
}

impl Encode for FetchCancel {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        Ok(())
    }
}
