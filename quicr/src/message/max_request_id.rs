use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Raises the number of requests the peer may start.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MaxRequestId {
    /// Request IDs strictly below this value are usable.
    pub id: u64,
}

impl Decode for MaxRequestId {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        Ok(Self { id })
    }
}

impl Encode for MaxRequestId {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        Ok(())
    }
}
