use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Sent by the subscriber to ask the publisher to start a fresh group,
/// giving the subscriber a clean stream boundary to join at.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewGroupRequest {
    /// The request ID of the live SUBSCRIBE
    pub id: u64,

    pub track_alias: u64,
}

impl Decode for NewGroupRequest {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let track_alias = u64::decode(r)?;
        Ok(Self { id, track_alias })
    }
}

impl Encode for NewGroupRequest {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.track_alias.encode(w)?;
        Ok(())
    }
}
