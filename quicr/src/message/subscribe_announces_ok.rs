use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Sent by the publisher/relay to accept a SubscribeAnnounces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeAnnouncesOk {
    /// The request ID of the SUBSCRIBE_ANNOUNCES this replies to
    pub id: u64,
}

impl Decode for SubscribeAnnouncesOk {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        Ok(Self { id })
    }
}

impl Encode for SubscribeAnnouncesOk {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        Ok(())
    }
}
