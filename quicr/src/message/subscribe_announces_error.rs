use crate::coding::{Decode, DecodeError, Encode, EncodeError, ReasonPhrase};

/// Sent by the publisher/relay to reject a SubscribeAnnounces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeAnnouncesError {
    /// The request ID of the SUBSCRIBE_ANNOUNCES this replies to
    pub id: u64,

    pub error_code: u64,
    pub reason: ReasonPhrase,
}

impl Decode for SubscribeAnnouncesError {
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

impl Encode for SubscribeAnnouncesError {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.error_code.encode(w)?;
        self.reason.encode(w)?;

        Ok(())
    }
}
