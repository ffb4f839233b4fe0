use crate::coding::{Decode, DecodeError, Encode, EncodeError, TrackNamespace};

/// Sent by the subscriber to stop receiving announces for a prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnsubscribeAnnounces {
    pub track_namespace_prefix: TrackNamespace,
}

impl Decode for UnsubscribeAnnounces {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let track_namespace_prefix = TrackNamespace::decode(r)?;
        Ok(Self {
            track_namespace_prefix,
        })
    }
}

impl Encode for UnsubscribeAnnounces {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.track_namespace_prefix.encode(w)?;
        Ok(())
    }
}
