use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs, TrackNamespace};

/// Sent by the subscriber to be told about announces matching a namespace
/// prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeAnnounces {
    /// The request ID
    pub id: u64,

    pub track_namespace_prefix: TrackNamespace,

    pub params: KeyValuePairs,
}

impl Decode for SubscribeAnnounces {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let track_namespace_prefix = TrackNamespace::decode(r)?;
        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            id,
            track_namespace_prefix,
            params,
        })
    }
}

impl Encode for SubscribeAnnounces {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.track_namespace_prefix.encode(w)?;
        self.params.encode(w)?;

        Ok(())
    }
}
