use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs, TrackNamespace};

/// Sent by the subscriber to query the status of a track without
/// subscribing to it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackStatusRequest {
    /// The status request ID
    pub id: u64,

    pub track_namespace: TrackNamespace,
    pub track_name: Vec<u8>,

    pub params: KeyValuePairs,
}

impl Decode for TrackStatusRequest {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let track_namespace = TrackNamespace::decode(r)?;
        let track_name = Vec::<u8>::decode(r)?;
        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            id,
            track_namespace,
            track_name,
            params,
        })
    }
}

impl Encode for TrackStatusRequest {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.track_namespace.encode(w)?;
        self.track_name.encode(w)?;
        self.params.encode(w)?;

        Ok(())
    }
}
