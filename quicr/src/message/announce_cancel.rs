use crate::coding::{Decode, DecodeError, Encode, EncodeError, ReasonPhrase, TrackNamespace};

/// Sent by the subscriber/relay to revoke a previously accepted Announce.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnnounceCancel {
    pub track_namespace: TrackNamespace,

    pub error_code: u64,
    pub reason: ReasonPhrase,
}

impl Decode for AnnounceCancel {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let track_namespace = TrackNamespace::decode(r)?;
        let error_code = u64::decode(r)?;
        let reason = ReasonPhrase::decode(r)?;

        Ok(Self {
            track_namespace,
            error_code,
            reason,
        })
    }
}

impl Encode for AnnounceCancel {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.track_namespace.encode(w)?;
        self.error_code.encode(w)?;
        self.reason.encode(w)?;

        Ok(())
    }
}
