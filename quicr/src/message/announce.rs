use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs, TrackNamespace};

/// Sent by the publisher to declare a namespace it can serve.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Announce {
    /// The announce request ID
    pub id: u64,

    pub track_namespace: TrackNamespace,

    /// Announce parameters
    pub params: KeyValuePairs,
}

impl Decode for Announce {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let track_namespace = TrackNamespace::decode(r)?;
        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            id,
            track_namespace,
            params,
        })
    }
}

impl Encode for Announce {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.track_namespace.encode(w)?;
        self.params.encode(w)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encode_decode() {
        let mut buf = BytesMut::new();

        let msg = Announce {
            id: 0,
            track_namespace: TrackNamespace::from_utf8_path("conf.example.com/conf/1"),
            params: Default::default(),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(Announce::decode(&mut buf).unwrap(), msg);
    }
}
