use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs, Location};

/// Sent by the subscriber to narrow or re-prioritize a live subscription.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeUpdate {
    /// The request ID of the SUBSCRIBE being updated
    pub id: u64,

    /// New start of the requested range.
    pub start_location: Location,

    /// New final group; 0 means open ended.
    pub end_group: u64,

    /// Subscriber priority, where **smaller** values are sent first.
    pub subscriber_priority: u8,

    /// False pauses object delivery without tearing the subscription down.
    pub forward: bool,

    /// Subscribe parameters
    pub params: KeyValuePairs,
}

impl Decode for SubscribeUpdate {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let start_location = Location::decode(r)?;
        let end_group = u64::decode(r)?;
        let subscriber_priority = u8::decode(r)?;
        let forward = bool::decode(r)?;
        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            id,
            start_location,
            end_group,
            subscriber_priority,
            forward,
            params,
        })
    }
}

impl Encode for SubscribeUpdate {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.start_location.encode(w)?;
        self.end_group.encode(w)?;
        self.subscriber_priority.encode(w)?;
        self.forward.encode(w)?;
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

        let msg = SubscribeUpdate {
            id: 2,
            start_location: Location::new(100, 0),
            end_group: 0,
            subscriber_priority: 32,
            forward: true,
            params: Default::default(),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(SubscribeUpdate::decode(&mut buf).unwrap(), msg);
    }
}
