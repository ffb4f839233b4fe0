use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs, Location};
use crate::message::GroupOrder;

/// Sent by the publisher to accept a Subscribe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeOk {
    /// The request ID of the SUBSCRIBE this message is replying to
    pub id: u64,

    /// The identifier used for this track in Subgroups or Datagrams.
    pub track_alias: u64,

    /// The time in milliseconds after which the subscription is no longer
    /// valid. 0 means it never expires.
    pub expires: u64,

    /// Order groups will be delivered in
    pub group_order: GroupOrder,

    /// If content_exists, largest_location is the location of the largest
    /// object available for this track.
    pub content_exists: bool,
    pub largest_location: Option<Location>,

    /// Subscribe parameters
    pub params: KeyValuePairs,
}

impl Decode for SubscribeOk {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let track_alias = u64::decode(r)?;
        let expires = u64::decode(r)?;
        let group_order = GroupOrder::decode(r)?;
        let content_exists = bool::decode(r)?;
        let largest_location = match content_exists {
            true => Some(Location::decode(r)?),
            false => None,
        };
        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            id,
            track_alias,
            expires,
            group_order,
            content_exists,
            largest_location,
            params,
        })
    }
}

impl Encode for SubscribeOk {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.track_alias.encode(w)?;
        self.expires.encode(w)?;
        self.group_order.encode(w)?;
        self.content_exists.encode(w)?;
        if self.content_exists {
            match &self.largest_location {
                Some(largest) => largest.encode(w)?,
                None => return Err(EncodeError::MissingField("LargestLocation")),
            }
        }
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

        let msg = SubscribeOk {
            id: 2,
            track_alias: 0xA11CE,
            expires: 0,
            group_order: GroupOrder::Ascending,
            content_exists: true,
            largest_location: Some(Location::new(0x1000, 0)),
            params: Default::default(),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(SubscribeOk::decode(&mut buf).unwrap(), msg);

        let msg = SubscribeOk {
            content_exists: false,
            largest_location: None,
            ..msg
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(SubscribeOk::decode(&mut buf).unwrap(), msg);
    }

    #[test]
    fn encode_missing_largest() {
        let mut buf = BytesMut::new();

        let msg = SubscribeOk {
            id: 2,
            track_alias: 1,
            expires: 0,
            group_order: GroupOrder::Ascending,
            content_exists: true,
            largest_location: None,
            params: Default::default(),
        };
        assert!(matches!(
            msg.encode(&mut buf).unwrap_err(),
            EncodeError::MissingField(_)
        ));
    }
}
