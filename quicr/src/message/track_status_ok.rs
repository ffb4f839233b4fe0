use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs, Location};
use crate::message::GroupOrder;

/// Sent by the publisher in reply to a TrackStatusRequest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackStatusOk {
    /// The request ID of the TRACK_STATUS_REQUEST this replies to
    pub id: u64,

    pub track_alias: u64,
    pub expires: u64,
    pub group_order: GroupOrder,

    pub content_exists: bool,
    pub largest_location: Option<Location>,

    pub params: KeyValuePairs,
}

impl Decode for TrackStatusOk {
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

impl Encode for TrackStatusOk {
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

        let msg = TrackStatusOk {
            id: 4,
            track_alias: 77,
            expires: 3600,
            group_order: GroupOrder::Ascending,
            content_exists: true,
            largest_location: Some(Location::new(9, 3)),
            params: Default::default(),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(TrackStatusOk::decode(&mut buf).unwrap(), msg);
    }
}
