use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs, Location};
use crate::message::GroupOrder;

/// Sent by the publisher to accept a Fetch; objects follow on the fetch
/// stream and the stream FIN terminates the dialog.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchOk {
    /// The request ID of the FETCH this message is replying to
    pub id: u64,

    /// The order objects will be delivered in
    pub group_order: GroupOrder,

    /// True if the range runs to the end of the track.
    pub end_of_track: bool,

    /// The largest location that will be delivered.
    pub end_location: Location,

    pub params: KeyValuePairs,
}

impl Decode for FetchOk {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let group_order = GroupOrder::decode(r)?;
        let end_of_track = bool::decode(r)?;
        let end_location = Location::decode(r)?;
        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            id,
            group_order,
            end_of_track,
            end_location,
            params,
        })
    }
}

impl Encode for FetchOk {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.group_order.encode(w)?;
        self.end_of_track.encode(w)?;
        self.end_location.encode(w)?;
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

        let msg = FetchOk {
            id: 4,
            group_order: GroupOrder::Ascending,
            end_of_track: false,
            end_location: Location::new(7, 2),
            params: Default::default(),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(FetchOk::decode(&mut buf).unwrap(), msg);
    }
}
