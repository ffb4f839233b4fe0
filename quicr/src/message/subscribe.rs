use crate::coding::{
    Decode, DecodeError, Encode, EncodeError, KeyValuePairs, Location, TrackNamespace,
};
use crate::message::{FilterType, GroupOrder};

/// Sent by the subscriber to start receiving a track.
///
/// The track alias is a proposal; the publisher may reject it with
/// `SubscribeError(RetryTrackAlias)` carrying the alias it requires.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Subscribe {
    /// The subscription request ID
    pub id: u64,

    /// The identifier to use for this track in Subgroups or Datagrams.
    pub track_alias: u64,

    pub track_namespace: TrackNamespace,
    pub track_name: Vec<u8>,

    /// Subscriber priority, where **smaller** values are sent first.
    pub subscriber_priority: u8,

    /// Order groups will be delivered in
    pub group_order: GroupOrder,

    /// Which objects the subscription starts (and possibly ends) at.
    pub filter_type: FilterType,

    /// Start location; present for AbsoluteStart and AbsoluteRange filters.
    pub start_location: Option<Location>,

    /// Final group; present for the AbsoluteRange filter.
    pub end_group: Option<u64>,

    /// Subscribe parameters, ie: DELIVERY_TIMEOUT.
    pub params: KeyValuePairs,
}

impl Decode for Subscribe {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let track_alias = u64::decode(r)?;
        let track_namespace = TrackNamespace::decode(r)?;
        let track_name = Vec::<u8>::decode(r)?;
        let subscriber_priority = u8::decode(r)?;
        let group_order = GroupOrder::decode(r)?;
        let filter_type = FilterType::decode(r)?;

        let start_location = match filter_type {
            FilterType::AbsoluteStart | FilterType::AbsoluteRange => Some(Location::decode(r)?),
            _ => None,
        };
        let end_group = match filter_type {
            FilterType::AbsoluteRange => Some(u64::decode(r)?),
            _ => None,
        };

        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            id,
            track_alias,
            track_namespace,
            track_name,
            subscriber_priority,
            group_order,
            filter_type,
            start_location,
            end_group,
            params,
        })
    }
}

impl Encode for Subscribe {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.track_alias.encode(w)?;
        self.track_namespace.encode(w)?;
        self.track_name.encode(w)?;
        self.subscriber_priority.encode(w)?;
        self.group_order.encode(w)?;
        self.filter_type.encode(w)?;

        match self.filter_type {
            FilterType::AbsoluteStart | FilterType::AbsoluteRange => {
                match &self.start_location {
                    Some(start) => start.encode(w)?,
                    None => return Err(EncodeError::MissingField("StartLocation")),
                }
            }
            _ => (),
        }
        if self.filter_type == FilterType::AbsoluteRange {
            match self.end_group {
                Some(end_group) => end_group.encode(w)?,
                None => return Err(EncodeError::MissingField("EndGroup")),
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

        let msg = Subscribe {
            id: 2,
            track_alias: 0xA11CE,
            track_namespace: TrackNamespace::from_utf8_path("conf.example.com/conf/1"),
            track_name: b"alice/video".to_vec(),
            subscriber_priority: 127,
            group_order: GroupOrder::Publisher,
            filter_type: FilterType::LatestGroup,
            start_location: None,
            end_group: None,
            params: Default::default(),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(Subscribe::decode(&mut buf).unwrap(), msg);

        let msg = Subscribe {
            filter_type: FilterType::AbsoluteRange,
            start_location: Some(Location::new(6, 1)),
            end_group: Some(7),
            ..msg
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(Subscribe::decode(&mut buf).unwrap(), msg);
    }

    #[test]
    fn encode_missing_fields() {
        let mut buf = BytesMut::new();

        let msg = Subscribe {
            id: 2,
            track_alias: 1,
            track_namespace: TrackNamespace::from_utf8_path("conf"),
            track_name: b"video".to_vec(),
            subscriber_priority: 127,
            group_order: GroupOrder::Ascending,
            filter_type: FilterType::AbsoluteStart,
            start_location: None,
            end_group: None,
            params: Default::default(),
        };
        assert!(matches!(
            msg.encode(&mut buf).unwrap_err(),
            EncodeError::MissingField(_)
        ));
    }
}
