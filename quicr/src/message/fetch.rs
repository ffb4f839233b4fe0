use crate::coding::{
    Decode, DecodeError, Encode, EncodeError, KeyValuePairs, Location, TrackNamespace,
};
use crate::message::{FetchType, GroupOrder};

/// Track range for a standalone fetch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StandaloneFetch {
    pub track_namespace: TrackNamespace,
    pub track_name: Vec<u8>,
    pub start_location: Location,
    pub end_location: Location,
}

impl Decode for StandaloneFetch {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let track_namespace = TrackNamespace::decode(r)?;
        let track_name = Vec::<u8>::decode(r)?;
        let start_location = Location::decode(r)?;
        let end_location = Location::decode(r)?;

        Ok(Self {
            track_namespace,
            track_name,
            start_location,
            end_location,
        })
    }
}

impl Encode for StandaloneFetch {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.track_namespace.encode(w)?;
        self.track_name.encode(w)?;
        self.start_location.encode(w)?;
        self.end_location.encode(w)?;

        Ok(())
    }
}

/// Range resolved against a live subscription.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JoiningFetch {
    /// The request ID of the subscription to be joined.
    pub joining_request_id: u64,

    /// Relative: how many groups before the subscription's current group.
    /// Absolute: the group to start from.
    pub joining_start: u64,
}

impl Decode for JoiningFetch {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let joining_request_id = u64::decode(r)?;
        let joining_start = u64::decode(r)?;

        Ok(Self {
            joining_request_id,
            joining_start,
        })
    }
}

impl Encode for JoiningFetch {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.joining_request_id.encode(w)?;
        self.joining_start.encode(w)?;

        Ok(())
    }
}

/// Sent by the subscriber to request a range of already published objects.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Fetch {
    /// The fetch request ID
    pub id: u64,

    /// Subscriber priority
    pub subscriber_priority: u8,

    /// Object delivery order
    pub group_order: GroupOrder,

    pub fetch_type: FetchType,

    /// Track properties; present for a Standalone fetch.
    pub standalone: Option<StandaloneFetch>,

    /// Joining properties; present for Relative/Absolute joining fetches.
    pub joining: Option<JoiningFetch>,

    pub params: KeyValuePairs,
}

impl Decode for Fetch {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let subscriber_priority = u8::decode(r)?;
        let group_order = GroupOrder::decode(r)?;
        let fetch_type = FetchType::decode(r)?;

        let (standalone, joining) = match fetch_type {
            FetchType::Standalone => (Some(StandaloneFetch::decode(r)?), None),
            FetchType::RelativeJoining | FetchType::AbsoluteJoining => {
                (None, Some(JoiningFetch::decode(r)?))
            }
        };

        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            id,
            subscriber_priority,
            group_order,
            fetch_type,
            standalone,
            joining,
            params,
        })
    }
}

impl Encode for Fetch {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.subscriber_priority.encode(w)?;
        self.group_order.encode(w)?;
        self.fetch_type.encode(w)?;

        match self.fetch_type {
            FetchType::Standalone => match &self.standalone {
                Some(standalone) => standalone.encode(w)?,
                None => return Err(EncodeError::MissingField("StandaloneFetch")),
            },
            FetchType::RelativeJoining | FetchType::AbsoluteJoining => match &self.joining {
                Some(joining) => joining.encode(w)?,
                None => return Err(EncodeError::MissingField("JoiningFetch")),
            },
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

        let msg = Fetch {
            id: 4,
            subscriber_priority: 127,
            group_order: GroupOrder::Ascending,
            fetch_type: FetchType::Standalone,
            standalone: Some(StandaloneFetch {
                track_namespace: TrackNamespace::from_utf8_path("conf/1"),
                track_name: b"alice/video".to_vec(),
                start_location: Location::new(6, 1),
                end_location: Location::new(7, 2),
            }),
            joining: None,
            params: Default::default(),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(Fetch::decode(&mut buf).unwrap(), msg);

        let msg = Fetch {
            fetch_type: FetchType::RelativeJoining,
            standalone: None,
            joining: Some(JoiningFetch {
                joining_request_id: 2,
                joining_start: 1,
            }),
            ..msg
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(Fetch::decode(&mut buf).unwrap(), msg);
    }

    #[test]
    fn encode_missing_range() {
        let mut buf = BytesMut::new();

        let msg = Fetch {
            id: 4,
            subscriber_priority: 127,
            group_order: GroupOrder::Ascending,
            fetch_type: FetchType::AbsoluteJoining,
            standalone: None,
            joining: None,
            params: Default::default(),
        };
        assert!(matches!(
            msg.encode(&mut buf).unwrap_err(),
            EncodeError::MissingField(_)
        ));
    }
}
