use crate::coding::{Decode, DecodeError, Encode, EncodeError, ReasonPhrase};

/// Subscribe done status codes.
pub mod subscribe_done_code {
    pub const INTERNAL: u64 = 0x0;
    pub const UNAUTHORIZED: u64 = 0x1;
    pub const TRACK_ENDED: u64 = 0x2;
    pub const SUBSCRIPTION_ENDED: u64 = 0x3;
    pub const GOING_AWAY: u64 = 0x4;
    pub const EXPIRED: u64 = 0x5;
}

/// Sent by the publisher when a subscription ends.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeDone {
    /// The request ID of the SUBSCRIBE that ended
    pub id: u64,

    pub status_code: u64,

    /// How many data streams were opened for this subscription.
    pub stream_count: u64,

    pub reason: ReasonPhrase,
}

impl Decode for SubscribeDone {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let status_code = u64::decode(r)?;
        let stream_count = u64::decode(r)?;
        let reason = ReasonPhrase::decode(r)?;

        Ok(Self {
            id,
            status_code,
            stream_count,
            reason,
        })
    }
}

impl Encode for SubscribeDone {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.status_code.encode(w)?;
        self.stream_count.encode(w)?;
        self.reason.encode(w)?;

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

        let msg = SubscribeDone {
            id: 2,
            status_code: subscribe_done_code::TRACK_ENDED,
            stream_count: 17,
            reason: ReasonPhrase::from("end of track"),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(SubscribeDone::decode(&mut buf).unwrap(), msg);
    }
}
