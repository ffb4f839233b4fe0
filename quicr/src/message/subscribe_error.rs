use crate::coding::{Decode, DecodeError, Encode, EncodeError, ReasonPhrase};

/// Subscribe error codes.
pub mod subscribe_error_code {
    pub const INTERNAL: u64 = 0x0;
    pub const UNAUTHORIZED: u64 = 0x1;
    /// The subscriber must retry with the alias carried in the message.
    pub const RETRY_TRACK_ALIAS: u64 = 0x2;
    pub const TIMEOUT: u64 = 0x3;
    pub const TRACK_DOES_NOT_EXIST: u64 = 0x4;
}

/// Sent by the publisher to reject a Subscribe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeError {
    /// The request ID of the SUBSCRIBE this message is replying to
    pub id: u64,

    pub error_code: u64,
    pub reason: ReasonPhrase,

    /// The alias the publisher requires; meaningful with RETRY_TRACK_ALIAS.
    pub track_alias: u64,
}

impl Decode for SubscribeError {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let id = u64::decode(r)?;
        let error_code = u64::decode(r)?;
        let reason = ReasonPhrase::decode(r)?;
        let track_alias = u64::decode(r)?;

        Ok(Self {
            id,
            error_code,
            reason,
            track_alias,
        })
    }
}

impl Encode for SubscribeError {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.id.encode(w)?;
        self.error_code.encode(w)?;
        self.reason.encode(w)?;
        self.track_alias.encode(w)?;

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

        let msg = SubscribeError {
            id: 2,
            error_code: subscribe_error_code::RETRY_TRACK_ALIAS,
            reason: ReasonPhrase::from("use the hashed alias"),
            track_alias: 0xA11CE,
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(SubscribeError::decode(&mut buf).unwrap(), msg);
    }
}
