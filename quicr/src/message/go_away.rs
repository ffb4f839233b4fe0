use crate::coding::{Decode, DecodeError, Encode, EncodeError, SessionUri};

/// Sent by the server to ask the client to reconnect elsewhere.
///
/// An empty URI means "reconnect to the same endpoint". The receiver enters
/// the Draining state; if it does not close within the drain timeout the
/// connection is terminated with GoAwayTimeout.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GoAway {
    pub new_session_uri: SessionUri,
}

impl Decode for GoAway {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let new_session_uri = SessionUri::decode(r)?;
        Ok(Self { new_session_uri })
    }
}

impl Encode for GoAway {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.new_session_uri.encode(w)?;
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

        let msg = GoAway {
            new_session_uri: SessionUri::from("moqt://relay2.example.com"),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(GoAway::decode(&mut buf).unwrap(), msg);
    }
}
