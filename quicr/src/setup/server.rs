use super::{ParameterType, Version};
use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs};

/// Sent by the server in reply to [super::Client], selecting one version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Server {
    /// The version picked from the client's offer.
    pub selected_version: Version,

    /// Setup parameters, ie: ENDPOINT_ID, MAX_REQUEST_ID.
    pub params: KeyValuePairs,
}

impl Server {
    pub fn new(selected_version: Version, endpoint_id: &str) -> Self {
        let mut params = KeyValuePairs::new();
        params.set_bytesvalue(
            ParameterType::EndpointId.into(),
            endpoint_id.as_bytes().to_vec(),
        );
        Self {
            selected_version,
            params,
        }
    }

    pub fn endpoint_id(&self) -> Option<String> {
        self.params
            .get_bytes(ParameterType::EndpointId.into())
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl Decode for Server {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let selected_version = Version::decode(r)?;
        let params = KeyValuePairs::decode(r)?;

        Ok(Self {
            selected_version,
            params,
        })
    }
}

impl Encode for Server {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.selected_version.encode(w)?;
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

        let server = Server::new(Version::DRAFT_08, "relay-1");
        server.encode(&mut buf).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf.to_vec(),
            vec![
                0xc0, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x08, // DRAFT_08
                0x09, // 9 bytes of params
                0x05, 0x07, // key 5 (ENDPOINT_ID), 7 bytes
                0x72, 0x65, 0x6c, 0x61, 0x79, 0x2d, 0x31, // "relay-1"
            ]
        );

        let decoded = Server::decode(&mut buf).unwrap();
        assert_eq!(decoded, server);
        assert_eq!(decoded.endpoint_id().as_deref(), Some("relay-1"));
    }
}
