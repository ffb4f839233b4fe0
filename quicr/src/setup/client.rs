use super::{ParameterType, Versions};
use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs};

/// Sent by the client as the first message on the control stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Client {
    /// The list of supported versions in preference order.
    pub versions: Versions,

    /// Setup parameters, ie: ENDPOINT_ID, MAX_REQUEST_ID, PATH.
    pub params: KeyValuePairs,
}

impl Client {
    pub fn new(versions: Versions, endpoint_id: &str) -> Self {
        let mut params = KeyValuePairs::new();
        params.set_bytesvalue(
            ParameterType::EndpointId.into(),
            endpoint_id.as_bytes().to_vec(),
        );
        Self { versions, params }
    }

    pub fn endpoint_id(&self) -> Option<String> {
        self.params
            .get_bytes(ParameterType::EndpointId.into())
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl Decode for Client {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let versions = Versions::decode(r)?;
        let params = KeyValuePairs::decode(r)?;

        Ok(Self { versions, params })
    }
}

impl Encode for Client {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.versions.encode(w)?;
        self.params.encode(w)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::Version;
    use bytes::BytesMut;

    #[test]
    fn encode_decode() {
        let mut buf = BytesMut::new();

        let client = Client::new([Version::DRAFT_08].into(), "client-1");
        client.encode(&mut buf).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf.to_vec(),
            vec![
                0x01, // 1 version
                0xc0, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x08, // DRAFT_08
                0x0a, // 10 bytes of params
                0x05, 0x08, // key 5 (ENDPOINT_ID), 8 bytes
                0x63, 0x6c, 0x69, 0x65, 0x6e, 0x74, 0x2d, 0x31, // "client-1"
            ]
        );

        let decoded = Client::decode(&mut buf).unwrap();
        assert_eq!(decoded, client);
        assert_eq!(decoded.endpoint_id().as_deref(), Some("client-1"));
    }
}
