use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Fetch flavors: a standalone range, or a fetch joined to a live
/// subscription (relative to it, or absolute from a given group).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchType {
    Standalone = 0x1,
    RelativeJoining = 0x2,
    AbsoluteJoining = 0x3,
}

impl Encode for FetchType {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        (*self as u64).encode(w)
    }
}

impl Decode for FetchType {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        match u64::decode(r)? {
            0x1 => Ok(Self::Standalone),
            0x2 => Ok(Self::RelativeJoining),
            0x3 => Ok(Self::AbsoluteJoining),
            _ => Err(DecodeError::InvalidFetchType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn encode_decode() {
        let mut buf = BytesMut::new();

        for (ft, byte) in [
            (FetchType::Standalone, 0x01u8),
            (FetchType::RelativeJoining, 0x02),
            (FetchType::AbsoluteJoining, 0x03),
        ] {
            ft.encode(&mut buf).unwrap();
            assert_eq!(buf.to_vec(), vec![byte]);
            assert_eq!(FetchType::decode(&mut buf).unwrap(), ft);
        }
    }

    #[test]
    fn decode_bad_value() {
        let mut buf = Bytes::from_static(&[0x04]);
        assert!(matches!(
            FetchType::decode(&mut buf).unwrap_err(),
            DecodeError::InvalidFetchType
        ));
    }
}
