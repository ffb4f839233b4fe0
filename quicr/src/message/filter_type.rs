use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Subscription filter types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterType {
    LatestGroup = 0x1,
    LatestObject = 0x2,
    AbsoluteStart = 0x3,
    AbsoluteRange = 0x4,
}

impl Encode for FilterType {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        (*self as u64).encode(w)
    }
}

impl Decode for FilterType {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        match u64::decode(r)? {
            0x1 => Ok(Self::LatestGroup),
            0x2 => Ok(Self::LatestObject),
            0x3 => Ok(Self::AbsoluteStart),
            0x4 => Ok(Self::AbsoluteRange),
            _ => Err(DecodeError::InvalidFilterType),
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
            (FilterType::LatestGroup, 0x01u8),
            (FilterType::LatestObject, 0x02),
            (FilterType::AbsoluteStart, 0x03),
            (FilterType::AbsoluteRange, 0x04),
        ] {
            ft.encode(&mut buf).unwrap();
            assert_eq!(buf.to_vec(), vec![byte]);
            assert_eq!(FilterType::decode(&mut buf).unwrap(), ft);
        }
    }

    #[test]
    fn decode_bad_value() {
        let mut buf = Bytes::from_static(&[0x05]);
        assert!(matches!(
            FilterType::decode(&mut buf).unwrap_err(),
            DecodeError::InvalidFilterType
        ));
    }
}
