use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Group delivery order preference.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum GroupOrder {
    /// Defer to the publisher's send order.
    #[default]
    Publisher = 0x0,
    Ascending = 0x1,
    Descending = 0x2,
}

impl Encode for GroupOrder {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        (*self as u8).encode(w)
    }
}

impl Decode for GroupOrder {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        match u8::decode(r)? {
            0x0 => Ok(Self::Publisher),
            0x1 => Ok(Self::Ascending),
            0x2 => Ok(Self::Descending),
            _ => Err(DecodeError::InvalidGroupOrder),
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

        for (go, byte) in [
            (GroupOrder::Publisher, 0x00u8),
            (GroupOrder::Ascending, 0x01),
            (GroupOrder::Descending, 0x02),
        ] {
            go.encode(&mut buf).unwrap();
            assert_eq!(buf.to_vec(), vec![byte]);
            assert_eq!(GroupOrder::decode(&mut buf).unwrap(), go);
        }
    }

    #[test]
    fn decode_bad_value() {
        let mut buf = Bytes::from_static(&[0x03]);
        assert!(matches!(
            GroupOrder::decode(&mut buf).unwrap_err(),
            DecodeError::InvalidGroupOrder
        ));
    }
}
