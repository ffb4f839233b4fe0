use super::{Decode, DecodeError, Encode, EncodeError};

impl Encode for u8 {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        Self::encode_remaining(w, 1)?;
        w.put_u8(*self);
        Ok(())
    }
}

impl Decode for u8 {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        Self::decode_remaining(r, 1)?;
        Ok(r.get_u8())
    }
}

impl Encode for u16 {
    /// Encode a u16 in network byte order; used for the control frame length.
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        Self::encode_remaining(w, 2)?;
        w.put_u16(*self);
        Ok(())
    }
}

impl Decode for u16 {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        Self::decode_remaining(r, 2)?;
        Ok(r.get_u16())
    }
}

impl Encode for bool {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        Self::encode_remaining(w, 1)?;
        w.put_u8(*self as u8);
        Ok(())
    }
}

impl Decode for bool {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        match u8::decode(r)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::InvalidValue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn encode_decode_u16() {
        let mut buf = BytesMut::new();

        0xabcd_u16.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0xab, 0xcd]);
        assert_eq!(u16::decode(&mut buf).unwrap(), 0xabcd);
    }

    #[test]
    fn encode_decode_bool() {
        let mut buf = BytesMut::new();

        false.encode(&mut buf).unwrap();
        true.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x00, 0x01]);
        assert!(!bool::decode(&mut buf).unwrap());
        assert!(bool::decode(&mut buf).unwrap());
    }

    #[test]
    fn decode_invalid_bool() {
        let mut buf = Bytes::from_static(&[0x07]);
        assert!(matches!(
            bool::decode(&mut buf).unwrap_err(),
            DecodeError::InvalidValue
        ));
    }
}
