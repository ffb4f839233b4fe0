use super::{Decode, DecodeError, Encode, EncodeError};

impl Encode for String {
    /// Encode with a varint length prefix.
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.len().encode(w)?;
        Self::encode_remaining(w, self.len())?;
        w.put(self.as_ref());
        Ok(())
    }
}

impl Decode for String {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let size = usize::decode(r)?;
        Self::decode_remaining(r, size)?;

        let mut buf = vec![0; size];
        r.copy_to_slice(&mut buf);

        Ok(String::from_utf8(buf)?)
    }
}

impl Encode for Vec<u8> {
    /// A length-prefixed byte string.
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.len().encode(w)?;
        Self::encode_remaining(w, self.len())?;
        w.put_slice(self);
        Ok(())
    }
}

impl Decode for Vec<u8> {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let size = usize::decode(r)?;
        Self::decode_remaining(r, size)?;

        let mut buf = vec![0; size];
        r.copy_to_slice(&mut buf);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encode_decode_string() {
        let mut buf = BytesMut::new();

        let s = "track".to_string();
        s.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x05, 0x74, 0x72, 0x61, 0x63, 0x6b]);
        assert_eq!(String::decode(&mut buf).unwrap(), s);
    }

    #[test]
    fn encode_decode_bytes() {
        let mut buf = BytesMut::new();

        let b = vec![0xde, 0xad, 0xbe, 0xef];
        b.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x04, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(Vec::<u8>::decode(&mut buf).unwrap(), b);
    }

    #[test]
    fn decode_truncated() {
        let mut buf = BytesMut::new();
        "longer than the buffer".to_string().encode(&mut buf).unwrap();
        buf.truncate(4);

        let mut buf = buf.freeze();
        assert!(matches!(
            String::decode(&mut buf).unwrap_err(),
            DecodeError::More(_)
        ));
    }
}
