use std::fmt;

use super::{Decode, DecodeError, Encode, EncodeError};

/// A value exceeded the 62-bit range of a QUIC variable-length integer.
#[derive(thiserror::Error, Debug, Clone, Copy)]
#[error("value out of varint range")]
pub struct BoundsExceeded;

/// Size in bytes of a variable-length integer, determined by the two most
/// significant bits of its first byte (RFC 9000 section 16).
pub fn varint_size(first_byte: u8) -> usize {
    match first_byte >> 6 {
        0b00 => 1,
        0b01 => 2,
        0b10 => 4,
        _ => 8,
    }
}

/// A QUIC variable-length integer, carrying up to 62 value bits.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarInt(u64);

impl VarInt {
    pub const MAX: Self = Self((1 << 62) - 1);
    pub const ZERO: Self = Self(0);

    /// Largest value encodable in 1/2/4 bytes respectively.
    const MAX_1: u64 = (1 << 6) - 1;
    const MAX_2: u64 = (1 << 14) - 1;
    const MAX_4: u64 = (1 << 30) - 1;

    /// Construct from a u32; always in range.
    pub const fn from_u32(v: u32) -> Self {
        Self(v as u64)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for VarInt {
    type Error = BoundsExceeded;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        if v > Self::MAX.0 {
            return Err(BoundsExceeded);
        }
        Ok(Self(v))
    }
}

impl TryFrom<usize> for VarInt {
    type Error = BoundsExceeded;

    fn try_from(v: usize) -> Result<Self, Self::Error> {
        Self::try_from(v as u64)
    }
}

impl From<VarInt> for u64 {
    fn from(v: VarInt) -> Self {
        v.0
    }
}

impl TryFrom<VarInt> for u32 {
    type Error = BoundsExceeded;

    fn try_from(v: VarInt) -> Result<Self, Self::Error> {
        u32::try_from(v.0).map_err(|_| BoundsExceeded)
    }
}

impl TryFrom<VarInt> for usize {
    type Error = BoundsExceeded;

    fn try_from(v: VarInt) -> Result<Self, Self::Error> {
        usize::try_from(v.0).map_err(|_| BoundsExceeded)
    }
}

impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Decode for VarInt {
    fn decode<B: bytes::Buf>(r: &mut B) -> Result<Self, DecodeError> {
        Self::decode_remaining(r, 1)?;

        let first = r.get_u8();
        let size = varint_size(first);
        Self::decode_remaining(r, size - 1)?;

        let mut v = u64::from(first & 0b0011_1111);
        for _ in 1..size {
            v = (v << 8) | u64::from(r.get_u8());
        }

        Ok(Self(v))
    }
}

impl Encode for VarInt {
    /// Encode in the canonical (shortest) form.
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        let v = self.0;
        if v <= Self::MAX_1 {
            Self::encode_remaining(w, 1)?;
            w.put_u8(v as u8);
        } else if v <= Self::MAX_2 {
            Self::encode_remaining(w, 2)?;
            w.put_u16(0b01u16 << 14 | v as u16);
        } else if v <= Self::MAX_4 {
            Self::encode_remaining(w, 4)?;
            w.put_u32(0b10u32 << 30 | v as u32);
        } else if v <= Self::MAX.0 {
            Self::encode_remaining(w, 8)?;
            w.put_u64(0b11u64 << 62 | v);
        } else {
            return Err(BoundsExceeded.into());
        }

        Ok(())
    }
}

impl Decode for u64 {
    fn decode<B: bytes::Buf>(r: &mut B) -> Result<Self, DecodeError> {
        Ok(VarInt::decode(r)?.into())
    }
}

impl Encode for u64 {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        VarInt::try_from(*self)?.encode(w)
    }
}

impl Decode for usize {
    fn decode<B: bytes::Buf>(r: &mut B) -> Result<Self, DecodeError> {
        Ok(usize::try_from(VarInt::decode(r)?)?)
    }
}

impl Encode for usize {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        VarInt::try_from(*self)?.encode(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn size_from_first_byte() {
        assert_eq!(varint_size(0x00), 1);
        assert_eq!(varint_size(0x3f), 1);
        assert_eq!(varint_size(0x40), 2);
        assert_eq!(varint_size(0x7f), 2);
        assert_eq!(varint_size(0x80), 4);
        assert_eq!(varint_size(0xbf), 4);
        assert_eq!(varint_size(0xc0), 8);
        assert_eq!(varint_size(0xff), 8);
    }

    #[test]
    fn encode_boundaries() {
        // Canonical sizes at every boundary of the 1/2/4/8 byte encodings.
        for (value, size) in [
            (0u64, 1usize),
            (63, 1),
            (64, 2),
            (16383, 2),
            (16384, 4),
            ((1 << 30) - 1, 4),
            (1 << 30, 8),
            ((1 << 62) - 1, 8),
        ] {
            let mut buf = BytesMut::new();
            value.encode(&mut buf).unwrap();
            assert_eq!(buf.len(), size, "value {}", value);
            let decoded = u64::decode(&mut buf).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn encode_decode() {
        let mut buf = BytesMut::new();

        // RFC 9000 A.1 example values.
        151288809941952652u64.encode(&mut buf).unwrap();
        assert_eq!(
            buf.to_vec(),
            vec![0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]
        );
        assert_eq!(u64::decode(&mut buf).unwrap(), 151288809941952652);

        494878333u64.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x9d, 0x7f, 0x3e, 0x7d]);
        assert_eq!(u64::decode(&mut buf).unwrap(), 494878333);

        15293u64.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x7b, 0xbd]);
        assert_eq!(u64::decode(&mut buf).unwrap(), 15293);

        37u64.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x25]);
        assert_eq!(u64::decode(&mut buf).unwrap(), 37);
    }

    #[test]
    fn encode_out_of_range() {
        let mut buf = BytesMut::new();
        let encoded = (1u64 << 62).encode(&mut buf);
        assert!(matches!(encoded.unwrap_err(), EncodeError::BoundsExceeded(_)));
    }

    #[test]
    fn decode_truncated() {
        // An 8 byte encoding with only 3 bytes available.
        let data: Vec<u8> = vec![0xc2, 0x19, 0x7c];
        let mut buf: Bytes = data.into();
        let decoded = u64::decode(&mut buf);
        assert!(matches!(decoded.unwrap_err(), DecodeError::More(5)));
    }

    #[test]
    fn decode_non_canonical() {
        // 37 in a 2 byte encoding; longer-than-needed forms are accepted.
        let data: Vec<u8> = vec![0x40, 0x25];
        let mut buf: Bytes = data.into();
        assert_eq!(u64::decode(&mut buf).unwrap(), 37);
    }
}
