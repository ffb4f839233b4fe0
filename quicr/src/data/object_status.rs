use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// Object status, sent in place of a payload.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ObjectStatus {
    #[default]
    Available = 0x0,
    DoesNotExist = 0x1,
    EndOfGroup = 0x3,
    EndOfTrack = 0x4,
}

impl Decode for ObjectStatus {
    fn decode<B: bytes::Buf>(r: &mut B) -> Result<Self, DecodeError> {
        match u64::decode(r)? {
            0x0 => Ok(Self::Available),
            0x1 => Ok(Self::DoesNotExist),
            0x3 => Ok(Self::EndOfGroup),
            0x4 => Ok(Self::EndOfTrack),
            _ => Err(DecodeError::InvalidObjectStatus),
        }
    }
}

impl Encode for ObjectStatus {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        (*self as u64).encode(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decode_bad_value() {
        let mut buf = Bytes::from_static(&[0x02]);
        assert!(matches!(
            ObjectStatus::decode(&mut buf).unwrap_err(),
            DecodeError::InvalidObjectStatus
        ));
    }
}
