use super::{Decode, DecodeError, Encode, EncodeError};

/// A position within a track: group then object.
///
/// The derived ordering is lexicographic, which matches the wire semantics:
/// a location is "later" if its group is larger, or the group ties and the
/// object is larger.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Location {
    pub group_id: u64,
    pub object_id: u64,
}

impl Location {
    pub fn new(group_id: u64, object_id: u64) -> Self {
        Self {
            group_id,
            object_id,
        }
    }
}

impl Decode for Location {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let group_id = u64::decode(r)?;
        let object_id = u64::decode(r)?;
        Ok(Self::new(group_id, object_id))
    }
}

impl Encode for Location {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.group_id.encode(w)?;
        self.object_id.encode(w)?;
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

        let loc = Location::new(0x1000, 5);
        loc.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x50, 0x00, 0x05]);
        assert_eq!(Location::decode(&mut buf).unwrap(), loc);
    }

    #[test]
    fn ordering() {
        assert!(Location::new(1, 9) < Location::new(2, 0));
        assert!(Location::new(2, 0) < Location::new(2, 1));
        assert!(Location::new(3, 3) == Location::new(3, 3));
    }
}
