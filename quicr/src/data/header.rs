use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use crate::data::{FetchHeader, SubgroupHeader};
use std::fmt;

/// Stream header types: which framing follows on a unidirectional stream.
///
/// For the subgroup range 0x10..=0x1d, bit 0 marks extension headers on each
/// object, bit 2 marks an explicit subgroup id field, 0x12/0x13 (and their
/// end-of-group twins) derive the subgroup id from the first object id, and
/// 0x18..=0x1d additionally mark the stream as ending its group.
#[repr(u64)]
#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum StreamHeaderType {
    SubgroupZeroId = 0x10,
    SubgroupZeroIdExt = 0x11,
    SubgroupFirstObjectId = 0x12,
    SubgroupFirstObjectIdExt = 0x13,
    SubgroupId = 0x14,
    SubgroupIdExt = 0x15,
    SubgroupZeroIdEndOfGroup = 0x18,
    SubgroupZeroIdExtEndOfGroup = 0x19,
    SubgroupFirstObjectIdEndOfGroup = 0x1a,
    SubgroupFirstObjectIdExtEndOfGroup = 0x1b,
    SubgroupIdEndOfGroup = 0x1c,
    SubgroupIdExtEndOfGroup = 0x1d,
    Fetch = 0x5,
}

impl StreamHeaderType {
    pub fn is_subgroup(&self) -> bool {
        (0x10..=0x1d).contains(&(*self as u64))
    }

    pub fn is_fetch(&self) -> bool {
        *self == Self::Fetch
    }

    pub fn has_extensions(&self) -> bool {
        self.is_fetch() || (self.is_subgroup() && (*self as u64) & 0x1 != 0)
    }

    pub fn has_subgroup_id(&self) -> bool {
        self.is_subgroup() && (*self as u64) & (1 << 2) != 0
    }

    pub fn subgroup_is_first_object_id(&self) -> bool {
        matches!(
            self,
            Self::SubgroupFirstObjectId
                | Self::SubgroupFirstObjectIdExt
                | Self::SubgroupFirstObjectIdEndOfGroup
                | Self::SubgroupFirstObjectIdExtEndOfGroup
        )
    }

    pub fn is_end_of_group(&self) -> bool {
        (0x18..=0x1d).contains(&(*self as u64))
    }

    /// Pick a subgroup header type for an object's shape.
    pub fn select_subgroup(subgroup_id: Option<u64>, has_extensions: bool) -> Self {
        match (subgroup_id, has_extensions) {
            (Some(0), false) => Self::SubgroupZeroId,
            (Some(0), true) => Self::SubgroupZeroIdExt,
            (Some(_), false) => Self::SubgroupId,
            (Some(_), true) => Self::SubgroupIdExt,
            (None, false) => Self::SubgroupFirstObjectId,
            (None, true) => Self::SubgroupFirstObjectIdExt,
        }
    }
}

impl Encode for StreamHeaderType {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        (*self as u64).encode(w)
    }
}

impl Decode for StreamHeaderType {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        match u64::decode(r)? {
            0x10 => Ok(Self::SubgroupZeroId),
            0x11 => Ok(Self::SubgroupZeroIdExt),
            0x12 => Ok(Self::SubgroupFirstObjectId),
            0x13 => Ok(Self::SubgroupFirstObjectIdExt),
            0x14 => Ok(Self::SubgroupId),
            0x15 => Ok(Self::SubgroupIdExt),
            0x18 => Ok(Self::SubgroupZeroIdEndOfGroup),
            0x19 => Ok(Self::SubgroupZeroIdExtEndOfGroup),
            0x1a => Ok(Self::SubgroupFirstObjectIdEndOfGroup),
            0x1b => Ok(Self::SubgroupFirstObjectIdExtEndOfGroup),
            0x1c => Ok(Self::SubgroupIdEndOfGroup),
            0x1d => Ok(Self::SubgroupIdExtEndOfGroup),
            0x05 => Ok(Self::Fetch),
            _ => Err(DecodeError::InvalidHeaderType),
        }
    }
}

impl fmt::Display for StreamHeaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:#x})", self, *self as u64)
    }
}

/// The first framing on a data stream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StreamHeader {
    Subgroup(SubgroupHeader),
    Fetch(FetchHeader),
}

impl Decode for StreamHeader {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let header_type = StreamHeaderType::decode(r)?;

        if header_type.is_subgroup() {
            Ok(Self::Subgroup(SubgroupHeader::decode_tail(header_type, r)?))
        } else {
            Ok(Self::Fetch(FetchHeader::decode_tail(r)?))
        }
    }
}

impl Encode for StreamHeader {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        // Each header encodes its own type varint.
        match self {
            Self::Subgroup(header) => header.encode(w),
            Self::Fetch(header) => header.encode(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn type_predicates() {
        let ht = StreamHeaderType::SubgroupIdExt;
        assert!(ht.is_subgroup());
        assert!(!ht.is_fetch());
        assert!(ht.has_extensions());
        assert!(ht.has_subgroup_id());
        assert!(!ht.is_end_of_group());

        let ht = StreamHeaderType::SubgroupFirstObjectIdEndOfGroup;
        assert!(ht.is_subgroup());
        assert!(!ht.has_extensions());
        assert!(!ht.has_subgroup_id());
        assert!(ht.subgroup_is_first_object_id());
        assert!(ht.is_end_of_group());

        let ht = StreamHeaderType::Fetch;
        assert!(!ht.is_subgroup());
        assert!(ht.is_fetch());
        assert!(ht.has_extensions());
    }

    #[test]
    fn decode_bad_type() {
        let mut buf = Bytes::from_static(&[0x16]);
        assert!(matches!(
            StreamHeaderType::decode(&mut buf).unwrap_err(),
            DecodeError::InvalidHeaderType
        ));
    }

    #[test]
    fn encode_decode() {
        let mut buf = BytesMut::new();

        let header = StreamHeader::Subgroup(SubgroupHeader {
            header_type: StreamHeaderType::SubgroupId,
            track_alias: 10,
            group_id: 0,
            subgroup_id: Some(1),
            publisher_priority: 100,
        });
        header.encode(&mut buf).unwrap();
        assert_eq!(StreamHeader::decode(&mut buf).unwrap(), header);

        let header = StreamHeader::Fetch(FetchHeader { request_id: 10 });
        header.encode(&mut buf).unwrap();
        assert_eq!(StreamHeader::decode(&mut buf).unwrap(), header);
    }
}
