use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs};
use crate::data::{ObjectStatus, StreamHeaderType};

/// Header at the start of a subgroup stream. All objects on the stream share
/// `(group_id, subgroup_id)`; the stream's priority is the priority of its
/// objects.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubgroupHeader {
    pub header_type: StreamHeaderType,

    /// The track alias.
    pub track_alias: u64,

    pub group_id: u64,

    /// Explicit subgroup id; None when the type derives it (zero, or the
    /// first object id on the stream).
    pub subgroup_id: Option<u64>,

    /// Publisher priority, where **smaller** values are sent first.
    pub publisher_priority: u8,
}

impl SubgroupHeader {
    /// Decode the fields after the type varint has been consumed.
    pub fn decode_tail<R: bytes::Buf>(
        header_type: StreamHeaderType,
        r: &mut R,
    ) -> Result<Self, DecodeError> {
        if !header_type.is_subgroup() {
            return Err(DecodeError::InvalidHeaderType);
        }

        let track_alias = u64::decode(r)?;
        let group_id = u64::decode(r)?;
        let subgroup_id = match header_type.has_subgroup_id() {
            true => Some(u64::decode(r)?),
            false => None,
        };
        let publisher_priority = u8::decode(r)?;

        Ok(Self {
            header_type,
            track_alias,
            group_id,
            subgroup_id,
            publisher_priority,
        })
    }
}

impl Decode for SubgroupHeader {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let header_type = StreamHeaderType::decode(r)?;
        Self::decode_tail(header_type, r)
    }
}

impl Encode for SubgroupHeader {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.header_type.encode(w)?;
        self.track_alias.encode(w)?;
        self.group_id.encode(w)?;
        if self.header_type.has_subgroup_id() {
            match self.subgroup_id {
                Some(subgroup_id) => subgroup_id.encode(w)?,
                None => return Err(EncodeError::MissingField("SubgroupId")),
            }
        }
        self.publisher_priority.encode(w)?;

        Ok(())
    }
}

/// One object on a subgroup stream.
///
/// Object ids are absolute and MUST strictly increase within the stream.
/// A zero payload length is followed by a status code instead of payload
/// bytes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubgroupObject {
    pub object_id: u64,

    /// Present when the stream header type carries extensions.
    pub extension_headers: Option<KeyValuePairs>,

    pub status: Option<ObjectStatus>,

    pub payload: bytes::Bytes,
}

impl SubgroupObject {
    /// Decode one object given the stream's header type.
    pub fn decode_tail<R: bytes::Buf>(
        header_type: StreamHeaderType,
        r: &mut R,
    ) -> Result<Self, DecodeError> {
        let object_id = u64::decode(r)?;
        let extension_headers = match header_type.has_extensions() {
            true => Some(KeyValuePairs::decode(r)?),
            false => None,
        };

        let payload_length = usize::decode(r)?;
        let status = match payload_length {
            0 => Some(ObjectStatus::decode(r)?),
            _ => None,
        };

        <usize as Decode>::decode_remaining(r, payload_length)?;
        let payload = r.copy_to_bytes(payload_length);

        Ok(Self {
            object_id,
            extension_headers,
            status,
            payload,
        })
    }

    /// Encode for a stream with the given header type.
    pub fn encode_tail<W: bytes::BufMut>(
        &self,
        header_type: StreamHeaderType,
        w: &mut W,
    ) -> Result<(), EncodeError> {
        self.object_id.encode(w)?;

        if header_type.has_extensions() {
            match &self.extension_headers {
                Some(extension_headers) => extension_headers.encode(w)?,
                None => KeyValuePairs::new().encode(w)?,
            }
        }

        self.payload.len().encode(w)?;
        if self.payload.is_empty() {
            match self.status {
                Some(status) => status.encode(w)?,
                None => return Err(EncodeError::MissingField("Status")),
            }
        }

        <usize as Encode>::encode_remaining(w, self.payload.len())?;
        w.put_slice(&self.payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn encode_decode_header() {
        let mut buf = BytesMut::new();

        let header = SubgroupHeader {
            header_type: StreamHeaderType::SubgroupId,
            track_alias: 0xA11CE,
            group_id: 0x1000,
            subgroup_id: Some(0x5000),
            publisher_priority: 0xa,
        };
        header.encode(&mut buf).unwrap();
        assert_eq!(SubgroupHeader::decode(&mut buf).unwrap(), header);

        // No explicit subgroup id field for the ZeroId types.
        let header = SubgroupHeader {
            header_type: StreamHeaderType::SubgroupZeroId,
            subgroup_id: None,
            ..header
        };
        header.encode(&mut buf).unwrap();
        assert_eq!(SubgroupHeader::decode(&mut buf).unwrap(), header);
    }

    #[test]
    fn encode_header_missing_subgroup_id() {
        let mut buf = BytesMut::new();

        let header = SubgroupHeader {
            header_type: StreamHeaderType::SubgroupIdExt,
            track_alias: 1,
            group_id: 2,
            subgroup_id: None,
            publisher_priority: 3,
        };
        assert!(matches!(
            header.encode(&mut buf).unwrap_err(),
            EncodeError::MissingField("SubgroupId")
        ));
    }

    #[test]
    fn encode_decode_object() {
        let mut buf = BytesMut::new();

        let obj = SubgroupObject {
            object_id: 0x1234,
            extension_headers: None,
            status: None,
            payload: Bytes::from_static(&[0x1, 0x2, 0x3, 0x4, 0x5]),
        };
        obj.encode_tail(StreamHeaderType::SubgroupZeroId, &mut buf)
            .unwrap();
        let decoded =
            SubgroupObject::decode_tail(StreamHeaderType::SubgroupZeroId, &mut buf).unwrap();
        assert_eq!(decoded, obj);
    }

    #[test]
    fn encode_decode_object_status() {
        let mut buf = BytesMut::new();

        // An empty payload carries a status instead.
        let obj = SubgroupObject {
            object_id: 7,
            extension_headers: None,
            status: Some(ObjectStatus::EndOfGroup),
            payload: Bytes::new(),
        };
        obj.encode_tail(StreamHeaderType::SubgroupZeroId, &mut buf)
            .unwrap();
        let decoded =
            SubgroupObject::decode_tail(StreamHeaderType::SubgroupZeroId, &mut buf).unwrap();
        assert_eq!(decoded, obj);
    }

    #[test]
    fn object_partial_payload() {
        let mut buf = BytesMut::new();

        let obj = SubgroupObject {
            object_id: 1,
            extension_headers: None,
            status: None,
            payload: Bytes::from_static(b"large payload body"),
        };
        obj.encode_tail(StreamHeaderType::SubgroupZeroId, &mut buf)
            .unwrap();

        // Only part of the object has arrived: decode asks for more.
        let mut partial = Bytes::copy_from_slice(&buf[..buf.len() - 5]);
        assert!(matches!(
            SubgroupObject::decode_tail(StreamHeaderType::SubgroupZeroId, &mut partial)
                .unwrap_err(),
            DecodeError::More(5)
        ));
    }
}
