use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs};
use crate::data::{ObjectStatus, StreamHeaderType};

/// Header at the start of a fetch stream; ties the stream to the Fetch
/// request it answers. The stream FIN ends the fetch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchHeader {
    /// The fetch request ID
    pub request_id: u64,
}

impl FetchHeader {
    /// Decode the fields after the type varint has been consumed.
    pub fn decode_tail<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let request_id = u64::decode(r)?;
        Ok(Self { request_id })
    }
}

impl Decode for FetchHeader {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let header_type = StreamHeaderType::decode(r)?;
        if !header_type.is_fetch() {
            return Err(DecodeError::InvalidHeaderType);
        }
        Self::decode_tail(r)
    }
}

impl Encode for FetchHeader {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        StreamHeaderType::Fetch.encode(w)?;
        self.request_id.encode(w)?;
        Ok(())
    }
}

/// One object on a fetch stream. Unlike subgroup streams a fetch stream may
/// span groups and subgroups, so every field is explicit.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FetchObject {
    pub group_id: u64,
    pub subgroup_id: u64,
    pub object_id: u64,

    /// Publisher priority, where **smaller** values are sent first.
    pub publisher_priority: u8,

    /// Always present on the wire; may be empty.
    pub extension_headers: KeyValuePairs,

    pub status: Option<ObjectStatus>,

    pub payload: bytes::Bytes,
}

impl Decode for FetchObject {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let group_id = u64::decode(r)?;
        let subgroup_id = u64::decode(r)?;
        let object_id = u64::decode(r)?;
        let publisher_priority = u8::decode(r)?;
        let extension_headers = KeyValuePairs::decode(r)?;

        let payload_length = usize::decode(r)?;
        let status = match payload_length {
            0 => Some(ObjectStatus::decode(r)?),
            _ => None,
        };

        Self::decode_remaining(r, payload_length)?;
        let payload = r.copy_to_bytes(payload_length);

        Ok(Self {
            group_id,
            subgroup_id,
            object_id,
            publisher_priority,
            extension_headers,
            status,
            payload,
        })
    }
}

impl Encode for FetchObject {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.group_id.encode(w)?;
        self.subgroup_id.encode(w)?;
        self.object_id.encode(w)?;
        self.publisher_priority.encode(w)?;
        self.extension_headers.encode(w)?;

        self.payload.len().encode(w)?;
        if self.payload.is_empty() {
            match self.status {
                Some(status) => status.encode(w)?,
                None => return Err(EncodeError::MissingField("Status")),
            }
        }

        Self::encode_remaining(w, self.payload.len())?;
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

        let header = FetchHeader { request_id: 4 };
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x05, 0x04]);
        assert_eq!(FetchHeader::decode(&mut buf).unwrap(), header);
    }

    #[test]
    fn encode_decode_object() {
        let mut buf = BytesMut::new();

        let obj = FetchObject {
            group_id: 6,
            subgroup_id: 0,
            object_id: 1,
            publisher_priority: 127,
            extension_headers: Default::default(),
            status: None,
            payload: Bytes::from_static(b"P"),
        };
        obj.encode(&mut buf).unwrap();
        assert_eq!(FetchObject::decode(&mut buf).unwrap(), obj);

        let obj = FetchObject {
            status: Some(ObjectStatus::EndOfTrack),
            payload: Bytes::new(),
            ..obj
        };
        obj.encode(&mut buf).unwrap();
        assert_eq!(FetchObject::decode(&mut buf).unwrap(), obj);
    }
}
