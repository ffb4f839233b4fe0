use crate::coding::{Decode, DecodeError, Encode, EncodeError, KeyValuePairs};
use crate::data::ObjectStatus;

/// Datagram object types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DatagramType {
    NoEndOfGroupNoExtensions = 0x0,
    NoEndOfGroupWithExtensions = 0x1,
    EndOfGroupNoExtensions = 0x2,
    EndOfGroupWithExtensions = 0x3,
    StatusNoExtensions = 0x4,
    StatusWithExtensions = 0x5,
}

impl DatagramType {
    pub fn has_extensions(&self) -> bool {
        matches!(
            self,
            Self::NoEndOfGroupWithExtensions | Self::EndOfGroupWithExtensions | Self::StatusWithExtensions
        )
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Self::StatusNoExtensions | Self::StatusWithExtensions)
    }

    pub fn is_end_of_group(&self) -> bool {
        matches!(
            self,
            Self::EndOfGroupNoExtensions | Self::EndOfGroupWithExtensions
        )
    }

    /// Pick the type for an object's shape.
    pub fn select(has_extensions: bool, end_of_group: bool, status: bool) -> Self {
        match (status, end_of_group, has_extensions) {
            (true, _, false) => Self::StatusNoExtensions,
            (true, _, true) => Self::StatusWithExtensions,
            (false, false, false) => Self::NoEndOfGroupNoExtensions,
            (false, false, true) => Self::NoEndOfGroupWithExtensions,
            (false, true, false) => Self::EndOfGroupNoExtensions,
            (false, true, true) => Self::EndOfGroupWithExtensions,
        }
    }
}

impl Decode for DatagramType {
    fn decode<B: bytes::Buf>(r: &mut B) -> Result<Self, DecodeError> {
        match u64::decode(r)? {
            0x0 => Ok(Self::NoEndOfGroupNoExtensions),
            0x1 => Ok(Self::NoEndOfGroupWithExtensions),
            0x2 => Ok(Self::EndOfGroupNoExtensions),
            0x3 => Ok(Self::EndOfGroupWithExtensions),
            0x4 => Ok(Self::StatusNoExtensions),
            0x5 => Ok(Self::StatusWithExtensions),
            _ => Err(DecodeError::InvalidDatagramType),
        }
    }
}

impl Encode for DatagramType {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        (*self as u64).encode(w)
    }
}

/// A single object carried in one QUIC datagram. The payload runs to the end
/// of the datagram; status types carry a status code instead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Datagram {
    pub datagram_type: DatagramType,

    /// The track alias.
    pub track_alias: u64,

    pub group_id: u64,
    pub object_id: u64,

    /// Publisher priority, where **smaller** values are sent first.
    pub publisher_priority: u8,

    /// Present for the WithExtensions types.
    pub extension_headers: Option<KeyValuePairs>,

    /// Present for the Status types.
    pub status: Option<ObjectStatus>,

    /// Present for the non-Status types.
    pub payload: Option<bytes::Bytes>,
}

impl Decode for Datagram {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let datagram_type = DatagramType::decode(r)?;
        let track_alias = u64::decode(r)?;
        let group_id = u64::decode(r)?;
        let object_id = u64::decode(r)?;
        let publisher_priority = u8::decode(r)?;

        let extension_headers = match datagram_type.has_extensions() {
            true => Some(KeyValuePairs::decode(r)?),
            false => None,
        };

        let (status, payload) = match datagram_type.is_status() {
            true => (Some(ObjectStatus::decode(r)?), None),
            false => (None, Some(r.copy_to_bytes(r.remaining()))),
        };

        Ok(Self {
            datagram_type,
            track_alias,
            group_id,
            object_id,
            publisher_priority,
            extension_headers,
            status,
            payload,
        })
    }
}

impl Encode for Datagram {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.datagram_type.encode(w)?;
        self.track_alias.encode(w)?;
        self.group_id.encode(w)?;
        self.object_id.encode(w)?;
        self.publisher_priority.encode(w)?;

        if self.datagram_type.has_extensions() {
            match &self.extension_headers {
                Some(extension_headers) => extension_headers.encode(w)?,
                None => return Err(EncodeError::MissingField("ExtensionHeaders")),
            }
        }

        if self.datagram_type.is_status() {
            match self.status {
                Some(status) => status.encode(w)?,
                None => return Err(EncodeError::MissingField("Status")),
            }
        } else {
            match &self.payload {
                Some(payload) => {
                    Self::encode_remaining(w, payload.len())?;
                    w.put_slice(payload);
                }
                None => return Err(EncodeError::MissingField("Payload")),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn encode_decode() {
        let mut buf = BytesMut::new();

        let mut extensions = KeyValuePairs::new();
        extensions.set_intvalue(2, 90210);

        let msg = Datagram {
            datagram_type: DatagramType::NoEndOfGroupNoExtensions,
            track_alias: 12,
            group_id: 0x1000,
            object_id: 0xff,
            publisher_priority: 0xa,
            extension_headers: None,
            status: None,
            payload: Some(Bytes::from_static(b"hello")),
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(Datagram::decode(&mut buf).unwrap(), msg);

        let msg = Datagram {
            datagram_type: DatagramType::EndOfGroupWithExtensions,
            extension_headers: Some(extensions.clone()),
            ..msg
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(Datagram::decode(&mut buf).unwrap(), msg);

        let msg = Datagram {
            datagram_type: DatagramType::StatusNoExtensions,
            extension_headers: None,
            status: Some(ObjectStatus::EndOfTrack),
            payload: None,
            ..msg
        };
        msg.encode(&mut buf).unwrap();
        assert_eq!(Datagram::decode(&mut buf).unwrap(), msg);
    }

    #[test]
    fn encode_missing_fields() {
        let mut buf = BytesMut::new();

        let msg = Datagram {
            datagram_type: DatagramType::StatusNoExtensions,
            track_alias: 12,
            group_id: 1,
            object_id: 2,
            publisher_priority: 3,
            extension_headers: None,
            status: None,
            payload: None,
        };
        assert!(matches!(
            msg.encode(&mut buf).unwrap_err(),
            EncodeError::MissingField("Status")
        ));
    }

    #[test]
    fn select_type() {
        assert_eq!(
            DatagramType::select(false, false, false),
            DatagramType::NoEndOfGroupNoExtensions
        );
        assert_eq!(
            DatagramType::select(true, true, false),
            DatagramType::EndOfGroupWithExtensions
        );
        assert_eq!(
            DatagramType::select(true, false, true),
            DatagramType::StatusWithExtensions
        );
    }
}
