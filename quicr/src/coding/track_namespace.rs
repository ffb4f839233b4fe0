use super::{Decode, DecodeError, Encode, EncodeError, Tuple, TupleField};

/// A hierarchical track namespace: an ordered tuple of byte strings.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TrackNamespace(pub Tuple);

impl TrackNamespace {
    pub const MAX_FIELDS: usize = 32;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: TupleField) {
        self.0.add(field);
    }

    pub fn fields(&self) -> &[TupleField] {
        &self.0.fields
    }

    /// Build from a slash separated UTF-8 path, one tuple field per segment.
    pub fn from_utf8_path(path: &str) -> Self {
        let mut ns = Self::new();
        for part in path.split('/') {
            ns.add(TupleField::from_utf8(part));
        }
        ns
    }

    pub fn to_utf8_path(&self) -> String {
        let mut path = String::new();
        for field in self.fields() {
            path.push('/');
            path.push_str(&String::from_utf8_lossy(&field.value));
        }
        path
    }

    /// True if `self` is a prefix of `other`, field by field.
    pub fn is_prefix_of(&self, other: &TrackNamespace) -> bool {
        self.fields().len() <= other.fields().len()
            && self.fields().iter().zip(other.fields()).all(|(a, b)| a == b)
    }
}

impl Decode for TrackNamespace {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let count = usize::decode(r)?;
        if count > Self::MAX_FIELDS {
            return Err(DecodeError::FieldBoundsExceeded(
                "TrackNamespace tuples".to_string(),
            ));
        }

        let mut ns = Self::new();
        for _ in 0..count {
            ns.add(TupleField::decode(r)?);
        }
        Ok(ns)
    }
}

impl Encode for TrackNamespace {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        if self.fields().len() > Self::MAX_FIELDS {
            return Err(EncodeError::FieldBoundsExceeded(
                "TrackNamespace tuples".to_string(),
            ));
        }
        self.0.encode(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn encode_decode() {
        let mut buf = BytesMut::new();

        let ns = TrackNamespace::from_utf8_path("conf/1");
        ns.encode(&mut buf).unwrap();
        assert_eq!(
            buf.to_vec(),
            vec![
                0x02, // 2 tuple fields
                0x04, 0x63, 0x6f, 0x6e, 0x66, // "conf"
                0x01, 0x31, // "1"
            ]
        );
        let decoded = TrackNamespace::decode(&mut buf).unwrap();
        assert_eq!(decoded, ns);
    }

    #[test]
    fn prefix_match() {
        let prefix = TrackNamespace::from_utf8_path("conf.example.com/conf");
        let full = TrackNamespace::from_utf8_path("conf.example.com/conf/1");
        let other = TrackNamespace::from_utf8_path("conf.example.com/meeting");

        assert!(prefix.is_prefix_of(&full));
        assert!(prefix.is_prefix_of(&prefix));
        assert!(!prefix.is_prefix_of(&other));
        assert!(!full.is_prefix_of(&prefix));
    }

    #[test]
    fn decode_too_many_fields() {
        let mut data = vec![0x00; 128];
        data[0] = (TrackNamespace::MAX_FIELDS + 1) as u8;
        let mut buf: Bytes = data.into();
        assert!(matches!(
            TrackNamespace::decode(&mut buf).unwrap_err(),
            DecodeError::FieldBoundsExceeded(_)
        ));
    }
}
