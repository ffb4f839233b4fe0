use std::collections::BTreeMap;
use std::fmt;

use bytes::Buf;

use super::{Decode, DecodeError, Encode, EncodeError};

/// A parameter or extension header value.
///
/// Even keys carry a varint, odd keys a length-prefixed byte string.
#[derive(Clone, Eq, PartialEq)]
pub enum Value {
    IntValue(u64),
    BytesValue(Vec<u8>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::IntValue(v) => write!(f, "{}", v),
            Value::BytesValue(bytes) => {
                let preview: Vec<String> =
                    bytes.iter().take(16).map(|b| format!("{:02x}", b)).collect();
                write!(f, "[{}]", preview.join(" "))
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq)]
pub struct KeyValuePair {
    pub key: u64,
    pub value: Value,
}

impl KeyValuePair {
    pub fn new_int(key: u64, value: u64) -> Self {
        Self {
            key,
            value: Value::IntValue(value),
        }
    }

    pub fn new_bytes(key: u64, value: Vec<u8>) -> Self {
        Self {
            key,
            value: Value::BytesValue(value),
        }
    }
}

impl Decode for KeyValuePair {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let key = u64::decode(r)?;

        if key % 2 == 0 {
            let value = u64::decode(r)?;
            Ok(KeyValuePair::new_int(key, value))
        } else {
            let length = usize::decode(r)?;
            if length > u16::MAX as usize {
                return Err(DecodeError::KeyValuePairLengthExceeded);
            }

            Self::decode_remaining(r, length)?;
            let mut buf = vec![0; length];
            r.copy_to_slice(&mut buf);
            Ok(KeyValuePair::new_bytes(key, buf))
        }
    }
}

impl Encode for KeyValuePair {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        match &self.value {
            Value::IntValue(v) => {
                if self.key % 2 != 0 {
                    return Err(EncodeError::InvalidValue);
                }
                self.key.encode(w)?;
                v.encode(w)?;
            }
            Value::BytesValue(v) => {
                if self.key % 2 == 0 {
                    return Err(EncodeError::InvalidValue);
                }
                self.key.encode(w)?;
                v.len().encode(w)?;
                Self::encode_remaining(w, v.len())?;
                w.put_slice(v);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for KeyValuePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: {:?}}}", self.key, self.value)
    }
}

/// A parameter list / extension header map.
///
/// Encoded as a total byte length followed by the pairs. Ordered by key so
/// the encoding is deterministic; unknown keys are preserved so a relay can
/// forward what it does not understand.
#[derive(Default, Clone, Eq, PartialEq)]
pub struct KeyValuePairs(pub BTreeMap<u64, KeyValuePair>);

impl KeyValuePairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_intvalue(&mut self, key: u64, value: u64) {
        self.0.insert(key, KeyValuePair::new_int(key, value));
    }

    pub fn set_bytesvalue(&mut self, key: u64, value: Vec<u8>) {
        self.0.insert(key, KeyValuePair::new_bytes(key, value));
    }

    pub fn has(&self, key: u64) -> bool {
        self.0.contains_key(&key)
    }

    pub fn get(&self, key: u64) -> Option<&KeyValuePair> {
        self.0.get(&key)
    }

    pub fn get_int(&self, key: u64) -> Option<u64> {
        match self.0.get(&key)?.value {
            Value::IntValue(v) => Some(v),
            Value::BytesValue(_) => None,
        }
    }

    pub fn get_bytes(&self, key: u64) -> Option<&[u8]> {
        match &self.0.get(&key)?.value {
            Value::BytesValue(v) => Some(v),
            Value::IntValue(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Decode for KeyValuePairs {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        // Total byte length of the encoded pairs.
        let length = usize::decode(r)?;
        Self::decode_remaining(r, length)?;

        if length == 0 {
            return Ok(Self::new());
        }

        let mut buf = vec![0u8; length];
        r.copy_to_slice(&mut buf);
        let mut pairs_bytes = bytes::Bytes::from(buf);

        let mut pairs = BTreeMap::new();
        while pairs_bytes.has_remaining() {
            let kvp = KeyValuePair::decode(&mut pairs_bytes)?;
            if pairs.contains_key(&kvp.key) {
                return Err(DecodeError::DuplicateParameter(kvp.key));
            }
            pairs.insert(kvp.key, kvp);
        }

        Ok(Self(pairs))
    }
}

impl Encode for KeyValuePairs {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        let mut tmp = bytes::BytesMut::new();
        for kvp in self.0.values() {
            kvp.encode(&mut tmp)?;
        }

        (tmp.len() as u64).encode(w)?;
        w.put_slice(&tmp);
        Ok(())
    }
}

impl fmt::Debug for KeyValuePairs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.values()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn encode_decode_pair() {
        let mut buf = BytesMut::new();

        let kvp = KeyValuePair::new_int(2, 5000);
        kvp.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x02, 0x53, 0x88]);
        assert_eq!(KeyValuePair::decode(&mut buf).unwrap(), kvp);

        let kvp = KeyValuePair::new_bytes(3, vec![0x0a, 0x0b]);
        kvp.encode(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), vec![0x03, 0x02, 0x0a, 0x0b]);
        assert_eq!(KeyValuePair::decode(&mut buf).unwrap(), kvp);
    }

    #[test]
    fn encode_parity_mismatch() {
        let mut buf = BytesMut::new();

        // Varint values require an even key.
        let kvp = KeyValuePair::new_int(1, 0);
        assert!(matches!(
            kvp.encode(&mut buf).unwrap_err(),
            EncodeError::InvalidValue
        ));

        // Byte values require an odd key.
        let kvp = KeyValuePair::new_bytes(2, vec![0x01]);
        assert!(matches!(
            kvp.encode(&mut buf).unwrap_err(),
            EncodeError::InvalidValue
        ));
    }

    #[test]
    fn encode_decode_pairs() {
        let mut buf = BytesMut::new();

        let mut kvps = KeyValuePairs::new();
        kvps.set_intvalue(0, 1);
        kvps.set_bytesvalue(1, vec![0x61, 0x62]);
        kvps.encode(&mut buf).unwrap();

        assert_eq!(
            buf.to_vec(),
            vec![
                0x06, // 6 bytes of pairs
                0x00, 0x01, // key 0 = 1
                0x01, 0x02, 0x61, 0x62, // key 1 = "ab"
            ]
        );
        assert_eq!(KeyValuePairs::decode(&mut buf).unwrap(), kvps);
    }

    #[test]
    fn decode_duplicate_key() {
        // Two pairs with key 0.
        let data: Vec<u8> = vec![0x04, 0x00, 0x01, 0x00, 0x02];
        let mut buf: Bytes = data.into();
        assert!(matches!(
            KeyValuePairs::decode(&mut buf).unwrap_err(),
            DecodeError::DuplicateParameter(0)
        ));
    }

    #[test]
    fn decode_empty() {
        let mut buf = Bytes::from_static(&[0x00]);
        let kvps = KeyValuePairs::decode(&mut buf).unwrap();
        assert!(kvps.is_empty());
    }
}
