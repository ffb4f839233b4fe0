use crate::coding::{Decode, DecodeError, Encode, EncodeError};

use std::fmt;
use std::ops::Deref;

/// A protocol version negotiated during setup; a 62-bit integer on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u64);

impl Version {
    /// The draft this implementation tracks.
    pub const DRAFT_08: Version = Version(0xff000008);

    /// All versions this implementation accepts, in preference order.
    pub const SUPPORTED: [Version; 1] = [Version::DRAFT_08];
}

impl From<u64> for Version {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<Version> for u64 {
    fn from(v: Version) -> Self {
        v.0
    }
}

impl Decode for Version {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        Ok(Self(u64::decode(r)?))
    }
}

impl Encode for Version {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.0.encode(w)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 > 0xff000000 {
            write!(f, "DRAFT_{:02}", self.0 & 0x00ffffff)
        } else {
            self.0.fmt(f)
        }
    }
}

/// A list of versions in preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Versions(pub Vec<Version>);

impl Versions {
    /// The first mutually supported version, preferring the offer order.
    pub fn select(&self, supported: &[Version]) -> Option<Version> {
        self.0.iter().find(|v| supported.contains(v)).copied()
    }
}

impl Decode for Versions {
    fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
        let count = usize::decode(r)?;
        let mut vs = Vec::new();

        for _ in 0..count {
            vs.push(Version::decode(r)?);
        }

        Ok(Self(vs))
    }
}

impl Encode for Versions {
    fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
        self.0.len().encode(w)?;

        for v in &self.0 {
            v.encode(w)?;
        }

        Ok(())
    }
}

impl Deref for Versions {
    type Target = Vec<Version>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Version>> for Versions {
    fn from(vs: Vec<Version>) -> Self {
        Self(vs)
    }
}

impl<const N: usize> From<[Version; N]> for Versions {
    fn from(vs: [Version; N]) -> Self {
        Self(vs.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encode_decode() {
        let mut buf = BytesMut::new();
        let versions: Versions = [Version(1), Version::DRAFT_08].into();

        versions.encode(&mut buf).unwrap();
        assert_eq!(
            buf.to_vec(),
            vec![
                0x02, // 2 versions
                0x01, // version 1
                0xc0, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x08, // DRAFT_08
            ]
        );
        assert_eq!(Versions::decode(&mut buf).unwrap(), versions);
    }

    #[test]
    fn select() {
        let offered: Versions = [Version(7), Version::DRAFT_08].into();
        assert_eq!(
            offered.select(&Version::SUPPORTED),
            Some(Version::DRAFT_08)
        );

        let offered: Versions = [Version(7)].into();
        assert_eq!(offered.select(&Version::SUPPORTED), None);

        let offered = Versions::default();
        assert_eq!(offered.select(&Version::SUPPORTED), None);
    }
}
