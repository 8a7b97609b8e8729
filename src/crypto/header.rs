use super::kdf::KeyHash;
use crate::crypto::{KEY_HASH_LEN, MAGIC_LEN};
use crate::error::{Error, Result};

/// Magic bytes identifying a sealstream container, revision 1 ("SLS\x01").
pub const MAGIC: [u8; MAGIC_LEN] = [0x53, 0x4C, 0x53, 0x01];

/// Fixed prefix of every encrypted stream.
///
/// ```text
/// MAGIC (4) | KEY_HASH (16) | CIPHERTEXT
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    key_hash: KeyHash,
}

impl Header {
    pub const LEN: usize = MAGIC_LEN + KEY_HASH_LEN;

    pub fn new(key_hash: KeyHash) -> Self {
        Self { key_hash }
    }

    pub fn key_hash(&self) -> &KeyHash {
        &self.key_hash
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[..MAGIC_LEN].copy_from_slice(&MAGIC);
        buf[MAGIC_LEN..].copy_from_slice(self.key_hash.as_bytes());
        buf
    }

    /// Parses the header at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if `data` is shorter than [`Header::LEN`]
    /// and [`Error::InvalidKey`] if the magic number does not match.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(Error::malformed(format!(
                "header needs {} bytes, got {}",
                Self::LEN,
                data.len()
            )));
        }

        if data[..MAGIC_LEN] != MAGIC {
            return Err(Error::InvalidKey);
        }

        let mut hash = [0u8; KEY_HASH_LEN];
        hash.copy_from_slice(&data[MAGIC_LEN..Self::LEN]);

        Ok(Self::new(KeyHash::from_bytes(hash)))
    }

    /// Returns `true` if `data` starts with this exact header.
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= Self::LEN
            && data[..MAGIC_LEN] == MAGIC
            && self.key_hash.ct_matches(&data[MAGIC_LEN..Self::LEN])
    }
}

/// Cheap check: does `data` look like a sealstream container?
///
/// Needs no password; only the length and the magic number are checked.
pub fn is_encrypted(data: &[u8]) -> bool {
    data.len() >= Header::LEN && data[..MAGIC_LEN] == MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header::new(KeyHash::from_bytes([9u8; KEY_HASH_LEN]))
    }

    #[test]
    fn header_roundtrip() {
        let header = sample();

        let bytes = header.to_bytes();
        let parsed = Header::from_bytes(&bytes).unwrap();

        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..4], b"SLS\x01");
        assert_eq!(parsed, header);
    }

    #[test]
    fn header_invalid_magic_fails() {
        let mut data = sample().to_bytes();
        data[..4].copy_from_slice(b"FAIL");

        assert!(Header::from_bytes(&data).unwrap_err().is_invalid_key());
    }

    #[test]
    fn header_too_short_fails() {
        let data = sample().to_bytes();

        match Header::from_bytes(&data[..Header::LEN - 1]) {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got: {other:?}"),
        }
    }

    #[test]
    fn matches_checks_magic_and_hash() {
        let header = sample();
        let mut data = header.to_bytes().to_vec();
        data.extend_from_slice(b"payload");

        assert!(header.matches(&data));

        let other = Header::new(KeyHash::from_bytes([8u8; KEY_HASH_LEN]));
        assert!(!other.matches(&data));

        data[3] = 0x02;
        assert!(!header.matches(&data));
    }

    #[test]
    fn is_encrypted_detects_containers() {
        let bytes = sample().to_bytes();

        assert!(is_encrypted(&bytes));
        assert!(!is_encrypted(&bytes[..Header::LEN - 1]));
        assert!(!is_encrypted(b"plain text that is long enough"));
        assert!(!is_encrypted(&[]));
    }
}
