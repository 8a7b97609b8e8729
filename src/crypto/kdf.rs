use argon2::{Algorithm, Argon2, Params, Version};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::{KEY_HASH_LEN, KEY_LEN, MAGIC, MAGIC_LEN, header::Header};

/// Domain prefix mixed into the implicit salt.
const SALT_PREFIX: &[u8] = b"sealstream/v1/default-salt:";
/// How many times the salt digest is repeated.
const SALT_REPEAT: usize = 2;

/// Argon2id cost parameters.
///
/// The values are part of the container format: changing them changes every
/// derived key, so they are fixed per format revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl KdfParams {
    /// Parameters of format revision 1.
    pub const V1: Self = Self {
        // 64 MiB
        mem_cost_kib: 64 * 1024,
        time_cost: 1,
        parallelism: 4,
    };

    fn argon2(&self, out_len: usize) -> Argon2<'static> {
        let params = Params::new(
            self.mem_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(out_len),
        )
        .expect("BUG: format KDF parameters are always valid");
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    fn hash_into(&self, password: &[u8], salt: &[u8], out: &mut [u8]) {
        self.argon2(out.len())
            .hash_password_into(password, salt, out)
            .expect("BUG: argon2 rejected a fixed-size salt or output length");
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::V1
    }
}

/// A derived 32-byte key. Wiped from memory on drop.
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Non-secret fingerprint of a [`Key`], stored in every header.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyHash([u8; KEY_HASH_LEN]);

impl KeyHash {
    pub fn from_bytes(bytes: [u8; KEY_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_HASH_LEN] {
        &self.0
    }

    /// Compares against raw bytes without branching on their content.
    pub fn ct_matches(&self, other: &[u8]) -> bool {
        other.len() == KEY_HASH_LEN && bool::from(self.0[..].ct_eq(other))
    }
}

impl fmt::Debug for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHash(")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

/// Salt used when the caller supplies none.
///
/// Deterministic in the password so that deriving twice without an explicit
/// salt yields the same key.
pub fn default_salt(password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(SALT_PREFIX);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    digest.repeat(SALT_REPEAT)
}

/// Derives the stream key from a password.
///
/// An empty `salt` selects [`default_salt`].
///
/// # Panics
///
/// Panics if `password` is empty.
pub fn derive_key(password: &str, salt: &[u8]) -> Key {
    assert!(!password.is_empty(), "cannot derive a key from an empty password");

    let implicit;
    let salt = if salt.is_empty() {
        implicit = default_salt(password);
        &implicit[..]
    } else {
        salt
    };

    let mut key = [0u8; KEY_LEN];
    KdfParams::V1.hash_into(password.as_bytes(), salt, &mut key);
    Key(key)
}

/// Derives the key hash embedded in headers.
///
/// MD5 and SHA-1 of the key only serve as mixing material for a second
/// Argon2id run; the strength comes from Argon2.
pub fn hash_key(key: &Key) -> KeyHash {
    let salt = Md5::digest(key.as_bytes());
    let mut password = Sha1::digest(key.as_bytes());

    let mut hash = [0u8; KEY_HASH_LEN];
    KdfParams::V1.hash_into(&password, &salt, &mut hash);
    password.as_mut_slice().zeroize();

    KeyHash(hash)
}

/// Checks a password against header bytes without touching the payload.
///
/// Returns `false` straight away if `header` is too short or does not start
/// with the magic number, before paying for key derivation.
pub fn validate_password(header: &[u8], password: &str) -> bool {
    if header.len() < Header::LEN || header[..MAGIC_LEN] != MAGIC {
        return false;
    }
    let key = derive_key(password, &[]);
    hash_key(&key).ct_matches(&header[MAGIC_LEN..Header::LEN])
}
