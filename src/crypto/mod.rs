//! Cryptographic building blocks of the container format.
//!
//! Provides password-based key derivation, the positional CTR keystream
//! and header encoding/validation.

pub mod cipher;
pub mod header;
pub mod kdf;

pub use cipher::CipherStream;
pub use header::{Header, MAGIC, is_encrypted};
pub use kdf::{Key, KeyHash, KdfParams, default_salt, derive_key, hash_key, validate_password};

/// Length of the derived key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the key hash stored in the header (16 bytes).
pub const KEY_HASH_LEN: usize = 16;
/// Length of the magic bytes (4 bytes "SLS\x01").
pub const MAGIC_LEN: usize = 4;
/// Length of the AES-128 key taken from the front of the derived key.
pub const CIPHER_KEY_LEN: usize = 16;
/// Length of the initial counter block taken from the back of the derived key.
pub const IV_LEN: usize = KEY_LEN - CIPHER_KEY_LEN;
