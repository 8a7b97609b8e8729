//! Password-sealed streaming encryption.
//!
//! A sealed stream is a 20-byte header followed by the AES-128-CTR
//! ciphertext of the payload:
//!
//! ```text
//! "SLS\x01" (4) | key hash (16) | ciphertext (same length as plaintext)
//! ```
//!
//! The key is derived from the password with Argon2id. The header carries a
//! hash of that key, which lets a reader reject a wrong password before it
//! produces a single byte of output.
//!
//! # No integrity protection
//!
//! The format has **no authentication tag**. Flipped ciphertext bits flip
//! the same plaintext bits and truncation goes unnoticed; nothing detects
//! tampering. Every stream sealed with the same password also uses the same
//! keystream, so two containers sealed under one password leak the XOR of
//! their plaintexts. Use this where that is acceptable, or add a MAC on top.
//!
//! # Usage
//!
//! ```
//! let sealed = sealstream::encrypt(b"attack at dawn", "hello123").unwrap();
//! assert!(sealstream::is_encrypted(&sealed));
//!
//! let plain = sealstream::decrypt(&sealed, "hello123").unwrap();
//! assert_eq!(plain, b"attack at dawn");
//!
//! let err = sealstream::decrypt(&sealed, "hello124").unwrap_err();
//! assert!(err.is_invalid_key());
//! ```
//!
//! The [`stream`] adapters do the same over any `Read` or `Write`, and
//! [`file`] wraps them for whole files.

pub mod config;
pub mod crypto;
pub mod error;
pub mod file;
pub mod stream;

use std::io::{Read, Write};

pub use crate::crypto::{
    CipherStream, Header, Key, KeyHash, KdfParams, is_encrypted, validate_password,
};
pub use crate::error::{Error, Result};
pub use crate::file::{
    decrypt_file, decrypt_file_chunks, encrypt_file, is_encrypted_file, re_encrypt_file,
    validate_file_password,
};
pub use crate::stream::{Close, DecReader, DecWriter, EncReader, EncWriter};

/// Seals `plaintext` under `password` in memory.
///
/// # Panics
///
/// Panics if `password` is empty.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
    let out = Vec::with_capacity(Header::LEN + plaintext.len());
    let mut writer = EncWriter::new(out, password);
    writer
        .write_all(plaintext)
        .map_err(|err| Error::from_io(err, "encrypting buffer"))?;
    writer
        .finish()
        .map_err(|err| Error::from_io(err, "encrypting buffer"))
}

/// Opens a sealed buffer.
///
/// # Errors
///
/// [`Error::InvalidKey`] for a wrong password or foreign data,
/// [`Error::Malformed`] if `ciphertext` is shorter than a header.
///
/// # Panics
///
/// Panics if `password` is empty.
pub fn decrypt(ciphertext: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut reader = DecReader::new(ciphertext, password);
    let mut out = Vec::with_capacity(ciphertext.len().saturating_sub(Header::LEN));
    reader
        .read_to_end(&mut out)
        .map_err(|err| Error::from_io(err, "decrypting buffer"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_roundtrip() {
        for plain in [&b""[..], &b"x"[..], &b"hello world, hello world"[..]] {
            let sealed = encrypt(plain, "pw").unwrap();
            assert_eq!(sealed.len(), Header::LEN + plain.len());
            assert_eq!(decrypt(&sealed, "pw").unwrap(), plain);
        }
    }

    #[test]
    fn wrong_password_returns_nothing() {
        let sealed = encrypt(b"secret", "pw").unwrap();

        assert!(decrypt(&sealed, "pw2").unwrap_err().is_invalid_key());
    }

    #[test]
    fn short_input_is_malformed() {
        match decrypt(b"SLS", "pw") {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got: {other:?}"),
        }
    }

    #[test]
    fn encryption_is_deterministic_per_password() {
        let a = encrypt(b"same", "pw").unwrap();
        let b = encrypt(b"same", "pw").unwrap();
        let c = encrypt(b"same", "other").unwrap();

        assert_eq!(a, b);
        assert_ne!(a[Header::LEN..], c[Header::LEN..]);
    }
}
