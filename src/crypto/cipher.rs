use ctr::cipher::generic_array::GenericArray;
use ctr::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};

use super::header::Header;
use super::kdf::{self, KeyHash};
use super::{CIPHER_KEY_LEN, IV_LEN};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Password-keyed AES-128-CTR keystream with a running position.
///
/// Byte `n` of a stream is always combined with keystream byte `n`, no
/// matter how the stream is split across calls. A `CipherStream` belongs to
/// exactly one reader or writer; it is deliberately not `Clone`.
pub struct CipherStream {
    ctr: Aes128Ctr,
    key_hash: KeyHash,
}

impl CipherStream {
    /// Derives the key for `password` and sets up the keystream at position 0.
    ///
    /// The first half of the key is the AES-128 key, the second half the
    /// initial counter block.
    ///
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn new(password: &str) -> Self {
        let key = kdf::derive_key(password, &[]);
        let key_hash = kdf::hash_key(&key);

        let bytes = key.as_bytes();
        let ctr = Aes128Ctr::new(
            GenericArray::from_slice(&bytes[..CIPHER_KEY_LEN]),
            GenericArray::from_slice(&bytes[CIPHER_KEY_LEN..CIPHER_KEY_LEN + IV_LEN]),
        );

        Self { ctr, key_hash }
    }

    /// XORs the next `buf.len()` keystream bytes into `buf`.
    pub fn xor_key_stream(&mut self, buf: &mut [u8]) {
        self.ctr.apply_keystream(buf);
    }

    /// Out-of-place variant of [`xor_key_stream`](Self::xor_key_stream).
    ///
    /// # Panics
    ///
    /// Panics if `dst` is shorter than `src`.
    pub fn xor_key_stream_into(&mut self, src: &[u8], dst: &mut [u8]) {
        let dst = &mut dst[..src.len()];
        dst.copy_from_slice(src);
        self.ctr.apply_keystream(dst);
    }

    /// Moves the keystream to byte offset `pos` of the plaintext.
    pub fn seek(&mut self, pos: u64) {
        self.ctr.seek(pos);
    }

    /// Current keystream offset.
    pub fn position(&self) -> u64 {
        self.ctr.current_pos()
    }

    pub fn key_hash(&self) -> &KeyHash {
        &self.key_hash
    }

    pub fn header(&self) -> Header {
        Header::new(self.key_hash)
    }

    /// Checks header bytes against this stream's key hash.
    pub fn validate_password(&self, data: &[u8]) -> bool {
        self.header().matches(data)
    }
}
