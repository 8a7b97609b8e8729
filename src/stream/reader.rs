use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, warn};

use super::poisoned;
use crate::crypto::{CipherStream, Header};
use crate::error::{Error, wrap_io};

/// Wraps a plaintext reader and yields the encrypted container.
///
/// The first bytes read are the header, followed by the ciphertext of
/// whatever `inner` produces.
pub struct EncReader<R: Read> {
    inner: R,
    cipher: CipherStream,
    header: [u8; Header::LEN],
    header_pos: usize,
    // Source error hit after header bytes were already handed out.
    deferred: Option<io::Error>,
}

impl<R: Read> EncReader<R> {
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn new(inner: R, password: &str) -> Self {
        Self::with_cipher(inner, CipherStream::new(password))
    }

    pub fn with_cipher(inner: R, cipher: CipherStream) -> Self {
        let header = cipher.header().to_bytes();
        Self {
            inner,
            cipher,
            header,
            header_pos: 0,
            deferred: None,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for EncReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let mut n = 0;
        if self.header_pos < Header::LEN {
            let pending = &self.header[self.header_pos..];
            n = pending.len().min(buf.len());
            buf[..n].copy_from_slice(&pending[..n]);
            self.header_pos += n;
            if n == buf.len() {
                return Ok(n);
            }
        }

        match self.inner.read(&mut buf[n..]) {
            Ok(m) => {
                self.cipher.xor_key_stream(&mut buf[n..n + m]);
                Ok(n + m)
            }
            Err(err) if n > 0 => {
                self.deferred = Some(wrap_io(err, "reading plaintext"));
                Ok(n)
            }
            Err(err) => Err(wrap_io(err, "reading plaintext")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    Pending,
    Verified,
    Rejected,
    // Reading the header failed part way through.
    Broken,
}

/// Wraps a container reader and yields the plaintext.
///
/// The header is read and checked before the first payload byte is
/// returned, either lazily on the first `read` or eagerly through
/// [`verify`](Self::verify). A password mismatch fails with
/// [`Error::InvalidKey`] and the reader stays rejected.
///
/// When the inner reader is seekable, so is a `DecReader`. Positions are
/// plaintext offsets: offset 0 is the first byte after the header, and the
/// keystream is moved along with the inner reader so reads after a seek
/// decrypt correctly.
pub struct DecReader<R: Read> {
    inner: R,
    cipher: CipherStream,
    state: HeaderState,
}

impl<R: Read> DecReader<R> {
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn new(inner: R, password: &str) -> Self {
        Self::with_cipher(inner, CipherStream::new(password))
    }

    pub fn with_cipher(inner: R, cipher: CipherStream) -> Self {
        Self {
            inner,
            cipher,
            state: HeaderState::Pending,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads and checks the header if that has not happened yet.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidKey`] on a password or magic mismatch,
    /// [`Error::Malformed`] if the input ends inside the header.
    pub fn verify(&mut self) -> io::Result<()> {
        match self.state {
            HeaderState::Verified => return Ok(()),
            HeaderState::Rejected => return Err(Error::InvalidKey.into()),
            HeaderState::Broken => return Err(poisoned("decrypting reader")),
            HeaderState::Pending => {}
        }

        let mut header = [0u8; Header::LEN];
        if let Err(err) = self.inner.read_exact(&mut header) {
            self.state = HeaderState::Broken;
            if err.kind() == io::ErrorKind::UnexpectedEof {
                return Err(Error::malformed("input ends before the header is complete").into());
            }
            return Err(wrap_io(err, "reading header"));
        }

        if !self.cipher.validate_password(&header) {
            warn!("stream header does not match the password");
            self.state = HeaderState::Rejected;
            return Err(Error::InvalidKey.into());
        }

        debug!("stream header accepted");
        self.state = HeaderState::Verified;
        Ok(())
    }
}

impl<R: Read> Read for DecReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.verify()?;

        let n = self
            .inner
            .read(buf)
            .map_err(|err| wrap_io(err, "reading ciphertext"))?;
        self.cipher.xor_key_stream(&mut buf[..n]);
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for DecReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.verify()?;

        let offset = Header::LEN as u64;
        let target = match pos {
            SeekFrom::Start(n) => SeekFrom::Start(n.checked_add(offset).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "seek offset overflows")
            })?),
            relative => relative,
        };

        // Only relative seeks can land inside the header.
        let restore = match target {
            SeekFrom::Start(_) => None,
            _ => Some(self.inner.stream_position()?),
        };

        let physical = self.inner.seek(target)?;
        if physical < offset {
            if let Some(previous) = restore {
                self.inner.seek(SeekFrom::Start(previous))?;
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot seek before the start of the payload",
            ));
        }

        let logical = physical - offset;
        self.cipher.seek(logical);
        Ok(logical)
    }
}
