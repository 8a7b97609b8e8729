use std::io::{self, Write};
use std::mem;

use tracing::{debug, warn};

use super::{Close, poisoned};
use crate::crypto::{CipherStream, Header};
use crate::error::{Error, wrap_io};

/// Wraps a writer and encrypts everything written to it.
///
/// The header goes out in front of the first ciphertext byte. Every `write`
/// encrypts its input and forwards it at once, so nothing is held back
/// between calls. A writer that never saw any data still has to emit the
/// header; call [`finish`](Self::finish) or [`Close::close`] to make sure the
/// result is a complete (possibly empty) container.
///
/// ```
/// use std::io::Write;
/// use sealstream::{DecWriter, EncWriter};
///
/// let mut writer = EncWriter::new(Vec::new(), "hello123");
/// writer.write_all(b"some plaintext").unwrap();
/// let sealed = writer.finish().unwrap();
///
/// let mut writer = DecWriter::new(Vec::new(), "hello123");
/// writer.write_all(&sealed).unwrap();
/// assert_eq!(writer.finish().unwrap(), b"some plaintext");
/// ```
pub struct EncWriter<W: Write> {
    inner: W,
    cipher: CipherStream,
    // Present until the header has been handed to `inner`.
    header: Option<[u8; Header::LEN]>,
    buffer: Vec<u8>,
    errored: bool,
}

impl<W: Write> EncWriter<W> {
    /// Derives the key for `password` and wraps `inner`.
    ///
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn new(inner: W, password: &str) -> Self {
        Self::with_cipher(inner, CipherStream::new(password))
    }

    /// Wraps `inner` using a fresh, unused cipher stream.
    pub fn with_cipher(inner: W, cipher: CipherStream) -> Self {
        let header = Some(cipher.header().to_bytes());
        Self {
            inner,
            cipher,
            header,
            buffer: Vec::new(),
            errored: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Writes a pending header, flushes and hands back the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.check()?;
        self.write_header()?;
        if let Err(err) = self.inner.flush() {
            return Err(wrap_io(err, "flushing ciphertext"));
        }
        Ok(self.inner)
    }

    fn check(&self) -> io::Result<()> {
        if self.errored {
            return Err(poisoned("encrypting writer"));
        }
        Ok(())
    }

    fn fail(&mut self, err: io::Error, context: &str) -> io::Error {
        self.errored = true;
        wrap_io(err, context)
    }

    fn write_header(&mut self) -> io::Result<()> {
        if let Some(header) = self.header.take() {
            if let Err(err) = self.inner.write_all(&header) {
                return Err(self.fail(err, "writing header"));
            }
        }
        Ok(())
    }
}

impl<W: Write> Write for EncWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.write_header()?;
        if buf.is_empty() {
            return Ok(0);
        }

        self.buffer.clear();
        self.buffer.extend_from_slice(buf);
        self.cipher.xor_key_stream(&mut self.buffer);

        if let Err(err) = self.inner.write_all(&self.buffer) {
            return Err(self.fail(err, "writing ciphertext"));
        }
        self.buffer.clear();

        // Report consumed input, not bytes produced downstream.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        if let Err(err) = self.inner.flush() {
            return Err(self.fail(err, "flushing ciphertext"));
        }
        Ok(())
    }
}

impl<W: Write + Close> Close for EncWriter<W> {
    fn close(&mut self) -> io::Result<()> {
        self.check()?;
        self.write_header()?;
        self.flush()?;
        if let Err(err) = self.inner.close() {
            return Err(self.fail(err, "closing ciphertext sink"));
        }
        Ok(())
    }
}

enum State {
    /// Collecting the first `Header::LEN` bytes.
    AwaitingHeader(Vec<u8>),
    /// Header accepted; input is decrypted and forwarded directly.
    Streaming,
    /// Header did not match the password. Terminal.
    Rejected,
    /// The inner writer failed. Terminal.
    Failed,
}

/// Wraps a writer and decrypts a container written to it.
///
/// Input is held back until the header is complete. The header is then
/// checked against the password: on a match it is dropped and everything
/// after it is decrypted and forwarded, on a mismatch the write fails with
/// [`Error::InvalidKey`] and so does every later call.
///
/// While the header is incomplete `write` still reports all input as
/// consumed although nothing has reached the inner writer yet.
pub struct DecWriter<W: Write> {
    inner: W,
    cipher: CipherStream,
    state: State,
    scratch: Vec<u8>,
}

impl<W: Write> DecWriter<W> {
    /// Derives the key for `password` and wraps `inner`.
    ///
    /// # Panics
    ///
    /// Panics if `password` is empty.
    pub fn new(inner: W, password: &str) -> Self {
        Self::with_cipher(inner, CipherStream::new(password))
    }

    /// Wraps `inner` using a fresh, unused cipher stream.
    pub fn with_cipher(inner: W, cipher: CipherStream) -> Self {
        Self {
            inner,
            cipher,
            state: State::AwaitingHeader(Vec::with_capacity(Header::LEN)),
            scratch: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// `true` once the header has been received and accepted.
    pub fn is_validated(&self) -> bool {
        matches!(self.state, State::Streaming)
    }

    /// Flushes and hands back the inner writer.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Malformed`] if the input ended before a complete
    /// header was written.
    pub fn finish(mut self) -> io::Result<W> {
        self.check_complete()?;
        if let Err(err) = self.inner.flush() {
            return Err(wrap_io(err, "flushing plaintext"));
        }
        Ok(self.inner)
    }

    fn check_complete(&self) -> io::Result<()> {
        match &self.state {
            State::Streaming => Ok(()),
            State::AwaitingHeader(pending) => Err(Error::malformed(format!(
                "input ended after {} of {} header bytes",
                pending.len(),
                Header::LEN
            ))
            .into()),
            State::Rejected => Err(Error::InvalidKey.into()),
            State::Failed => Err(poisoned("decrypting writer")),
        }
    }

    fn accept_header(&mut self, mut pending: Vec<u8>) -> io::Result<()> {
        if !self.cipher.validate_password(&pending[..Header::LEN]) {
            warn!("stream header does not match the password");
            self.state = State::Rejected;
            return Err(Error::InvalidKey.into());
        }
        debug!("stream header accepted");

        pending.drain(..Header::LEN);
        if !pending.is_empty() {
            self.cipher.xor_key_stream(&mut pending);
            self.inner
                .write_all(&pending)
                .map_err(|err| wrap_io(err, "writing plaintext"))?;
        }
        self.state = State::Streaming;
        Ok(())
    }

    fn forward(&mut self, buf: &[u8]) -> io::Result<()> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.cipher.xor_key_stream(&mut self.scratch);
        self.inner
            .write_all(&self.scratch)
            .map_err(|err| wrap_io(err, "writing plaintext"))
    }
}

impl<W: Write> Write for DecWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Anything that returns early through `?` leaves the writer `Failed`.
        match mem::replace(&mut self.state, State::Failed) {
            State::Streaming => {
                self.forward(buf)?;
                self.state = State::Streaming;
            }
            State::AwaitingHeader(mut pending) => {
                pending.extend_from_slice(buf);
                if pending.len() < Header::LEN {
                    self.state = State::AwaitingHeader(pending);
                } else {
                    self.accept_header(pending)?;
                }
            }
            State::Rejected => {
                self.state = State::Rejected;
                return Err(Error::InvalidKey.into());
            }
            State::Failed => return Err(poisoned("decrypting writer")),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.state {
            State::Rejected => Err(Error::InvalidKey.into()),
            State::Failed => Err(poisoned("decrypting writer")),
            _ => self
                .inner
                .flush()
                .map_err(|err| wrap_io(err, "flushing plaintext")),
        }
    }
}

impl<W: Write + Close> Close for DecWriter<W> {
    fn close(&mut self) -> io::Result<()> {
        self.check_complete()?;
        self.flush()?;
        self.inner
            .close()
            .map_err(|err| wrap_io(err, "closing plaintext sink"))
    }
}
