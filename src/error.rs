use std::io;
use thiserror::Error;

/// Errors produced while sealing or opening a stream.
#[derive(Debug, Error)]
pub enum Error {
    /// The password does not match the key hash stored in the header,
    /// or the input does not start with the format's magic number.
    #[error("invalid key: wrong password or not a sealstream container")]
    InvalidKey,

    /// The input is too short to hold a header, or is otherwise unusable.
    #[error("malformed container: {0}")]
    Malformed(String),

    /// Failure of the underlying source, sink or file system.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Converts an `io::Error` coming out of a reader or writer chain.
    ///
    /// Stream types report [`Error::InvalidKey`] and [`Error::Malformed`]
    /// through `std::io`, so those are unwrapped back into the crate error
    /// instead of being buried under another layer of context.
    pub fn from_io(err: io::Error, context: impl Into<String>) -> Self {
        match err.downcast::<Error>() {
            Ok(own) => own,
            Err(err) => Self::io(context, err),
        }
    }

    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey)
    }
}

/// Returns `true` if an `io::Error` raised by a stream carries [`Error::InvalidKey`].
pub fn is_invalid_key(err: &io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<Error>())
        .is_some_and(Error::is_invalid_key)
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidKey => io::Error::new(io::ErrorKind::InvalidData, Error::InvalidKey),
            Error::Malformed(msg) => {
                io::Error::new(io::ErrorKind::UnexpectedEof, Error::Malformed(msg))
            }
            Error::Io { context, source } => {
                io::Error::new(source.kind(), Error::Io { context, source })
            }
        }
    }
}

/// Adds context to an `io::Error` while keeping its kind.
///
/// Errors that already carry a crate [`Error`] pass through untouched so an
/// `InvalidKey` raised further down a writer chain stays recognisable.
pub(crate) fn wrap_io(err: io::Error, context: &str) -> io::Error {
    if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        return err;
    }
    io::Error::new(err.kind(), Error::io(context, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_survives_io_round_trip() {
        let io_err: io::Error = Error::InvalidKey.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(is_invalid_key(&io_err));

        let back = Error::from_io(io_err, "decrypting");
        assert!(back.is_invalid_key());
    }

    #[test]
    fn malformed_maps_to_unexpected_eof() {
        let io_err: io::Error = Error::malformed("short header").into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!is_invalid_key(&io_err));

        match Error::from_io(io_err, "reading") {
            Error::Malformed(msg) => assert_eq!(msg, "short header"),
            other => panic!("expected Malformed, got: {other:?}"),
        }
    }

    #[test]
    fn plain_io_errors_get_context() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = Error::from_io(io_err, "opening a.bin");
        assert!(!err.is_invalid_key());
        assert_eq!(err.to_string(), "opening a.bin");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "gone");
    }

    #[test]
    fn foreign_payload_is_wrapped_not_unwrapped() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "locked");
        match Error::from_io(io_err, "opening b.bin") {
            Error::Io { context, source } => {
                assert_eq!(context, "opening b.bin");
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
                assert_eq!(source.to_string(), "locked");
            }
            other => panic!("expected Io, got: {other:?}"),
        }
    }

    #[test]
    fn wrapped_io_keeps_kind() {
        let err = wrap_io(io::Error::from(io::ErrorKind::BrokenPipe), "writing ciphertext");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(err.to_string().starts_with("writing ciphertext"));
    }

    #[test]
    fn wrap_io_does_not_bury_invalid_key() {
        let err = wrap_io(Error::InvalidKey.into(), "writing plaintext");
        assert!(is_invalid_key(&err));
    }
}
