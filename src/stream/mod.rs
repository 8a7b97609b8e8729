//! Streaming encryption and decryption over `std::io`.
//!
//! Four adapters cover both directions from both ends of a pipe:
//!
//! | type        | wraps   | you feed it | it yields    |
//! |-------------|---------|-------------|--------------|
//! | `EncWriter` | `Write` | plaintext   | container    |
//! | `EncReader` | `Read`  | plaintext   | container    |
//! | `DecWriter` | `Write` | container   | plaintext    |
//! | `DecReader` | `Read`  | container   | plaintext    |
//!
//! All of them can be driven with arbitrarily sized reads and writes; the
//! output is the same as for a single call over the whole input.

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Sink, Stdout, Write};

pub mod reader;
pub mod writer;

pub use reader::{DecReader, EncReader};
pub use writer::{DecWriter, EncWriter};

/// Writers that have to be finished explicitly.
///
/// Closing an outer writer completes its own work (for example emitting a
/// header that was never written) and then closes the writer it wraps, so a
/// whole chain is closed by closing its outermost element.
///
/// `close` should be called once. After an error the state of the writer is
/// unspecified and it must not be used any further.
pub trait Close {
    fn close(&mut self) -> io::Result<()>;
}

/// Error returned by an adapter that already failed once.
pub(crate) fn poisoned(what: &str) -> io::Error {
    io::Error::other(format!("{what} failed earlier and cannot be used any more"))
}

impl<T: Close + ?Sized> Close for &mut T {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<T: Close + ?Sized> Close for Box<T> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl Close for Vec<u8> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for Cursor<Vec<u8>> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for Cursor<&mut Vec<u8>> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for Sink {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for Stdout {
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Flushes and syncs file contents to disk.
impl Close for File {
    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl<W: Write + Close> Close for BufWriter<W> {
    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_mut().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        closed: usize,
    }

    impl Write for Counting {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Close for Counting {
        fn close(&mut self) -> io::Result<()> {
            self.closed += 1;
            Ok(())
        }
    }

    #[test]
    fn bufwriter_close_reaches_inner() {
        let mut w = BufWriter::new(Counting { closed: 0 });
        w.write_all(b"data").unwrap();
        w.close().unwrap();

        assert_eq!(w.get_ref().closed, 1);
    }

    #[test]
    fn mut_ref_close_forwards() {
        let mut inner = Counting { closed: 0 };
        let mut r = &mut inner;
        Close::close(&mut r).unwrap();

        assert_eq!(inner.closed, 1);
    }
}
