//! Whole-file encryption, decryption and re-keying.
//!
//! Every operation streams through the reader and writer adapters, so file
//! size is not limited by memory. Errors name the operation and the path.

use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::crypto::{Header, is_encrypted, validate_password};
use crate::error::{Error, Result};
use crate::stream::{Close, DecReader, EncWriter};

/// Encrypts `src` into `dst`, replacing `dst` if it exists.
///
/// The container is written to a temporary file next to `dst` and moved
/// over it once complete, so `src` and `dst` may be the same path.
///
/// Returns the number of plaintext bytes processed.
pub fn encrypt_file(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    password: &str,
) -> Result<u64> {
    let (src, dst) = (src.as_ref(), dst.as_ref());

    let input = open(src)?;
    let n = replace_atomically(dst, move |tmp_file, tmp_path| {
        let mut writer = EncWriter::new(BufWriter::new(tmp_file), password);
        copy_and_close(&mut BufReader::new(input), &mut writer, tmp_path)
    })?;

    info!(src = %src.display(), dst = %dst.display(), bytes = n, "encrypted file");
    Ok(n)
}

/// Decrypts `src` into `dst`, replacing `dst` if it exists.
///
/// The password is checked against the header of `src` before anything is
/// written, so a wrong password leaves no output behind. Like
/// [`encrypt_file`], the output goes through a temporary file and `src`
/// and `dst` may be the same path.
///
/// Returns the number of plaintext bytes written.
pub fn decrypt_file(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    password: &str,
) -> Result<u64> {
    let (src, dst) = (src.as_ref(), dst.as_ref());

    let mut reader = open_verified(src, password)?;
    let n = replace_atomically(dst, move |tmp_file, tmp_path| {
        copy_and_close(&mut reader, &mut BufWriter::new(tmp_file), tmp_path)
    })?;

    info!(src = %src.display(), dst = %dst.display(), bytes = n, "decrypted file");
    Ok(n)
}

/// Decrypts independently encrypted chunks, in order, into a single file.
///
/// The first chunk goes through [`decrypt_file`] and creates `dst`; every
/// following chunk is verified and appended. The operation is not atomic:
/// if a later chunk fails, `dst` keeps the chunks processed so far.
///
/// # Errors
///
/// [`Error::Malformed`] if `chunks` is empty, an `InvalidInput` I/O error if
/// `dst` is one of the chunks, otherwise whatever the first failing chunk
/// reports.
pub fn decrypt_file_chunks<P: AsRef<Path>>(
    chunks: &[P],
    dst: impl AsRef<Path>,
    password: &str,
) -> Result<u64> {
    let dst = dst.as_ref();
    let Some((first, rest)) = chunks.split_first() else {
        return Err(Error::malformed("no chunks to decrypt"));
    };
    for chunk in chunks {
        let chunk = chunk.as_ref();
        if same_file(chunk, dst) {
            return Err(Error::io(
                format!("{} is both a chunk and the output", chunk.display()),
                io::Error::from(io::ErrorKind::InvalidInput),
            ));
        }
    }

    let mut total = decrypt_file(first, dst, password)?;

    for (index, chunk) in rest.iter().enumerate() {
        let chunk = chunk.as_ref();
        let mut reader = open_verified(chunk, password)?;
        let output = OpenOptions::new()
            .append(true)
            .open(dst)
            .map_err(|err| Error::io(format!("opening {} for append", dst.display()), err))?;

        let n = copy_and_close(&mut reader, &mut BufWriter::new(output), dst)?;
        debug!(chunk = %chunk.display(), index = index + 1, bytes = n, "appended chunk");
        total += n;
    }

    info!(chunks = chunks.len(), dst = %dst.display(), bytes = total, "decrypted chunks");
    Ok(total)
}

/// Re-encrypts `src` under `new_password` and stores the result at `dst`.
///
/// `old_password` is checked before anything is written. The new container
/// is built in a temporary file next to `dst` and moved over it only once
/// complete, so `src` and `dst` may be the same path.
pub fn re_encrypt_file(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    old_password: &str,
    new_password: &str,
) -> Result<u64> {
    let (src, dst) = (src.as_ref(), dst.as_ref());

    let mut reader = open_verified(src, old_password)?;
    let n = replace_atomically(dst, move |tmp_file, tmp_path| {
        let mut writer = EncWriter::new(BufWriter::new(tmp_file), new_password);
        copy_and_close(&mut reader, &mut writer, tmp_path)
    })?;

    info!(src = %src.display(), dst = %dst.display(), bytes = n, "re-encrypted file");
    Ok(n)
}

/// Does the file at `path` start with a container header?
///
/// Reads at most one header worth of bytes. Any I/O failure, including a
/// missing file, counts as "no".
pub fn is_encrypted_file(path: impl AsRef<Path>) -> bool {
    match read_prefix(path.as_ref()) {
        Ok(prefix) => is_encrypted(&prefix),
        Err(err) => {
            debug!(path = %path.as_ref().display(), error = %err, "header check failed");
            false
        }
    }
}

/// Checks `password` against the header of the file at `path`.
///
/// A file too short to hold a header, or without the magic number, yields
/// `Ok(false)`. Only I/O failures are errors.
pub fn validate_file_password(path: impl AsRef<Path>, password: &str) -> Result<bool> {
    let path = path.as_ref();
    let prefix = read_prefix(path)
        .map_err(|err| Error::io(format!("reading header of {}", path.display()), err))?;
    Ok(validate_password(&prefix, password))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| Error::io(format!("opening {}", path.display()), err))
}

/// `true` if both paths resolve to the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Builds a new `target` in a sibling temporary file and moves it into place.
///
/// `fill` owns everything it captures, so the source it reads from is closed
/// before `target` is replaced. On failure the temporary file is removed and
/// `target` is left as it was.
fn replace_atomically<F>(target: &Path, fill: F) -> Result<u64>
where
    F: FnOnce(File, &Path) -> Result<u64>,
{
    let tmp_path = random_tmp_path(target)?;
    let tmp_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|err| Error::io(format!("creating {}", tmp_path.display()), err))?;

    let n = match fill(tmp_file, &tmp_path) {
        Ok(n) => n,
        Err(err) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
    };

    if let Err(err) = atomic_replace(&tmp_path, target) {
        warn!(tmp = %tmp_path.display(), "atomic replace failed, removing temporary file");
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    sync_parent(target)?;
    Ok(n)
}

fn read_prefix(path: &Path) -> io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(Header::LEN);
    File::open(path)?
        .take(Header::LEN as u64)
        .read_to_end(&mut prefix)?;
    Ok(prefix)
}

/// Opens `path` for decryption and checks its header straight away.
fn open_verified(path: &Path, password: &str) -> Result<DecReader<BufReader<File>>> {
    let input = open(path)?;
    let mut reader = DecReader::new(BufReader::new(input), password);
    reader
        .verify()
        .map_err(|err| Error::from_io(err, format!("reading header of {}", path.display())))?;
    Ok(reader)
}

fn copy_and_close<R: Read, W: Write + Close>(
    reader: &mut R,
    writer: &mut W,
    dst: &Path,
) -> Result<u64> {
    let n = io::copy(reader, writer)
        .map_err(|err| Error::from_io(err, format!("writing {}", dst.display())))?;
    writer
        .close()
        .map_err(|err| Error::from_io(err, format!("closing {}", dst.display())))?;
    Ok(n)
}

/// `<file name>.tmp.<16 hex digits>` in the directory of `path`.
fn random_tmp_path(path: &Path) -> Result<PathBuf> {
    let mut buf = [0u8; 8];
    fill(&mut buf).map_err(|err| {
        Error::io("generating temporary file name", io::Error::other(err.to_string()))
    })?;
    let suffix: String = buf.iter().map(|b| format!("{b:02x}")).collect();

    let file_name = path.file_name().ok_or_else(|| {
        Error::io(
            format!("{} does not name a file", path.display()),
            io::Error::from(io::ErrorKind::InvalidInput),
        )
    })?;

    Ok(path.with_file_name(format!("{}.tmp.{suffix}", file_name.to_string_lossy())))
}

#[cfg(target_os = "windows")]
fn atomic_replace(tmp_path: &Path, target: &Path) -> Result<()> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

    fn to_wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(std::iter::once(0)).collect()
    }

    // ReplaceFileW needs an existing target.
    if !target.exists() {
        return fs::rename(tmp_path, target)
            .map_err(|err| Error::io(format!("moving into {}", target.display()), err));
    }

    let target_w = to_wide(target.as_os_str());
    let tmp_w = to_wide(tmp_path.as_os_str());

    // SAFETY: both buffers are NUL-terminated UTF-16 and outlive the call;
    // Windows keeps no reference to them afterwards.
    let result = unsafe {
        ReplaceFileW(
            target_w.as_ptr(),
            tmp_w.as_ptr(),
            std::ptr::null(),
            REPLACEFILE_WRITE_THROUGH,
            std::ptr::null(),
            std::ptr::null(),
        )
    };

    if result == 0 {
        return Err(Error::io(
            format!("replacing {}", target.display()),
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

/// `rename()` is atomic on one filesystem, and the temporary file always
/// sits next to its target.
#[cfg(not(target_os = "windows"))]
fn atomic_replace(tmp_path: &Path, target: &Path) -> Result<()> {
    fs::rename(tmp_path, target)
        .map_err(|err| Error::io(format!("moving into {}", target.display()), err))
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|err| Error::io(format!("syncing {}", parent.display()), err))
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}
