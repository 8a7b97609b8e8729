use sealstream::{
    Close, DecReader, DecWriter, EncReader, EncWriter, Error, Header, decrypt, decrypt_file,
    decrypt_file_chunks, encrypt, encrypt_file, is_encrypted, is_encrypted_file, re_encrypt_file,
};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use tempfile::tempdir;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    getrandom::fill(&mut buf).unwrap();
    buf
}

#[test]
fn hello123_scenario() {
    let payload = b"0123456789abcdefghij";
    assert_eq!(payload.len(), 20);

    let sealed = encrypt(payload, "hello123").unwrap();

    assert_eq!(sealed.len(), 40);
    assert!(is_encrypted(&sealed));
    assert_eq!(decrypt(&sealed, "hello123").unwrap(), payload);
    assert!(decrypt(&sealed, "hello124").unwrap_err().is_invalid_key());
}

#[test]
fn roundtrip_sizes() {
    for len in [0, 1, 19, 20, 21, 4096, 3 * 1024 * 1024 + 7] {
        let plain = random_bytes(len);
        let sealed = encrypt(&plain, "pw").unwrap();

        assert_eq!(sealed.len(), Header::LEN + len, "len {len}");
        assert_eq!(decrypt(&sealed, "pw").unwrap(), plain, "len {len}");
    }
}

#[test]
fn random_data_is_not_detected_as_encrypted() {
    for _ in 0..16 {
        assert!(!is_encrypted(&random_bytes(1024)));
    }
    assert!(!is_encrypted(b""));
}

#[test]
fn byte_at_a_time_matches_single_call() {
    let plain = random_bytes(10_000);
    let expected = encrypt(&plain, "pw").unwrap();

    let mut enc = EncWriter::new(Vec::new(), "pw");
    for b in &plain {
        enc.write_all(&[*b]).unwrap();
    }
    let sealed = enc.finish().unwrap();
    assert_eq!(sealed, expected);

    let mut dec = DecWriter::new(Vec::new(), "pw");
    for b in &sealed {
        dec.write_all(&[*b]).unwrap();
    }
    assert_eq!(dec.finish().unwrap(), plain);
}

#[test]
fn io_copy_matches_buffer_api() {
    let plain = random_bytes(200_000);
    let expected = encrypt(&plain, "pw").unwrap();

    let mut sealed = Vec::new();
    io::copy(&mut EncReader::new(&plain[..], "pw"), &mut sealed).unwrap();
    assert_eq!(sealed, expected);

    let mut opened = Vec::new();
    io::copy(&mut DecReader::new(&sealed[..], "pw"), &mut opened).unwrap();
    assert_eq!(opened, decrypt(&expected, "pw").unwrap());

    let mut via_writer = Vec::new();
    {
        let mut dec = DecWriter::new(&mut via_writer, "pw");
        io::copy(&mut &sealed[..], &mut dec).unwrap();
        dec.close().unwrap();
    }
    assert_eq!(via_writer, plain);
}

#[test]
fn wrong_password_yields_no_plaintext() {
    let sealed = encrypt(b"top secret", "right").unwrap();

    let mut out = Vec::new();
    let err = DecReader::new(&sealed[..], "wrong")
        .read_to_end(&mut out)
        .unwrap_err();
    assert!(sealstream::error::is_invalid_key(&err));
    assert!(out.is_empty());

    let mut sink = Vec::new();
    {
        let mut dec = DecWriter::new(&mut sink, "wrong");
        assert!(dec.write_all(&sealed).is_err());
    }
    assert!(sink.is_empty());
}

#[test]
fn large_payload_buffer_and_file_paths_agree() {
    let dir = tempdir().unwrap();
    let plain_path = dir.path().join("big.bin");
    let sealed_path = dir.path().join("big.sls");
    let out_path = dir.path().join("big.out");

    let plain = random_bytes(32 * 1024 * 1024);
    fs::write(&plain_path, &plain).unwrap();

    let sealed = encrypt(&plain, "pw").unwrap();
    encrypt_file(&plain_path, &sealed_path, "pw").unwrap();
    assert!(fs::read(&sealed_path).unwrap() == sealed);

    decrypt_file(&sealed_path, &out_path, "pw").unwrap();
    assert!(fs::read(&out_path).unwrap() == plain);
    assert!(decrypt(&sealed, "pw").unwrap() == plain);
}

#[test]
fn rekeyed_file_opens_with_new_password_only() {
    let dir = tempdir().unwrap();
    let plain_path = dir.path().join("plain");
    let sealed_path = dir.path().join("sealed");
    let rekeyed_path = dir.path().join("rekeyed");
    let out_path = dir.path().join("out");
    let plain = random_bytes(5000);
    fs::write(&plain_path, &plain).unwrap();

    encrypt_file(&plain_path, &sealed_path, "old").unwrap();
    re_encrypt_file(&sealed_path, &rekeyed_path, "old", "new").unwrap();

    decrypt_file(&rekeyed_path, &out_path, "new").unwrap();
    assert_eq!(fs::read(&out_path).unwrap(), plain);
    assert!(
        decrypt_file(&rekeyed_path, &out_path, "old")
            .unwrap_err()
            .is_invalid_key()
    );
}

#[test]
fn chunked_decrypt_rebuilds_the_whole() {
    let dir = tempdir().unwrap();
    let plain = random_bytes(30_000);

    let mut chunks = Vec::new();
    for (i, part) in plain.chunks(12_000).enumerate() {
        let chunk = dir.path().join(format!("chunk{i}.sls"));
        fs::write(&chunk, encrypt(part, "pw").unwrap()).unwrap();
        chunks.push(chunk);
    }
    assert_eq!(chunks.len(), 3);

    let out = dir.path().join("joined");
    assert_eq!(decrypt_file_chunks(&chunks, &out, "pw").unwrap(), 30_000);
    assert_eq!(fs::read(&out).unwrap(), plain);
}

#[test]
fn chunked_decrypt_without_first_chunk_produces_nothing() {
    let dir = tempdir().unwrap();
    let second = dir.path().join("chunk1.sls");
    fs::write(&second, encrypt(b"second", "pw").unwrap()).unwrap();
    let out = dir.path().join("joined");

    let chunks = [dir.path().join("chunk0.sls"), second];
    let err = decrypt_file_chunks(&chunks, &out, "pw").unwrap_err();

    assert!(matches!(err, Error::Io { .. }));
    assert!(!out.exists());
}

#[test]
fn seekable_file_reader() {
    let dir = tempdir().unwrap();
    let plain_path = dir.path().join("plain");
    let sealed_path = dir.path().join("sealed");
    let plain = random_bytes(64 * 1024);
    fs::write(&plain_path, &plain).unwrap();
    encrypt_file(&plain_path, &sealed_path, "pw").unwrap();
    assert!(is_encrypted_file(&sealed_path));

    let mut reader = DecReader::new(BufReader::new(File::open(&sealed_path).unwrap()), "pw");
    for offset in [40_000u64, 17, 65_000, 0] {
        reader.seek(SeekFrom::Start(offset)).unwrap();
        let mut buf = [0u8; 100];
        let n = reader.read(&mut buf).unwrap();
        let start = offset as usize;
        assert_eq!(&buf[..n], &plain[start..start + n], "offset {offset}");
    }

    let end = reader.seek(SeekFrom::End(0)).unwrap();
    assert_eq!(end, plain.len() as u64);
}
