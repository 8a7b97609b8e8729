use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const ENV_PASSWORD: &str = "SEALSTREAM_PASSWORD";
pub const ENV_NEW_PASSWORD: &str = "SEALSTREAM_NEW_PASSWORD";

pub fn read_password() -> Result<Zeroizing<String>> {
    //  Environment Variable
    //  SEALSTREAM_PASSWORD="supersecret" sealstream decrypt a.sls a.txt
    if let Some(pw) = from_env(ENV_PASSWORD) {
        return Ok(pw);
    }

    //  stdin (Pipeline)
    //  echo "supersecret" | sealstream decrypt a.sls a.txt
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().lock().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() {
        let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("no password provided")
}

/// Reads the password to re-key with.
///
/// Taken from `SEALSTREAM_NEW_PASSWORD` if set. Otherwise two lines are read
/// (from the pipe or as a confirmed prompt) and must match.
pub fn read_new_password_with_confirmation() -> Result<Zeroizing<String>> {
    if let Some(pw) = from_env(ENV_NEW_PASSWORD) {
        return Ok(pw);
    }

    if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut pw1 = Zeroizing::new(String::new());
        let mut pw2 = Zeroizing::new(String::new());

        handle.read_line(&mut pw1)?;
        handle.read_line(&mut pw2)?;

        trim_newline(&mut pw1);
        trim_newline(&mut pw2);

        return confirm(pw1, &pw2);
    }

    let pw1 = Zeroizing::new(rpassword::prompt_password("New password: ")?);
    let pw2 = Zeroizing::new(rpassword::prompt_password("Confirm password: ")?);

    confirm(pw1, &pw2)
}

fn from_env(name: &str) -> Option<Zeroizing<String>> {
    std::env::var(name)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

fn confirm(pw1: Zeroizing<String>, pw2: &str) -> Result<Zeroizing<String>> {
    if pw1.is_empty() {
        bail!("password cannot be empty");
    }

    if pw1.as_str() != pw2 {
        bail!("passwords do not match");
    }

    Ok(pw1)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_newline_strips_crlf_only() {
        let mut s = String::from("pw with space \r\n");
        trim_newline(&mut s);
        assert_eq!(s, "pw with space ");
    }

    #[test]
    fn confirm_rejects_mismatch_and_empty() {
        assert!(confirm(Zeroizing::new("a".into()), "a").is_ok());
        assert!(confirm(Zeroizing::new("a".into()), "b").is_err());
        assert!(confirm(Zeroizing::new(String::new()), "").is_err());
    }
}
