//! Subcommand implementations.
//!
//! Each command returns a process exit code. Library errors map through
//! [`SignatureError::exit_code`]; anything else (I/O, bad arguments) is 1.

pub mod digest;
pub mod keygen;
pub mod sign;
pub mod verify;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atomsig_core::{AtomsigConfig, SignatureError};
use zeroize::Zeroizing;

use super::args::{Cli, Command};

pub fn dispatch(cli: Cli) -> i32 {
    match cli.cmd {
        Command::Keygen(args) => keygen::cmd_keygen(args),
        Command::Sign(args) => sign::cmd_sign(args),
        Command::Verify(args) => verify::cmd_verify(args),
        Command::Digest(args) => digest::cmd_digest(args),
    }
}

/// Print `e` and pick the exit code for it.
pub(crate) fn report_error(e: &anyhow::Error) -> i32 {
    eprintln!("error: {e:#}");
    e.downcast_ref::<SignatureError>()
        .map(SignatureError::exit_code)
        .unwrap_or(1)
}

/// Read a passphrase file. One trailing line terminator is not part of the
/// passphrase; anything else is passed through untouched.
pub(crate) fn read_passphrase_file(path: &Path) -> Result<Zeroizing<String>> {
    let mut contents = Zeroizing::new(
        fs::read_to_string(path)
            .with_context(|| format!("failed to read passphrase file: {}", path.display()))?,
    );
    if contents.ends_with("\r\n") {
        let len = contents.len() - 2;
        contents.truncate(len);
    } else if contents.ends_with('\n') {
        let len = contents.len() - 1;
        contents.truncate(len);
    }
    Ok(contents)
}

/// Configuration with command-line overrides applied.
pub(crate) fn load_config(keyring: Option<PathBuf>) -> AtomsigConfig {
    let config = AtomsigConfig::from_env();
    match keyring {
        Some(dir) => config.with_keyring_dir(dir),
        None => config,
    }
}

pub(crate) fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {what}: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_file_strips_one_line_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("secret", "secret"),
            ("secret\n", "secret"),
            ("secret\r\n", "secret"),
            ("secret\n\n", "secret\n"),
            ("", ""),
        ];
        for (i, (contents, expected)) in cases.iter().enumerate() {
            let path = dir.path().join(format!("pass{i}"));
            fs::write(&path, contents).unwrap();
            assert_eq!(read_passphrase_file(&path).unwrap().as_str(), *expected);
        }
    }

    #[test]
    fn test_report_error_uses_library_exit_code() {
        let err: anyhow::Error = SignatureError::Verification(
            atomsig_core::VerificationError::CorruptSignature {
                reason: "bad".to_string(),
            },
        )
        .into();
        assert_eq!(report_error(&err), 4);

        let err = anyhow::Error::new(SignatureError::Config {
            message: "x".to_string(),
        })
        .context("while signing");
        assert_eq!(report_error(&err), 1);

        assert_eq!(report_error(&anyhow::anyhow!("plain failure")), 1);
    }
}
