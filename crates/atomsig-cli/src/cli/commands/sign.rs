//! `atomsig sign` - Sign a manifest for an image reference.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use atomsig_core::{sign_docker_manifest_with_options, SignOptions, SigningMechanism};
use tracing::warn;

use super::{load_config, read_file, read_passphrase_file, report_error};

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Manifest file
    #[arg(long, short)]
    pub manifest: PathBuf,

    /// Image reference the signature vouches for
    #[arg(long, short)]
    pub reference: String,

    /// Key identity to sign with [default: ATOMSIG_SIGN_BY]
    #[arg(long)]
    pub sign_by: Option<String>,

    /// Keyring directory [default: ATOMSIG_KEYRING_DIR]
    #[arg(long)]
    pub keyring: Option<PathBuf>,

    /// Passphrase for a protected key
    #[arg(long)]
    pub passphrase_file: Option<PathBuf>,

    /// Record the signing time in the signature
    #[arg(long)]
    pub timestamp: bool,

    /// Output file for the signature
    #[arg(long, short)]
    pub output: PathBuf,
}

pub fn cmd_sign(args: SignArgs) -> i32 {
    match run_sign(args) {
        Ok(()) => 0,
        Err(e) => report_error(&e),
    }
}

fn run_sign(args: SignArgs) -> Result<()> {
    let config = load_config(args.keyring);
    let key_identity = config.resolve_key(args.sign_by.as_deref())?;
    let manifest = read_file(&args.manifest, "manifest")?;

    let mut options = SignOptions::default();
    if let Some(path) = &args.passphrase_file {
        options = options.with_passphrase(read_passphrase_file(path)?.as_str());
    }
    if args.timestamp {
        options = options.with_timestamp(chrono::Utc::now());
    }

    let mut keyring = config.open_keyring()?;
    let signature = sign_if_supported(
        &mut keyring,
        &manifest,
        &args.reference,
        &key_identity,
        &options,
    )?;
    keyring.close();

    let Some(signature) = signature else {
        println!("Signing skipped: keyring cannot sign");
        return Ok(());
    };

    fs::write(&args.output, &signature)
        .with_context(|| format!("failed to write signature: {}", args.output.display()))?;

    println!("Signed manifest:");
    println!("  Manifest:  {}", args.manifest.display());
    println!("  Signature: {}", args.output.display());
    println!("  key_id:    {key_identity}");

    Ok(())
}

/// Sign unless the mechanism reports it cannot sign at all, in which case
/// signing is skipped with a warning.
fn sign_if_supported<M: SigningMechanism + ?Sized>(
    mechanism: &mut M,
    manifest: &[u8],
    reference: &str,
    key_identity: &str,
    options: &SignOptions,
) -> Result<Option<Vec<u8>>> {
    if let Err(e) = mechanism.supports_signing() {
        warn!(error = %e, "skipping signature");
        return Ok(None);
    }

    let signature =
        sign_docker_manifest_with_options(manifest, reference, mechanism, key_identity, options)?;
    Ok(Some(signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomsig_core::{generate_key, KeyringMechanism, SignatureError};

    const MANIFEST: &[u8] = br#"{"schemaVersion": 2}"#;

    #[test]
    fn test_verify_only_keyring_skips_signing() {
        let key = generate_key(None).unwrap();
        let (mut keyring, ids) = KeyringMechanism::ephemeral(&[key.public_pem]).unwrap();

        let signature = sign_if_supported(
            &mut keyring,
            MANIFEST,
            "example.com/x",
            &ids[0],
            &SignOptions::default(),
        )
        .unwrap();
        assert!(signature.is_none());
    }

    #[test]
    fn test_signing_errors_still_abort() {
        let mut keyring = KeyringMechanism::in_memory();
        let err = sign_if_supported(
            &mut keyring,
            MANIFEST,
            "example.com/x",
            "sha256:missing",
            &SignOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SignatureError>(),
            Some(SignatureError::Signing(_))
        ));
    }

    #[test]
    fn test_signs_when_supported() {
        let dir = tempfile::tempdir().unwrap();
        let key = generate_key(None).unwrap();
        atomsig_core::write_key_pair(dir.path(), &key).unwrap();
        let mut keyring = KeyringMechanism::open(dir.path()).unwrap();

        let signature = sign_if_supported(
            &mut keyring,
            MANIFEST,
            "example.com/x",
            &key.key_id,
            &SignOptions::default(),
        )
        .unwrap();
        assert!(signature.is_some());
    }
}
