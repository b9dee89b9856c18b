//! `atomsig verify` - Verify a manifest signature.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use atomsig_core::{
    verify_docker_manifest_signature, verify_docker_manifest_signature_with_key_identities,
    KeyringMechanism,
};

use super::{load_config, read_file, report_error};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Signature file
    #[arg(long, short)]
    pub signature: PathBuf,

    /// Manifest file
    #[arg(long, short)]
    pub manifest: PathBuf,

    /// Image reference the signature must vouch for
    #[arg(long, short)]
    pub reference: String,

    /// Accepted signer key identity (repeatable)
    #[arg(long = "key", short)]
    pub keys: Vec<String>,

    /// Trust only these public keys (SPKI PEM) instead of the keyring (repeatable)
    #[arg(long = "pubkey")]
    pub pubkeys: Vec<PathBuf>,

    /// Keyring directory [default: ATOMSIG_KEYRING_DIR]
    #[arg(long, conflicts_with = "pubkeys")]
    pub keyring: Option<PathBuf>,

    /// Quiet mode - only exit code, no output
    #[arg(long, short)]
    pub quiet: bool,
}

pub fn cmd_verify(args: VerifyArgs) -> i32 {
    match run_verify(&args) {
        Ok(()) => 0,
        Err(e) if args.quiet => e
            .downcast_ref::<atomsig_core::SignatureError>()
            .map(atomsig_core::SignatureError::exit_code)
            .unwrap_or(1),
        Err(e) => report_error(&e),
    }
}

fn run_verify(args: &VerifyArgs) -> Result<()> {
    let signature = read_file(&args.signature, "signature")?;
    let manifest = read_file(&args.manifest, "manifest")?;

    let (keyring, trusted) = if args.pubkeys.is_empty() {
        if args.keys.is_empty() {
            anyhow::bail!("must specify --key or --pubkey");
        }
        let keyring = load_config(args.keyring.clone()).open_keyring()?;
        (keyring, args.keys.clone())
    } else {
        let pems = args
            .pubkeys
            .iter()
            .map(|path| {
                fs::read_to_string(path)
                    .with_context(|| format!("failed to read public key: {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        let (keyring, imported) = KeyringMechanism::ephemeral(&pems)?;
        let trusted = if args.keys.is_empty() {
            imported
        } else {
            args.keys.clone()
        };
        (keyring, trusted)
    };

    let (verified, signer) = match trusted.as_slice() {
        [key] => {
            let verified = verify_docker_manifest_signature(
                &signature,
                &manifest,
                &args.reference,
                &keyring,
                key,
            )?;
            (verified, key.clone())
        }
        keys => verify_docker_manifest_signature_with_key_identities(
            &signature,
            &manifest,
            &args.reference,
            &keyring,
            keys,
        )?,
    };

    if !args.quiet {
        println!("Verification successful!");
        println!();
        println!("  reference: {}", verified.docker_reference);
        println!("  digest:    {}", verified.docker_manifest_digest);
        println!("  key_id:    {signer}");
    }

    Ok(())
}
