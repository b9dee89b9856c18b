//! `atomsig keygen` - Generate an ed25519 key pair in the keyring.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use atomsig_core::{generate_key, write_key_pair};

use super::{load_config, read_passphrase_file, report_error};

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Keyring directory to write the key pair into [default: ATOMSIG_KEYRING_DIR]
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Encrypt the private key with the passphrase in this file
    #[arg(long)]
    pub passphrase_file: Option<PathBuf>,
}

pub fn cmd_keygen(args: KeygenArgs) -> i32 {
    match run_keygen(args) {
        Ok(()) => 0,
        Err(e) => report_error(&e),
    }
}

fn run_keygen(args: KeygenArgs) -> Result<()> {
    let config = load_config(args.out);
    let passphrase = args
        .passphrase_file
        .as_deref()
        .map(read_passphrase_file)
        .transpose()?;

    let key = generate_key(passphrase.as_ref().map(|p| p.as_str()))?;
    let paths = write_key_pair(config.keyring_dir(), &key)?;

    println!("Generated ed25519 keypair:");
    println!(
        "  Private key: {} (PKCS#8 PEM{}, mode 0600)",
        paths.private_key.display(),
        if key.encrypted { ", encrypted" } else { "" }
    );
    println!("  Public key:  {} (SPKI PEM)", paths.public_key.display());
    println!();
    println!("key_id: {}", key.key_id);

    Ok(())
}
