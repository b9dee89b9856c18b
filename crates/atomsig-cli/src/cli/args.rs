use clap::{Parser, Subcommand};

use super::commands::{digest, keygen, sign, verify};

#[derive(Parser, Debug)]
#[command(
    name = "atomsig",
    version,
    about = "Sign and verify container image manifests"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate an ed25519 signing key in the keyring
    Keygen(keygen::KeygenArgs),

    /// Sign a manifest for an image reference
    Sign(sign::SignArgs),

    /// Verify a manifest signature
    Verify(verify::VerifyArgs),

    /// Print the digest of a manifest
    Digest(digest::DigestArgs),
}
