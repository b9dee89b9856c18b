//! `atomsig digest` - Print the digest of a manifest.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use atomsig_core::{compute_digest, guess_schema};

use super::{read_file, report_error};

#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Manifest file
    pub manifest: PathBuf,
}

pub fn cmd_digest(args: DigestArgs) -> i32 {
    match run_digest(&args) {
        Ok(()) => 0,
        Err(e) => report_error(&e),
    }
}

fn run_digest(args: &DigestArgs) -> Result<()> {
    let manifest = read_file(&args.manifest, "manifest")?;
    let digest = compute_digest(&manifest)?;

    println!("{digest}");
    tracing::info!(schema = %guess_schema(&manifest), "manifest schema");
    Ok(())
}
