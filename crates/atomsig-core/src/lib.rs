//! Atomic container image signatures.
//!
//! A signature is a cryptographic claim that a manifest digest is reachable
//! under a given image reference. This crate provides:
//!
//! - Manifest digesting, including legacy schema 1 manifests with embedded
//!   JWS signatures
//! - Docker reference canonicalization
//! - The canonical signature payload codec
//! - A pluggable [`SigningMechanism`] with an Ed25519 keyring backend
//! - Sign and verify orchestrators that fail closed
//!
//! # Quick Start
//!
//! ```no_run
//! use atomsig_core::{
//!     sign_docker_manifest, verify_docker_manifest_signature, AtomsigConfig,
//! };
//!
//! # fn example() -> Result<(), atomsig_core::SignatureError> {
//! let config = AtomsigConfig::from_env();
//! let mut keyring = config.open_keyring()?;
//! let key_id = config.resolve_key(None)?;
//!
//! let manifest = std::fs::read("manifest.json").unwrap();
//! let signature = sign_docker_manifest(&manifest, "registry.example/repo:tag", &mut keyring, &key_id)?;
//!
//! let verified = verify_docker_manifest_signature(
//!     &signature,
//!     &manifest,
//!     "registry.example/repo:tag",
//!     &keyring,
//!     &key_id,
//! )?;
//! println!("{} is {}", verified.docker_reference, verified.docker_manifest_digest);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `ATOMSIG_KEYRING_DIR` | Keyring directory (default: `<config dir>/atomsig/keyring`) |
//! | `ATOMSIG_SIGN_BY` | Default signing key identity |

pub mod config;
mod digest;
pub mod error;
pub mod keygen;
pub mod manifest;
pub mod mechanism;
pub mod payload;
pub mod reference;
pub mod sign;
pub mod verify;

// Re-export main types
pub use config::AtomsigConfig;
pub use digest::{DigestAlgorithm, ManifestDigest};
pub use error::{
    CapabilityError, CodecError, DigestError, ReferenceError, SignatureError, SignatureResult,
    SigningError, VerificationError,
};
pub use keygen::{generate_key, write_key_pair, GeneratedKey, KeyPairPaths};
pub use manifest::{compute_digest, guess_schema, matches_digest, ManifestSchema};
pub use mechanism::keyring::{compute_key_id, compute_key_id_from_key};
pub use mechanism::{KeyringMechanism, SignOptions, SignedContent, SigningMechanism};
pub use payload::SignaturePayload;
pub use reference::{canonicalize, DockerReference};
pub use sign::{sign_docker_manifest, sign_docker_manifest_with_options};
pub use verify::{
    verify_docker_manifest_signature, verify_docker_manifest_signature_with_key_identities,
    VerifiedSignature,
};
