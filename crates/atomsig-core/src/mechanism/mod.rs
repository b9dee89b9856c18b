//! Signing mechanisms.
//!
//! The orchestrators never touch key material. They hand the payload bytes to
//! a [`SigningMechanism`], which owns whatever backend session it needs
//! (an unlocked keyring, an agent connection) and turns them into opaque wire
//! bytes, or recovers the content and signer identity from wire bytes.
//!
//! A mechanism is a scoped resource: it is released by [`SigningMechanism::close`]
//! or on drop, whichever comes first. Instances are not meant to be shared
//! between concurrent callers; `sign` takes `&mut self` for that reason.

pub mod envelope;
pub mod keyring;

use chrono::{DateTime, Utc};

use crate::error::{CapabilityError, SigningError, VerificationError};

pub use keyring::KeyringMechanism;

/// Content recovered from verified wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedContent {
    /// The signed bytes.
    pub content: Vec<u8>,

    /// Identity of the key that actually produced the signature.
    pub signer: String,
}

/// Options for a single signing call.
#[derive(Clone, Default)]
pub struct SignOptions {
    /// Passphrase for unlocking a protected key. When absent, the mechanism
    /// falls back to whatever keys it already has unlocked.
    pub passphrase: Option<String>,

    /// Signing time recorded in the payload's optional section.
    pub timestamp: Option<DateTime<Utc>>,
}

impl SignOptions {
    /// Set the passphrase.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Record a signing time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl std::fmt::Debug for SignOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignOptions")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// A cryptographic backend that signs and verifies opaque blobs.
///
/// Backends are picked at construction time; the orchestrators only see this
/// trait.
pub trait SigningMechanism {
    /// Cheap probe: can this instance sign at all?
    ///
    /// `Err` means "skip signing", not "abort".
    fn supports_signing(&self) -> Result<(), CapabilityError>;

    /// Sign `payload` with the key named by `key_identity`.
    ///
    /// # Returns
    ///
    /// - `Ok(wire)` with opaque signature bytes
    /// - `Err(SigningError::KeyNotFound)` if no such key is usable
    /// - `Err(SigningError::PassphraseRequired)` if the key is locked and no passphrase was given
    /// - `Err(SigningError::PassphraseMalformed)` if the passphrase cannot be used verbatim
    /// - `Err(SigningError::PassphraseWrong)` if the passphrase does not unlock the key
    /// - `Err(SigningError::Backend)` for anything else
    fn sign(
        &mut self,
        payload: &[u8],
        key_identity: &str,
        options: &SignOptions,
    ) -> Result<Vec<u8>, SigningError>;

    /// Check `wire` and recover the signed content and signer identity.
    ///
    /// Never succeeds on corrupt, truncated or tampered bytes. The returned
    /// signer is the key that actually produced the signature; comparing it
    /// with the expected key is the caller's job.
    fn verify(&self, wire: &[u8]) -> Result<SignedContent, VerificationError>;

    /// Release backend resources. Idempotent.
    fn close(&mut self);
}

/// Reject passphrases that cannot be passed to a key unlock verbatim.
pub fn validate_passphrase(passphrase: &str) -> Result<(), SigningError> {
    if passphrase.contains(['\n', '\r']) {
        return Err(SigningError::PassphraseMalformed {
            reason: "passphrase must not contain a line break".to_string(),
        });
    }
    Ok(())
}
