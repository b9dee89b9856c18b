//! Error types for signing and verification.
//!
//! Every failure is surfaced to the immediate caller with its kind intact;
//! nothing here is retried or swallowed. The top-level [`SignatureError`]
//! wraps the per-concern enums so callers can match on the kind they care
//! about (for example, to re-prompt on [`SigningError::PassphraseWrong`]).

/// Malformed or empty reference string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// Empty reference.
    #[error("invalid reference: empty reference")]
    Empty,

    /// Repository name contains uppercase characters.
    #[error("invalid reference {reference:?}: repository name must be lowercase")]
    Uppercase { reference: String },

    /// Bare 64-character hexadecimal identifier used as a name.
    #[error("invalid reference {reference:?}: cannot specify 64-byte hexadecimal strings")]
    HexIdentifier { reference: String },

    /// Repository name longer than the grammar allows.
    #[error("invalid reference {reference:?}: repository name must not be more than {max} characters")]
    NameTooLong { reference: String, max: usize },

    /// Reference does not match the naming grammar.
    #[error("invalid reference {reference:?}: {reason}")]
    InvalidFormat { reference: String, reason: String },

    /// Reference carries an unusable `@digest` part.
    #[error("invalid reference {reference:?}: {source}")]
    InvalidDigest {
        reference: String,
        #[source]
        source: DigestError,
    },
}

/// Manifest cannot be digested, or a digest string is unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// Manifest structure is invalid for its detected schema.
    #[error("malformed manifest: {reason}")]
    MalformedManifest { reason: String },

    /// Digest algorithm is not supported.
    #[error("unsupported digest algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Digest string is not `<algorithm>:<hex>`.
    #[error("invalid digest {digest:?}: {reason}")]
    InvalidFormat { digest: String, reason: String },
}

/// Malformed or type-mismatched signature payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Payload bytes are not a structurally valid signature payload.
    #[error("malformed payload: {reason}")]
    Malformed { reason: String },

    /// Payload type tag is not the expected constant.
    #[error("unexpected payload type: expected {expected:?}, got {got:?}")]
    UnexpectedType { expected: String, got: String },

    /// Payload could not be serialized.
    #[error("payload encoding failed: {reason}")]
    Encode { reason: String },
}

/// The mechanism cannot sign at all.
///
/// Callers treat this as "skip signing", not as a fatal condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("signing not supported: {reason}")]
pub struct CapabilityError {
    pub reason: String,
}

/// Failure while producing a signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// No usable key for the requested identity.
    #[error("signing key not found: {key_identity}")]
    KeyNotFound { key_identity: String },

    /// Key is passphrase-protected and no passphrase (or cached unlock) is available.
    #[error("passphrase required to unlock key {key_identity}")]
    PassphraseRequired { key_identity: String },

    /// Passphrase is not acceptable input (e.g. contains a line break).
    #[error("invalid passphrase: {reason}")]
    PassphraseMalformed { reason: String },

    /// Passphrase did not unlock the key.
    #[error("wrong passphrase for key {key_identity}")]
    PassphraseWrong { key_identity: String },

    /// Any other backend failure.
    #[error("signing backend failure: {reason}")]
    Backend { reason: String },
}

/// A signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Wire bytes are corrupt, truncated, or the cryptographic check failed.
    #[error("corrupt signature: {reason}")]
    CorruptSignature { reason: String },

    /// Signature was made by a key the mechanism does not know.
    #[error("signature made by unknown key: {key_identity}")]
    UnknownKey { key_identity: String },

    /// Signer is not the expected key.
    #[error("key fingerprint mismatch: signature by {actual} does not match expected {expected}")]
    KeyMismatch { expected: String, actual: String },

    /// Signed content is not a valid signature payload.
    #[error("malformed signed content: {reason}")]
    MalformedContent { reason: String },

    /// Signed digest does not match the manifest.
    #[error("digest mismatch: signature is for {signed}, manifest is {actual}")]
    DigestMismatch { signed: String, actual: String },

    /// Signed reference does not match the expected reference.
    #[error("reference mismatch: signature is for {signed}, expected {expected}")]
    ReferenceMismatch { signed: String, expected: String },
}

/// Any signing or verification error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Key material could not be loaded, generated or stored.
    #[error("keyring error: {message}")]
    Keyring { message: String },

    /// Configuration could not be loaded.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl SignatureError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Bad input
            Self::Reference(_) | Self::Digest(_) => 1,
            Self::Keyring { .. } | Self::Config { .. } => 1,

            // Key / passphrase handling
            Self::Signing(_) | Self::Capability(_) => 2,

            // Rejected signatures
            Self::Verification(_) | Self::Codec(_) => 4,
        }
    }

    /// Whether the error rejects a signature (as opposed to unusable input).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}

/// Result type for signing and verification operations.
pub type SignatureResult<T> = Result<T, SignatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_errors_are_distinct() {
        let missing = SigningError::PassphraseRequired {
            key_identity: "k".to_string(),
        };
        let malformed = SigningError::PassphraseMalformed {
            reason: "contains a line break".to_string(),
        };
        let wrong = SigningError::PassphraseWrong {
            key_identity: "k".to_string(),
        };
        assert_ne!(missing, malformed);
        assert_ne!(malformed, wrong);
        assert!(malformed.to_string().contains("invalid passphrase"));
    }

    #[test]
    fn test_exit_codes() {
        let reference: SignatureError = ReferenceError::Empty.into();
        assert_eq!(reference.exit_code(), 1);

        let signing: SignatureError = SigningError::KeyNotFound {
            key_identity: "k".to_string(),
        }
        .into();
        assert_eq!(signing.exit_code(), 2);

        let rejected: SignatureError = VerificationError::DigestMismatch {
            signed: "sha256:aa".to_string(),
            actual: "sha256:bb".to_string(),
        }
        .into();
        assert_eq!(rejected.exit_code(), 4);
        assert!(rejected.is_rejection());
        assert!(!reference.is_rejection());
    }

    #[test]
    fn test_transparent_display() {
        let err: SignatureError = VerificationError::KeyMismatch {
            expected: "sha256:aa".to_string(),
            actual: "sha256:bb".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("key fingerprint mismatch"));
    }
}
