//! Signature payload codec.
//!
//! The payload is the exact byte sequence that gets signed. It follows the
//! atomic container signature layout:
//!
//! ```text
//! {
//!   "critical": {
//!     "identity": {"docker-reference": "<canonical reference>"},
//!     "image": {"docker-manifest-digest": "<algorithm>:<hex>"},
//!     "type": "atomic container signature"
//!   },
//!   "optional": {"creator": "...", "timestamp": 1700000000}
//! }
//! ```
//!
//! Encoding is RFC 8785 canonical JSON, so equal payloads always produce
//! equal bytes. Decoding is strict about everything in `critical`.

use serde::{Deserialize, Serialize};

use crate::digest::ManifestDigest;
use crate::error::CodecError;

/// Type tag identifying an atomic container signature.
pub const SIGNATURE_TYPE: &str = "atomic container signature";

/// The signed claim: this manifest digest is reachable under this reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload {
    /// Reference the signer intended (canonical when produced by this crate).
    pub docker_reference: String,

    /// Digest of the signed manifest.
    pub docker_manifest_digest: ManifestDigest,

    /// Informational: software that produced the signature. Never verified.
    pub creator: Option<String>,

    /// Informational: Unix seconds at signing time. Never verified.
    pub timestamp: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WirePayload {
    critical: WireCritical,
    optional: WireOptional,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireCritical {
    #[serde(rename = "type")]
    kind: String,
    image: WireImage,
    identity: WireIdentity,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireImage {
    #[serde(rename = "docker-manifest-digest")]
    docker_manifest_digest: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireIdentity {
    #[serde(rename = "docker-reference")]
    docker_reference: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireOptional {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

impl SignaturePayload {
    pub fn new(
        docker_reference: impl Into<String>,
        docker_manifest_digest: ManifestDigest,
    ) -> Self {
        Self {
            docker_reference: docker_reference.into(),
            docker_manifest_digest,
            creator: None,
            timestamp: None,
        }
    }

    /// Set the creator.
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Set the timestamp (Unix seconds).
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Canonical bytes to sign.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let wire = WirePayload {
            critical: WireCritical {
                kind: SIGNATURE_TYPE.to_string(),
                image: WireImage {
                    docker_manifest_digest: self.docker_manifest_digest.to_string(),
                },
                identity: WireIdentity {
                    docker_reference: self.docker_reference.clone(),
                },
            },
            optional: WireOptional {
                creator: self.creator.clone(),
                timestamp: self.timestamp,
            },
        };

        serde_jcs::to_vec(&wire).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }

    /// Parse signed bytes back into a payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let wire: WirePayload =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed {
                reason: e.to_string(),
            })?;

        if wire.critical.kind != SIGNATURE_TYPE {
            return Err(CodecError::UnexpectedType {
                expected: SIGNATURE_TYPE.to_string(),
                got: wire.critical.kind,
            });
        }

        let digest = ManifestDigest::parse(&wire.critical.image.docker_manifest_digest).map_err(
            |e| CodecError::Malformed {
                reason: format!("invalid docker-manifest-digest: {e}"),
            },
        )?;

        Ok(Self {
            docker_reference: wire.critical.identity.docker_reference,
            docker_manifest_digest: digest,
            creator: wire.optional.creator,
            timestamp: wire.optional.timestamp,
        })
    }
}
