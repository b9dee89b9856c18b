//! DSSE envelope wire format.
//!
//! ```text
//! PAE(type, payload) = "DSSEv1" SP LEN(type) SP type SP LEN(payload) SP payload
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::VerificationError;

/// Payload type of envelopes carrying atomic signature payloads.
pub const PAYLOAD_TYPE_ATOMIC_V1: &str = "application/vnd.atomsig.signature+json;v=1";

/// DSSE envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsseEnvelope {
    /// Payload type.
    #[serde(rename = "payloadType")]
    pub payload_type: String,

    /// Base64-encoded payload.
    pub payload: String,

    /// Signatures.
    pub signatures: Vec<DsseSignature>,
}

/// DSSE signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsseSignature {
    /// Key ID.
    #[serde(rename = "keyid")]
    pub key_id: String,

    /// Base64-encoded signature.
    #[serde(rename = "sig")]
    pub signature: String,
}

impl DsseEnvelope {
    /// Parse compact JSON wire bytes.
    pub fn from_wire(wire: &[u8]) -> Result<Self, VerificationError> {
        serde_json::from_slice(wire).map_err(|e| VerificationError::CorruptSignature {
            reason: format!("invalid DSSE envelope: {e}"),
        })
    }

    /// Serialize to compact JSON wire bytes.
    pub fn to_wire(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode the payload, requiring the atomic payload type.
    pub fn decode_payload(&self) -> Result<Vec<u8>, VerificationError> {
        if self.payload_type != PAYLOAD_TYPE_ATOMIC_V1 {
            return Err(VerificationError::CorruptSignature {
                reason: format!(
                    "payload type mismatch: expected {}, got {}",
                    PAYLOAD_TYPE_ATOMIC_V1, self.payload_type
                ),
            });
        }

        BASE64
            .decode(&self.payload)
            .map_err(|e| VerificationError::CorruptSignature {
                reason: format!("invalid base64 payload: {e}"),
            })
    }
}

/// Build DSSE Pre-Authentication Encoding (PAE).
pub fn build_pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let type_len = payload_type.len().to_string();
    let payload_len = payload.len().to_string();

    let mut pae = Vec::new();
    pae.extend_from_slice(b"DSSEv1 ");
    pae.extend_from_slice(type_len.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload_type.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload_len.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload);
    pae
}
