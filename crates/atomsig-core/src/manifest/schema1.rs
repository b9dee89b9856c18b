//! Signature stripping for signed schema 1 manifests.
//!
//! A signed schema 1 manifest is the signed JSON document with a
//! `"signatures"` member spliced in before its closing brace. Each signature
//! carries a base64url `protected` header recording how to undo the splice:
//! `formatLength` bytes of the original document are kept, followed by the
//! base64url-decoded `formatTail`.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DigestError;

const SIGNATURES_KEY: &str = "signatures";

/// base64url, padding optional.
const JOSE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

// Only the protected header matters for stripping; `header` and `signature`
// are ignored.
#[derive(Debug, Deserialize)]
struct ParsedSignature {
    protected: String,
}

fn malformed(reason: impl Into<String>) -> DigestError {
    DigestError::MalformedManifest {
        reason: reason.into(),
    }
}

/// Recover the signed document from a signed schema 1 manifest.
pub(super) fn strip_signatures(manifest: &[u8]) -> Result<Vec<u8>, DigestError> {
    let content: Map<String, Value> = serde_json::from_slice(manifest)
        .map_err(|e| malformed(format!("manifest is not a JSON object: {e}")))?;

    let signatures = content
        .get(SIGNATURES_KEY)
        .ok_or_else(|| malformed("missing signatures"))?;
    let blocks: Vec<ParsedSignature> = serde_json::from_value(signatures.clone())
        .map_err(|e| malformed(format!("invalid signatures: {e}")))?;
    if blocks.is_empty() {
        return Err(malformed("signatures list is empty"));
    }

    let mut format: Option<(usize, Vec<u8>)> = None;
    for (i, block) in blocks.iter().enumerate() {
        let (length, tail) = parse_protected_header(&block.protected)
            .map_err(|reason| malformed(format!("signature {i}: {reason}")))?;

        match &format {
            None => format = Some((length, tail)),
            Some((first_length, first_tail)) => {
                if *first_length != length {
                    return Err(malformed("conflicting format length"));
                }
                if *first_tail != tail {
                    return Err(malformed("conflicting format tail"));
                }
            }
        }
    }

    let (length, tail) = format.ok_or_else(|| malformed("signatures list is empty"))?;
    if length > manifest.len() {
        return Err(malformed(format!(
            "format length {length} exceeds manifest size {}",
            manifest.len()
        )));
    }

    let mut payload = Vec::with_capacity(length + tail.len());
    payload.extend_from_slice(&manifest[..length]);
    payload.extend_from_slice(&tail);
    Ok(payload)
}

fn parse_protected_header(protected: &str) -> Result<(usize, Vec<u8>), String> {
    let bytes = JOSE_BASE64
        .decode(protected)
        .map_err(|e| format!("invalid protected header encoding: {e}"))?;
    let header: Map<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|e| format!("invalid protected header: {e}"))?;

    let length = match header.get("formatLength") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| format!("invalid formatLength: {n}"))?,
        Some(other) => return Err(format!("formatLength must be a number, got {other}")),
        None => return Err("missing formatLength".to_string()),
    };
    let length = usize::try_from(length).map_err(|_| format!("formatLength {length} too large"))?;

    let tail = match header.get("formatTail") {
        Some(Value::String(s)) => JOSE_BASE64
            .decode(s)
            .map_err(|e| format!("invalid formatTail encoding: {e}"))?,
        Some(other) => return Err(format!("formatTail must be a string, got {other}")),
        None => return Err("missing formatTail".to_string()),
    };

    Ok((length, tail))
}
