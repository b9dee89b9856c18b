//! Verify orchestrator.
//!
//! Every check fails closed: the first failing check returns its error and no
//! partially trusted result is ever produced. Checks run in this order:
//!
//! 1. expected reference canonicalizes (before any cryptography)
//! 2. the mechanism accepts the wire bytes
//! 3. the signer is the expected key
//! 4. the signed content is a signature payload
//! 5. the caller's manifest can be digested
//! 6. the signed digest matches the manifest
//! 7. the signed reference matches the expected reference

use tracing::{debug, info};

use crate::digest::ManifestDigest;
use crate::error::{SignatureResult, VerificationError};
use crate::manifest::compute_digest_with;
use crate::mechanism::{SignedContent, SigningMechanism};
use crate::payload::SignaturePayload;
use crate::reference::canonicalize;

/// What a valid signature vouches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    /// Canonical reference the signature was made for.
    pub docker_reference: String,
    /// Digest of the signed manifest.
    pub docker_manifest_digest: ManifestDigest,
}

/// Verify that `wire` is a signature by `expected_key_identity` over
/// `manifest` under `expected_reference`.
pub fn verify_docker_manifest_signature<M: SigningMechanism + ?Sized>(
    wire: &[u8],
    manifest: &[u8],
    expected_reference: &str,
    mechanism: &M,
    expected_key_identity: &str,
) -> SignatureResult<VerifiedSignature> {
    let expected = canonicalize(expected_reference)?;
    let signed = mechanism.verify(wire)?;

    if signed.signer != expected_key_identity {
        return Err(VerificationError::KeyMismatch {
            expected: expected_key_identity.to_string(),
            actual: signed.signer,
        }
        .into());
    }

    check_signed_content(&signed, manifest, &expected)
}

/// Like [`verify_docker_manifest_signature`], accepting a signature by any of
/// `key_identities`.
///
/// Returns the result together with the identity that produced it. An empty
/// list trusts nobody.
pub fn verify_docker_manifest_signature_with_key_identities<M: SigningMechanism + ?Sized>(
    wire: &[u8],
    manifest: &[u8],
    expected_reference: &str,
    mechanism: &M,
    key_identities: &[String],
) -> SignatureResult<(VerifiedSignature, String)> {
    let expected = canonicalize(expected_reference)?;
    let signed = mechanism.verify(wire)?;

    if !key_identities.contains(&signed.signer) {
        return Err(VerificationError::KeyMismatch {
            expected: key_identities.join(", "),
            actual: signed.signer,
        }
        .into());
    }

    let verified = check_signed_content(&signed, manifest, &expected)?;
    Ok((verified, signed.signer))
}

/// Checks 4-7, against an already canonical `expected` reference.
fn check_signed_content(
    signed: &SignedContent,
    manifest: &[u8],
    expected: &str,
) -> SignatureResult<VerifiedSignature> {
    let payload = SignaturePayload::decode(&signed.content).map_err(|e| {
        VerificationError::MalformedContent {
            reason: e.to_string(),
        }
    })?;

    let signed_digest = &payload.docker_manifest_digest;
    let actual_digest = compute_digest_with(manifest, signed_digest.algorithm())?;
    if &actual_digest != signed_digest {
        return Err(VerificationError::DigestMismatch {
            signed: signed_digest.to_string(),
            actual: actual_digest.to_string(),
        }
        .into());
    }

    let signed_reference = canonicalize(&payload.docker_reference).map_err(|e| {
        VerificationError::MalformedContent {
            reason: format!("signed reference: {e}"),
        }
    })?;
    if signed_reference != expected {
        return Err(VerificationError::ReferenceMismatch {
            signed: signed_reference,
            expected: expected.to_string(),
        }
        .into());
    }

    debug!(signer = %signed.signer, "all signature checks passed");
    info!(
        reference = %signed_reference,
        digest = %payload.docker_manifest_digest,
        "verified signature"
    );
    Ok(VerifiedSignature {
        docker_reference: signed_reference,
        docker_manifest_digest: payload.docker_manifest_digest,
    })
}
