//! Sign orchestrator.

use tracing::{debug, info};

use crate::error::SignatureResult;
use crate::manifest::compute_digest;
use crate::mechanism::{SignOptions, SigningMechanism};
use crate::payload::SignaturePayload;
use crate::reference::canonicalize;

/// Creator recorded in every payload this crate produces.
pub fn creator() -> String {
    format!("atomsig {}", env!("CARGO_PKG_VERSION"))
}

/// Sign `manifest` as reachable under `reference`, using `key_identity`.
pub fn sign_docker_manifest<M: SigningMechanism + ?Sized>(
    manifest: &[u8],
    reference: &str,
    mechanism: &mut M,
    key_identity: &str,
) -> SignatureResult<Vec<u8>> {
    sign_docker_manifest_with_options(
        manifest,
        reference,
        mechanism,
        key_identity,
        &SignOptions::default(),
    )
}

/// Like [`sign_docker_manifest`], passing `options` through to the mechanism.
///
/// Nothing reaches the mechanism unless the reference and manifest are both
/// usable, so an invalid reference never costs a key unlock.
pub fn sign_docker_manifest_with_options<M: SigningMechanism + ?Sized>(
    manifest: &[u8],
    reference: &str,
    mechanism: &mut M,
    key_identity: &str,
    options: &SignOptions,
) -> SignatureResult<Vec<u8>> {
    let docker_reference = canonicalize(reference)?;
    let digest = compute_digest(manifest)?;

    let mut payload = SignaturePayload::new(docker_reference, digest).with_creator(creator());
    if let Some(timestamp) = options.timestamp {
        payload = payload.with_timestamp(timestamp.timestamp());
    }
    let payload_bytes = payload.encode()?;
    debug!(
        reference = %payload.docker_reference,
        digest = %payload.docker_manifest_digest,
        "encoded signature payload"
    );

    let wire = mechanism.sign(&payload_bytes, key_identity, options)?;
    info!(
        reference = %payload.docker_reference,
        digest = %payload.docker_manifest_digest,
        key_id = %key_identity,
        "signed manifest"
    );
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{
        CapabilityError, ReferenceError, SignatureError, SigningError, VerificationError,
    };
    use crate::mechanism::SignedContent;
    use chrono::TimeZone;

    /// Records what it was asked to sign; wire bytes are the payload itself.
    #[derive(Default)]
    struct RecordingMechanism {
        calls: Vec<(Vec<u8>, String)>,
        fail_with: Option<SigningError>,
    }

    impl SigningMechanism for RecordingMechanism {
        fn supports_signing(&self) -> Result<(), CapabilityError> {
            Ok(())
        }

        fn sign(
            &mut self,
            payload: &[u8],
            key_identity: &str,
            _options: &SignOptions,
        ) -> Result<Vec<u8>, SigningError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.calls.push((payload.to_vec(), key_identity.to_string()));
            Ok(payload.to_vec())
        }

        fn verify(&self, wire: &[u8]) -> Result<SignedContent, VerificationError> {
            Ok(SignedContent {
                content: wire.to_vec(),
                signer: "k".to_string(),
            })
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_payload_uses_canonical_reference() {
        let mut mechanism = RecordingMechanism::default();
        let wire = sign_docker_manifest(b"{}", "busybox:latest", &mut mechanism, "k").unwrap();

        let payload = SignaturePayload::decode(&wire).unwrap();
        assert_eq!(payload.docker_reference, "docker.io/library/busybox:latest");
        assert_eq!(payload.docker_manifest_digest, compute_digest(b"{}").unwrap());
        assert_eq!(payload.creator, Some(creator()));
        assert_eq!(payload.timestamp, None);
        assert_eq!(mechanism.calls[0].1, "k");
    }

    #[test]
    fn test_signing_is_deterministic_without_timestamp() {
        let mut mechanism = RecordingMechanism::default();
        let a = sign_docker_manifest(b"manifest", "example.com/x", &mut mechanism, "k").unwrap();
        let b = sign_docker_manifest(b"manifest", "example.com/x", &mut mechanism, "k").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_timestamp_is_recorded() {
        let mut mechanism = RecordingMechanism::default();
        let when = chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let options = SignOptions::default().with_timestamp(when);
        let wire = sign_docker_manifest_with_options(
            b"manifest",
            "example.com/x",
            &mut mechanism,
            "k",
            &options,
        )
        .unwrap();
        assert_eq!(
            SignaturePayload::decode(&wire).unwrap().timestamp,
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_invalid_reference_never_reaches_mechanism() {
        let mut mechanism = RecordingMechanism::default();
        for reference in ["", "UPPERCASEISINVALID"] {
            let err = sign_docker_manifest(b"{}", reference, &mut mechanism, "k").unwrap_err();
            assert!(matches!(err, SignatureError::Reference(_)));
        }
        assert_eq!(
            sign_docker_manifest(b"{}", "", &mut mechanism, "k").unwrap_err(),
            SignatureError::Reference(ReferenceError::Empty)
        );
        assert!(mechanism.calls.is_empty());
    }

    #[test]
    fn test_malformed_manifest_never_reaches_mechanism() {
        let mut mechanism = RecordingMechanism::default();
        let manifest = br#"{"schemaVersion": 1, "signatures": 1}"#;
        let err = sign_docker_manifest(manifest, "example.com/x", &mut mechanism, "k").unwrap_err();
        assert!(matches!(err, SignatureError::Digest(_)));
        assert!(mechanism.calls.is_empty());
    }

    #[test]
    fn test_signing_error_kind_is_preserved() {
        let mut mechanism = RecordingMechanism {
            fail_with: Some(SigningError::PassphraseWrong {
                key_identity: "k".to_string(),
            }),
            ..Default::default()
        };
        let err = sign_docker_manifest(b"{}", "example.com/x", &mut mechanism, "k").unwrap_err();
        assert_eq!(
            err,
            SignatureError::Signing(SigningError::PassphraseWrong {
                key_identity: "k".to_string()
            })
        );
    }

    #[test]
    fn test_works_through_trait_object() {
        let mut mechanism = RecordingMechanism::default();
        let dynamic: &mut dyn SigningMechanism = &mut mechanism;
        assert!(sign_docker_manifest(b"{}", "example.com/x", dynamic, "k").is_ok());
    }
}
