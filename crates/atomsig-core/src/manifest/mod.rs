//! Manifest digesting.
//!
//! Each supported manifest schema is one variant of [`ManifestSchema`] with
//! its own digest rule. Only the legacy signed schema 1 format embeds
//! signatures in the manifest itself; those are stripped before hashing,
//! and a malformed signature envelope is a hard error.

mod schema1;

use std::borrow::Cow;

use serde_json::Value;

use crate::digest::{DigestAlgorithm, ManifestDigest};
use crate::error::DigestError;

/// Docker image manifest, schema 1 (unsigned).
pub const DOCKER_V2_SCHEMA1_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v1+json";

/// Docker image manifest, schema 1 with embedded JWS signatures.
pub const DOCKER_V2_SCHEMA1_SIGNED_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";

/// Docker image manifest, schema 2.
pub const DOCKER_V2_SCHEMA2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Docker image config referenced by a schema 2 manifest.
pub const DOCKER_V2_SCHEMA2_CONFIG_MEDIA_TYPE: &str = "application/vnd.docker.container.image.v1+json";

/// Docker manifest list.
pub const DOCKER_V2_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// OCI image manifest.
pub const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// OCI image config.
pub const OCI_CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";

/// OCI image index.
pub const OCI_INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";

/// Manifest schemas, each with its own digest rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestSchema {
    /// Schema 1 with an inline `signatures` envelope (stripped before hashing).
    DockerV2Schema1Signed,
    DockerV2Schema1,
    DockerV2Schema2,
    DockerV2List,
    OciManifest,
    OciIndex,
    /// Not recognisable; hashed as raw bytes.
    Unknown,
}

impl ManifestSchema {
    /// Media type of the schema, if known.
    pub fn media_type(&self) -> Option<&'static str> {
        match self {
            Self::DockerV2Schema1Signed => Some(DOCKER_V2_SCHEMA1_SIGNED_MEDIA_TYPE),
            Self::DockerV2Schema1 => Some(DOCKER_V2_SCHEMA1_MEDIA_TYPE),
            Self::DockerV2Schema2 => Some(DOCKER_V2_SCHEMA2_MEDIA_TYPE),
            Self::DockerV2List => Some(DOCKER_V2_LIST_MEDIA_TYPE),
            Self::OciManifest => Some(OCI_MANIFEST_MEDIA_TYPE),
            Self::OciIndex => Some(OCI_INDEX_MEDIA_TYPE),
            Self::Unknown => None,
        }
    }

    fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            DOCKER_V2_SCHEMA2_MEDIA_TYPE => Some(Self::DockerV2Schema2),
            DOCKER_V2_LIST_MEDIA_TYPE => Some(Self::DockerV2List),
            OCI_MANIFEST_MEDIA_TYPE => Some(Self::OciManifest),
            OCI_INDEX_MEDIA_TYPE => Some(Self::OciIndex),
            _ => None,
        }
    }

    /// The bytes covered by the digest for this schema.
    fn signed_content<'a>(&self, manifest: &'a [u8]) -> Result<Cow<'a, [u8]>, DigestError> {
        match self {
            Self::DockerV2Schema1Signed => schema1::strip_signatures(manifest).map(Into::into),
            _ => Ok(manifest.into()),
        }
    }
}

impl std::fmt::Display for ManifestSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.media_type().unwrap_or("unknown"))
    }
}

/// Guess the schema of a manifest from its contents.
///
/// Bytes that are not a JSON object are [`ManifestSchema::Unknown`].
pub fn guess_schema(manifest: &[u8]) -> ManifestSchema {
    let value: Value = match serde_json::from_slice(manifest) {
        Ok(v) => v,
        Err(_) => return ManifestSchema::Unknown,
    };
    let Some(obj) = value.as_object() else {
        return ManifestSchema::Unknown;
    };

    let media_type = match obj.get("mediaType") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => return ManifestSchema::Unknown,
    };
    if let Some(schema) = media_type.and_then(ManifestSchema::from_media_type) {
        return schema;
    }

    let schema_version = match obj.get("schemaVersion") {
        None | Some(Value::Null) => 0,
        Some(v) => match v.as_i64() {
            Some(n) => n,
            None => return ManifestSchema::Unknown,
        },
    };

    match schema_version {
        1 => match obj.get("signatures") {
            None | Some(Value::Null) => ManifestSchema::DockerV2Schema1,
            Some(_) => ManifestSchema::DockerV2Schema1Signed,
        },
        2 => guess_schema2(obj),
        _ => ManifestSchema::Unknown,
    }
}

// Schema 2 documents that predate a top-level mediaType (early OCI).
fn guess_schema2(obj: &serde_json::Map<String, Value>) -> ManifestSchema {
    let config_media_type = obj
        .get("config")
        .and_then(|c| c.get("mediaType"))
        .and_then(Value::as_str);
    match config_media_type {
        Some(OCI_CONFIG_MEDIA_TYPE) => return ManifestSchema::OciManifest,
        Some(DOCKER_V2_SCHEMA2_CONFIG_MEDIA_TYPE) => return ManifestSchema::DockerV2Schema2,
        _ => {}
    }

    if let Some(manifests) = obj.get("manifests").and_then(Value::as_array) {
        if let Some(first) = manifests.first() {
            let first_media_type = first.get("mediaType").and_then(Value::as_str);
            return if first_media_type == Some(OCI_MANIFEST_MEDIA_TYPE) {
                ManifestSchema::OciIndex
            } else {
                ManifestSchema::DockerV2List
            };
        }
    }

    ManifestSchema::DockerV2Schema2
}

/// Compute the SHA-256 digest of a manifest.
pub fn compute_digest(manifest: &[u8]) -> Result<ManifestDigest, DigestError> {
    compute_digest_with(manifest, DigestAlgorithm::Sha256)
}

/// Compute the digest of a manifest with a specific algorithm.
pub fn compute_digest_with(
    manifest: &[u8],
    algorithm: DigestAlgorithm,
) -> Result<ManifestDigest, DigestError> {
    let schema = guess_schema(manifest);
    let content = schema.signed_content(manifest)?;
    let digest = ManifestDigest::from_bytes(algorithm, &content);
    tracing::debug!(schema = %schema, digest = %digest, "computed manifest digest");
    Ok(digest)
}

/// Whether `manifest` has digest `expected`, using `expected`'s algorithm.
pub fn matches_digest(manifest: &[u8], expected: &ManifestDigest) -> Result<bool, DigestError> {
    let actual = compute_digest_with(manifest, expected.algorithm())?;
    Ok(&actual == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_non_json_is_unknown() {
        assert_eq!(guess_schema(b"unexpected manifest"), ManifestSchema::Unknown);
        assert_eq!(guess_schema(b"[1, 2]"), ManifestSchema::Unknown);
        assert_eq!(guess_schema(b"{\"schemaVersion\": \"2\"}"), ManifestSchema::Unknown);
    }

    #[test]
    fn test_guess_by_media_type() {
        let cases = [
            (DOCKER_V2_SCHEMA2_MEDIA_TYPE, ManifestSchema::DockerV2Schema2),
            (DOCKER_V2_LIST_MEDIA_TYPE, ManifestSchema::DockerV2List),
            (OCI_MANIFEST_MEDIA_TYPE, ManifestSchema::OciManifest),
            (OCI_INDEX_MEDIA_TYPE, ManifestSchema::OciIndex),
        ];
        for (media_type, expected) in cases {
            let manifest = format!(r#"{{"schemaVersion": 2, "mediaType": "{media_type}"}}"#);
            assert_eq!(guess_schema(manifest.as_bytes()), expected, "{media_type}");
        }
    }

    #[test]
    fn test_guess_schema1() {
        assert_eq!(
            guess_schema(br#"{"schemaVersion": 1, "name": "x"}"#),
            ManifestSchema::DockerV2Schema1
        );
        assert_eq!(
            guess_schema(br#"{"schemaVersion": 1, "signatures": null}"#),
            ManifestSchema::DockerV2Schema1
        );
        // Any non-null signatures member marks the signed variant, even a bogus one.
        assert_eq!(
            guess_schema(br#"{"schemaVersion": 1, "signatures": 1}"#),
            ManifestSchema::DockerV2Schema1Signed
        );
    }

    #[test]
    fn test_guess_schema2_without_media_type() {
        let oci = format!(
            r#"{{"schemaVersion": 2, "config": {{"mediaType": "{OCI_CONFIG_MEDIA_TYPE}"}}}}"#
        );
        assert_eq!(guess_schema(oci.as_bytes()), ManifestSchema::OciManifest);

        let index = format!(
            r#"{{"schemaVersion": 2, "manifests": [{{"mediaType": "{OCI_MANIFEST_MEDIA_TYPE}"}}]}}"#
        );
        assert_eq!(guess_schema(index.as_bytes()), ManifestSchema::OciIndex);

        let list = r#"{"schemaVersion": 2, "manifests": [{"mediaType": "other"}]}"#;
        assert_eq!(guess_schema(list.as_bytes()), ManifestSchema::DockerV2List);

        assert_eq!(
            guess_schema(br#"{"schemaVersion": 2}"#),
            ManifestSchema::DockerV2Schema2
        );
    }

    #[test]
    fn test_unknown_is_raw_hash() {
        let digest = compute_digest(b"unexpected manifest").unwrap();
        assert_eq!(
            digest,
            ManifestDigest::from_bytes(DigestAlgorithm::Sha256, b"unexpected manifest")
        );
    }

    #[test]
    fn test_malformed_signed_schema1_fails() {
        let err = compute_digest(br#"{"schemaVersion": 1, "signatures": 1}"#).unwrap_err();
        assert!(matches!(err, DigestError::MalformedManifest { .. }));
    }

    #[test]
    fn test_matches_digest_uses_expected_algorithm() {
        let manifest = br#"{"schemaVersion": 2, "mediaType": "application/vnd.oci.image.manifest.v1+json"}"#;
        let sha512 = compute_digest_with(manifest, DigestAlgorithm::Sha512).unwrap();
        assert!(matches_digest(manifest, &sha512).unwrap());

        let other = compute_digest(b"something else").unwrap();
        assert!(!matches_digest(manifest, &other).unwrap());
    }
}
