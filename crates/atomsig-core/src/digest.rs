//! Algorithm-tagged content digests (`sha256:<hex>`).

use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::DigestError;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Algorithm name as used in the digest prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the lowercase hex encoding.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Look up an algorithm by its prefix name.
    pub fn from_name(name: &str) -> Result<Self, DigestError> {
        match name {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(DigestError::UnsupportedAlgorithm {
                algorithm: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Content digest of a manifest.
///
/// Always holds a supported algorithm and lowercase hex of the right length,
/// so two digests compare equal exactly when their string forms do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ManifestDigest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl ManifestDigest {
    /// Parse `<algorithm>:<hex>`.
    ///
    /// ```
    /// use atomsig_core::ManifestDigest;
    ///
    /// let digest = ManifestDigest::parse(
    ///     "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
    /// )
    /// .unwrap();
    /// assert_eq!(digest.algorithm().name(), "sha256");
    /// assert!(ManifestDigest::parse("sha256:ABC").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, DigestError> {
        let (name, hex) = s.split_once(':').ok_or_else(|| DigestError::InvalidFormat {
            digest: s.to_string(),
            reason: "missing algorithm prefix".to_string(),
        })?;

        let algorithm = DigestAlgorithm::from_name(name)?;

        if hex.len() != algorithm.hex_len() {
            return Err(DigestError::InvalidFormat {
                digest: s.to_string(),
                reason: format!(
                    "expected {} hex characters for {}, got {}",
                    algorithm.hex_len(),
                    algorithm,
                    hex.len()
                ),
            });
        }

        if !hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(DigestError::InvalidFormat {
                digest: s.to_string(),
                reason: "digest must be lowercase hex".to_string(),
            });
        }

        Ok(Self {
            algorithm,
            hex: hex.to_string(),
        })
    }

    /// Hash `bytes` with `algorithm`.
    pub fn from_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            hex: hex_bytes(algorithm, bytes),
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Lowercase hex part, without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl std::fmt::Display for ManifestDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl std::str::FromStr for ManifestDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ManifestDigest {
    type Error = DigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ManifestDigest> for String {
    fn from(digest: ManifestDigest) -> Self {
        digest.to_string()
    }
}

fn hex_reader<D: Digest, R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0_u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex digest of everything `reader` yields.
pub(crate) fn hex_digest_reader<R: Read>(
    algorithm: DigestAlgorithm,
    reader: R,
) -> std::io::Result<String> {
    match algorithm {
        DigestAlgorithm::Sha256 => hex_reader::<Sha256, R>(reader),
        DigestAlgorithm::Sha512 => hex_reader::<Sha512, R>(reader),
    }
}

fn hex_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> String {
    // In-memory hashing should be infallible; keep a single hashing implementation.
    hex_digest_reader(algorithm, Cursor::new(bytes))
        .expect("hashing in-memory bytes via cursor must not fail")
}

/// `sha256:<hex>` of raw bytes.
pub(crate) fn sha256_prefixed(bytes: &[u8]) -> String {
    format!("sha256:{}", hex_bytes(DigestAlgorithm::Sha256, bytes))
}
