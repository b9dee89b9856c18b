//! Container image reference parsing and canonicalization.
//!
//! Supports the usual reference spellings:
//! - `busybox` → `docker.io/library/busybox`
//! - `mitr/busybox:latest` → `docker.io/mitr/busybox:latest`
//! - `index.docker.io/library/busybox` → `docker.io/library/busybox`
//! - `registry.example:5000/repo:tag@sha256:…` (kept as-is)
//!
//! The canonical form is the fully-qualified `domain/path[:tag][@digest]`;
//! no default tag is added.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::digest::ManifestDigest;
use crate::error::ReferenceError;

/// Registry implied when a reference names none.
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// Legacy spelling of the default registry.
pub const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";

/// Namespace implied for single-component names on the default registry.
pub const OFFICIAL_REPO_NAMESPACE: &str = "library";

/// Maximum length of `domain/path`.
pub const NAME_TOTAL_LENGTH_MAX: usize = 255;

const ALPHANUMERIC: &str = r"[a-z0-9]+";
const SEPARATOR: &str = r"(?:[._]|__|[-]+)";
const DOMAIN_NAME_COMPONENT: &str = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
const IPV6_ADDRESS: &str = r"\[(?:[a-fA-F0-9:]+)\]";
const OPTIONAL_PORT: &str = r"(?::[0-9]+)?";
const TAG: &str = r"[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}";
const DIGEST: &str = r"[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*[:][[:xdigit:]]{32,}";

fn domain_and_port() -> String {
    let domain_name = format!(r"{DOMAIN_NAME_COMPONENT}(?:\.{DOMAIN_NAME_COMPONENT})*");
    format!(r"(?:{domain_name}|{IPV6_ADDRESS}){OPTIONAL_PORT}")
}

fn remote_name() -> String {
    let path_component = format!(r"{ALPHANUMERIC}(?:{SEPARATOR}{ALPHANUMERIC})*");
    format!(r"{path_component}(?:/{path_component})*")
}

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^((?:{}/)?{})(?::({TAG}))?(?:@({DIGEST}))?$",
        domain_and_port(),
        remote_name()
    ))
    .expect("reference grammar must compile")
});

static ANCHORED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(?:({})/)?({})$", domain_and_port(), remote_name()))
        .expect("name grammar must compile")
});

static ANCHORED_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("identifier pattern must compile"));

/// A fully-qualified image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DockerReference {
    domain: String,
    path: String,
    tag: Option<String>,
    digest: Option<ManifestDigest>,
}

impl DockerReference {
    /// Parse and normalize a reference.
    ///
    /// # Examples
    ///
    /// ```
    /// use atomsig_core::DockerReference;
    ///
    /// let short = DockerReference::parse_normalized("busybox:latest").unwrap();
    /// let long = DockerReference::parse_normalized("docker.io/library/busybox:latest").unwrap();
    /// assert_eq!(short, long);
    /// assert_eq!(short.to_string(), "docker.io/library/busybox:latest");
    ///
    /// assert!(DockerReference::parse_normalized("UPPERCASE").is_err());
    /// ```
    pub fn parse_normalized(reference: &str) -> Result<Self, ReferenceError> {
        if reference.is_empty() {
            return Err(ReferenceError::Empty);
        }

        if ANCHORED_IDENTIFIER_RE.is_match(reference) {
            return Err(ReferenceError::HexIdentifier {
                reference: reference.to_string(),
            });
        }

        let (domain, remainder) = split_docker_domain(reference);

        let remote_name = match remainder.find(':') {
            Some(pos) => &remainder[..pos],
            None => remainder.as_str(),
        };
        if remote_name.to_lowercase() != remote_name {
            return Err(ReferenceError::Uppercase {
                reference: reference.to_string(),
            });
        }

        Self::parse_qualified(&format!("{domain}/{remainder}"), reference)
    }

    /// Parse an already fully-qualified reference. `original` is reported in errors.
    fn parse_qualified(qualified: &str, original: &str) -> Result<Self, ReferenceError> {
        let caps = match REFERENCE_RE.captures(qualified) {
            Some(caps) => caps,
            None => {
                if REFERENCE_RE.is_match(&qualified.to_lowercase()) {
                    return Err(ReferenceError::Uppercase {
                        reference: original.to_string(),
                    });
                }
                return Err(ReferenceError::InvalidFormat {
                    reference: original.to_string(),
                    reason: "invalid reference format".to_string(),
                });
            }
        };

        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(ReferenceError::NameTooLong {
                reference: original.to_string(),
                max: NAME_TOTAL_LENGTH_MAX,
            });
        }

        let name_caps =
            ANCHORED_NAME_RE
                .captures(name)
                .ok_or_else(|| ReferenceError::InvalidFormat {
                    reference: original.to_string(),
                    reason: "invalid repository name".to_string(),
                })?;
        let domain = name_caps
            .get(1)
            .map(|m| m.as_str())
            .ok_or_else(|| ReferenceError::InvalidFormat {
                reference: original.to_string(),
                reason: "missing registry domain".to_string(),
            })?;
        let path = name_caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let digest = caps
            .get(3)
            .map(|m| ManifestDigest::parse(m.as_str()))
            .transpose()
            .map_err(|source| ReferenceError::InvalidDigest {
                reference: original.to_string(),
                source,
            })?;

        Ok(Self {
            domain: domain.to_string(),
            path: path.to_string(),
            tag: caps.get(2).map(|m| m.as_str().to_string()),
            digest,
        })
    }

    /// Registry domain (with port, if any).
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Repository path within the registry.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&ManifestDigest> {
        self.digest.as_ref()
    }

    /// `domain/path`, without tag or digest.
    pub fn name(&self) -> String {
        format!("{}/{}", self.domain, self.path)
    }

    /// Short form, dropping the implied default registry and namespace.
    ///
    /// ```
    /// use atomsig_core::DockerReference;
    ///
    /// let r = DockerReference::parse_normalized("docker.io/library/busybox:1").unwrap();
    /// assert_eq!(r.familiar(), "busybox:1");
    /// ```
    pub fn familiar(&self) -> String {
        let mut out = if self.domain == DEFAULT_DOMAIN {
            let official = format!("{OFFICIAL_REPO_NAMESPACE}/");
            match self.path.strip_prefix(&official) {
                Some(rest) if !rest.contains('/') => rest.to_string(),
                _ => self.path.clone(),
            }
        } else {
            self.name()
        };
        self.push_suffix(&mut out);
        out
    }

    fn push_suffix(&self, out: &mut String) {
        if let Some(tag) = &self.tag {
            out.push(':');
            out.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            out.push('@');
            out.push_str(&digest.to_string());
        }
    }
}

impl std::fmt::Display for DockerReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = self.name();
        self.push_suffix(&mut out);
        f.write_str(&out)
    }
}

impl std::str::FromStr for DockerReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_normalized(s)
    }
}

/// Split off the registry domain, applying the default-registry rules.
fn split_docker_domain(name: &str) -> (String, String) {
    let (mut domain, mut remainder) = match name.find('/') {
        Some(i) => {
            let first = &name[..i];
            let looks_like_domain = first.contains(['.', ':'])
                || first == "localhost"
                || first.to_lowercase() != first;
            if looks_like_domain {
                (first.to_string(), name[i + 1..].to_string())
            } else {
                (DEFAULT_DOMAIN.to_string(), name.to_string())
            }
        }
        None => (DEFAULT_DOMAIN.to_string(), name.to_string()),
    };

    if domain == LEGACY_DEFAULT_DOMAIN {
        domain = DEFAULT_DOMAIN.to_string();
    }
    if domain == DEFAULT_DOMAIN && !remainder.contains('/') {
        remainder = format!("{OFFICIAL_REPO_NAMESPACE}/{remainder}");
    }
    (domain, remainder)
}

/// Canonicalize a reference string.
///
/// Equivalent spellings of the same image converge, and the result is a
/// fixed point: `canonicalize(&canonicalize(x)?)? == canonicalize(x)?`.
pub fn canonicalize(reference: &str) -> Result<String, ReferenceError> {
    DockerReference::parse_normalized(reference).map(|r| r.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DIGEST: &str = "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_canonical_forms() {
        let cases = [
            ("busybox", "docker.io/library/busybox"),
            ("busybox:latest", "docker.io/library/busybox:latest"),
            ("library/busybox", "docker.io/library/busybox"),
            ("docker.io/busybox", "docker.io/library/busybox"),
            ("index.docker.io/busybox", "docker.io/library/busybox"),
            ("testing/manifest", "docker.io/testing/manifest"),
            ("docker.io/testing/manifest", "docker.io/testing/manifest"),
            ("registry.example/repo:tag", "registry.example/repo:tag"),
            ("localhost/repo", "localhost/repo"),
            ("localhost:5000/a/b/c:v1.0", "localhost:5000/a/b/c:v1.0"),
            ("[::1]:5000/repo", "[::1]:5000/repo"),
            ("Registry.Example/repo", "Registry.Example/repo"),
            ("a__b/c--d", "docker.io/a__b/c--d"),
        ];
        for (input, expected) in cases {
            assert_eq!(canonicalize(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_digest_reference() {
        let input = format!("registry.example/repo:tag@{DIGEST}");
        let reference = DockerReference::parse_normalized(&input).unwrap();
        assert_eq!(reference.domain(), "registry.example");
        assert_eq!(reference.path(), "repo");
        assert_eq!(reference.tag(), Some("tag"));
        assert_eq!(reference.digest().unwrap().to_string(), DIGEST);
        assert_eq!(reference.to_string(), input);
    }

    #[test]
    fn test_equivalent_spellings_converge() {
        assert_eq!(
            canonicalize("busybox").unwrap(),
            canonicalize("docker.io/library/busybox").unwrap()
        );
        assert_eq!(
            canonicalize("testing/manifest").unwrap(),
            canonicalize("index.docker.io/testing/manifest").unwrap()
        );
        assert_ne!(
            canonicalize("registry.example/repo").unwrap(),
            canonicalize("registry.example/other").unwrap()
        );
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(canonicalize(""), Err(ReferenceError::Empty));
    }

    #[test]
    fn test_rejects_uppercase() {
        assert!(matches!(
            canonicalize("UPPERCASEISINVALID"),
            Err(ReferenceError::Uppercase { .. })
        ));
        assert!(matches!(
            canonicalize("registry.example/Repo"),
            Err(ReferenceError::Uppercase { .. })
        ));
    }

    #[test]
    fn test_rejects_hex_identifier() {
        let hex = "a".repeat(64);
        assert!(matches!(
            canonicalize(&hex),
            Err(ReferenceError::HexIdentifier { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_format() {
        for input in [
            "repo:",
            "repo@",
            "-repo",
            "repo/",
            "repo//x",
            "registry.example/repo:-tag",
            "repo:tag:tag",
            " busybox",
            "busybox:t\u{e4}g",
            "registry.example/repo:\u{4e2d}\u{6587}",
            "busybox:v\u{661}",
            "b\u{fc}sybox",
        ] {
            assert!(
                matches!(canonicalize(input), Err(ReferenceError::InvalidFormat { .. })),
                "{input:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_rejects_long_name() {
        let long = format!("registry.example/{}", "a".repeat(NAME_TOTAL_LENGTH_MAX));
        assert!(matches!(
            canonicalize(&long),
            Err(ReferenceError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_rejects_unsupported_digest_algorithm() {
        let input = format!("busybox@sha384:{}", "a".repeat(96));
        assert!(matches!(
            canonicalize(&input),
            Err(ReferenceError::InvalidDigest { .. })
        ));
    }

    #[test]
    fn test_familiar() {
        let cases = [
            ("busybox", "busybox"),
            ("docker.io/library/busybox:1", "busybox:1"),
            ("docker.io/library/a/b", "library/a/b"),
            ("testing/manifest", "testing/manifest"),
            ("registry.example/repo:tag", "registry.example/repo:tag"),
        ];
        for (input, expected) in cases {
            let reference = DockerReference::parse_normalized(input).unwrap();
            assert_eq!(reference.familiar(), expected, "{input}");
            assert_eq!(canonicalize(&reference.familiar()).unwrap(), reference.to_string());
        }
    }

    fn prefix_strategy() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("docker.io".to_string())),
            Just(Some("index.docker.io".to_string())),
            Just(Some("localhost".to_string())),
            "[a-z][a-z0-9]{0,8}\\.[a-z]{2,4}(:[0-9]{1,5})?".prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn canonicalize_is_idempotent(
            domain in prefix_strategy(),
            path in "[a-z0-9]{1,8}((_|__|-{1,2})[a-z0-9]{1,4})?(/[a-z0-9]{1,8}(\\.[a-z0-9]{1,3})?){0,2}",
            tag in prop::option::of("[A-Za-z0-9_][A-Za-z0-9_.-]{0,10}"),
            digest in prop::option::of("[a-f0-9]{64}"),
        ) {
            let mut input = match &domain {
                Some(d) => format!("{d}/{path}"),
                None => path.clone(),
            };
            if let Some(t) = &tag {
                input.push(':');
                input.push_str(t);
            }
            if let Some(hex) = &digest {
                input.push_str("@sha256:");
                input.push_str(hex);
            }
            let once = canonicalize(&input).unwrap();
            let twice = canonicalize(&once).unwrap();
            prop_assert_eq!(&once, &twice);

            let hub = matches!(domain.as_deref(), None | Some("docker.io" | "index.docker.io"));
            if hub {
                prop_assert!(once.starts_with("docker.io/"), "{}", once);
                if !path.contains('/') {
                    prop_assert!(once.starts_with("docker.io/library/"), "{}", once);
                }
            }
            if let Some(hex) = &digest {
                prop_assert!(once.ends_with(hex.as_str()), "{}", once);
            }
        }
    }
}
