//! Ed25519 keyring mechanism.
//!
//! Keys live in a directory as PKCS#8 PEM files named after their key id:
//!
//! ```text
//! <hex>.pem       private key (plain, or "ENCRYPTED PRIVATE KEY")
//! <hex>.pub.pem   public key (SubjectPublicKeyInfo)
//! ```
//!
//! A key id is `sha256:<hex>` over the SPKI DER of the public key. Plain
//! private keys are usable immediately. Encrypted ones stay locked until a
//! signing call supplies the passphrase; once unlocked they remain cached for
//! the lifetime of the session, the way a key agent behaves.
//!
//! Signatures are DSSE envelopes over the payload, serialized as compact JSON.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use pkcs8::der::Document;
use pkcs8::EncryptedPrivateKeyInfo;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::envelope::{build_pae, DsseEnvelope, DsseSignature, PAYLOAD_TYPE_ATOMIC_V1};
use super::{validate_passphrase, SignOptions, SignedContent, SigningMechanism};
use crate::digest::sha256_prefixed;
use crate::error::{
    CapabilityError, SignatureError, SignatureResult, SigningError, VerificationError,
};

/// PEM label of passphrase-protected PKCS#8 keys.
pub(crate) const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

const KEY_ID_PREFIX: &str = "sha256:";
const PUBLIC_KEY_SUFFIX: &str = ".pub.pem";
const PRIVATE_KEY_SUFFIX: &str = ".pem";

/// Compute key id from SPKI DER bytes.
///
/// Format: `sha256:<lowercase hex>`
pub fn compute_key_id(spki_der: &[u8]) -> String {
    sha256_prefixed(spki_der)
}

/// Compute key id from a verifying key.
pub fn compute_key_id_from_key(key: &VerifyingKey) -> Result<String, pkcs8::spki::Error> {
    let der = key.to_public_key_der()?;
    Ok(compute_key_id(der.as_bytes()))
}

/// File stem used for a key id on disk (`sha256:` prefix dropped).
pub(crate) fn key_file_stem(key_id: &str) -> Option<&str> {
    let hex = key_id.strip_prefix(KEY_ID_PREFIX)?;
    is_key_hex(hex).then_some(hex)
}

fn is_key_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Ed25519 keyring.
pub struct KeyringMechanism {
    /// Keys accepted when verifying.
    public_keys: HashMap<String, VerifyingKey>,
    /// Keys usable for signing without a passphrase.
    unlocked: HashMap<String, SigningKey>,
    /// Encrypted private keys, by key id.
    locked: HashMap<String, Zeroizing<String>>,
    can_sign: bool,
    closed: bool,
}

impl KeyringMechanism {
    /// Empty keyring that can sign once keys are added.
    pub fn in_memory() -> Self {
        Self {
            public_keys: HashMap::new(),
            unlocked: HashMap::new(),
            locked: HashMap::new(),
            can_sign: true,
            closed: false,
        }
    }

    /// Load every key in `dir`.
    ///
    /// Unreadable or unparseable entries are skipped with a warning so one bad
    /// file cannot take the whole keyring down.
    pub fn open(dir: &Path) -> SignatureResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| SignatureError::Keyring {
            message: format!("cannot read keyring directory {}: {e}", dir.display()),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut keyring = Self::in_memory();
        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let loaded = if file_name.ends_with(PUBLIC_KEY_SUFFIX) {
                fs::read_to_string(&path)
                    .map_err(|e| SignatureError::Keyring {
                        message: e.to_string(),
                    })
                    .and_then(|pem| keyring.add_public_key_pem(&pem).map(|_| ()))
            } else if let Some(stem) = file_name.strip_suffix(PRIVATE_KEY_SUFFIX) {
                fs::read_to_string(&path)
                    .map(Zeroizing::new)
                    .map_err(|e| SignatureError::Keyring {
                        message: e.to_string(),
                    })
                    .and_then(|pem| keyring.load_private_pem(stem, &pem))
            } else {
                continue;
            };

            if let Err(e) = loaded {
                warn!(path = %path.display(), error = %e, "skipping keyring entry");
            }
        }

        debug!(
            dir = %dir.display(),
            public_keys = keyring.public_keys.len(),
            signing_keys = keyring.unlocked.len() + keyring.locked.len(),
            "opened keyring"
        );
        Ok(keyring)
    }

    /// Verify-only keyring trusting exactly the given public keys.
    ///
    /// Returns the keyring and the key ids of the imported keys, in order.
    pub fn ephemeral<S: AsRef<str>>(public_pems: &[S]) -> SignatureResult<(Self, Vec<String>)> {
        let mut keyring = Self::in_memory();
        keyring.can_sign = false;

        let key_ids = public_pems
            .iter()
            .map(|pem| keyring.add_public_key_pem(pem.as_ref()))
            .collect::<SignatureResult<Vec<_>>>()?;
        Ok((keyring, key_ids))
    }

    /// Add an unlocked signing key. Its public half is trusted for verification.
    pub fn add_signing_key(&mut self, key: SigningKey) -> SignatureResult<String> {
        let key_id = self.add_public_key(key.verifying_key())?;
        self.unlocked.insert(key_id.clone(), key);
        Ok(key_id)
    }

    /// Add a passphrase-protected private key under `key_id`.
    ///
    /// The key stays locked until a signing call supplies its passphrase.
    pub fn add_locked_key(&mut self, key_id: &str, encrypted_pem: &str) -> SignatureResult<()> {
        if key_file_stem(key_id).is_none() {
            return Err(SignatureError::Keyring {
                message: format!("invalid key id: {key_id}"),
            });
        }

        let (label, der) = Document::from_pem(encrypted_pem).map_err(|e| SignatureError::Keyring {
            message: format!("invalid PEM: {e}"),
        })?;
        if label != ENCRYPTED_PRIVATE_KEY_LABEL {
            return Err(SignatureError::Keyring {
                message: format!("expected {ENCRYPTED_PRIVATE_KEY_LABEL} PEM, got {label}"),
            });
        }
        EncryptedPrivateKeyInfo::try_from(der.as_bytes()).map_err(|e| SignatureError::Keyring {
            message: format!("invalid encrypted private key: {e}"),
        })?;

        self.locked
            .insert(key_id.to_string(), Zeroizing::new(encrypted_pem.to_string()));
        Ok(())
    }

    /// Trust a public key for verification.
    pub fn add_public_key(&mut self, key: VerifyingKey) -> SignatureResult<String> {
        let key_id = compute_key_id_from_key(&key).map_err(|e| SignatureError::Keyring {
            message: format!("cannot encode public key: {e}"),
        })?;
        self.public_keys.insert(key_id.clone(), key);
        Ok(key_id)
    }

    /// Trust a PEM-encoded public key for verification.
    pub fn add_public_key_pem(&mut self, pem: &str) -> SignatureResult<String> {
        let key = VerifyingKey::from_public_key_pem(pem).map_err(|e| SignatureError::Keyring {
            message: format!("invalid public key: {e}"),
        })?;
        self.add_public_key(key)
    }

    /// Key ids this keyring accepts signatures from, sorted.
    pub fn key_identities(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.public_keys.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether `key_id` can sign without a passphrase.
    pub fn is_unlocked(&self, key_id: &str) -> bool {
        self.unlocked.contains_key(key_id)
    }

    fn load_private_pem(&mut self, stem: &str, pem: &str) -> SignatureResult<()> {
        if pem.contains(&format!("-----BEGIN {ENCRYPTED_PRIVATE_KEY_LABEL}-----")) {
            if !is_key_hex(stem) {
                return Err(SignatureError::Keyring {
                    message: "encrypted key file name must be its key id".to_string(),
                });
            }
            return self.add_locked_key(&format!("{KEY_ID_PREFIX}{stem}"), pem);
        }

        let key = SigningKey::from_pkcs8_pem(pem).map_err(|e| SignatureError::Keyring {
            message: format!("invalid private key: {e}"),
        })?;
        self.add_signing_key(key).map(|_| ())
    }

    /// Resolve a signing key, unlocking it with `passphrase` when needed.
    fn signing_key(
        &mut self,
        key_identity: &str,
        passphrase: Option<&str>,
    ) -> Result<&SigningKey, SigningError> {
        if let Some(encrypted) = self.locked.get(key_identity) {
            match passphrase {
                Some(passphrase) => {
                    let key = SigningKey::from_pkcs8_encrypted_pem(encrypted, passphrase)
                        .map_err(|_| SigningError::PassphraseWrong {
                            key_identity: key_identity.to_string(),
                        })?;

                    let actual = compute_key_id_from_key(&key.verifying_key()).map_err(|e| {
                        SigningError::Backend {
                            reason: format!("cannot encode public key: {e}"),
                        }
                    })?;
                    if actual != key_identity {
                        return Err(SigningError::Backend {
                            reason: format!("key file for {key_identity} holds key {actual}"),
                        });
                    }

                    debug!(key_id = %key_identity, "unlocked signing key");
                    self.public_keys
                        .insert(key_identity.to_string(), key.verifying_key());
                    self.unlocked.insert(key_identity.to_string(), key);
                }
                None if !self.unlocked.contains_key(key_identity) => {
                    return Err(SigningError::PassphraseRequired {
                        key_identity: key_identity.to_string(),
                    });
                }
                None => {}
            }
        }

        self.unlocked
            .get(key_identity)
            .ok_or_else(|| SigningError::KeyNotFound {
                key_identity: key_identity.to_string(),
            })
    }

    fn verify_one(&self, pae: &[u8], signature: &DsseSignature) -> Result<(), VerificationError> {
        let key = self
            .public_keys
            .get(&signature.key_id)
            .ok_or_else(|| VerificationError::UnknownKey {
                key_identity: signature.key_id.clone(),
            })?;

        let bytes = BASE64
            .decode(&signature.signature)
            .map_err(|e| VerificationError::CorruptSignature {
                reason: format!("invalid base64 signature: {e}"),
            })?;
        let signature =
            Signature::from_slice(&bytes).map_err(|e| VerificationError::CorruptSignature {
                reason: format!("invalid signature bytes: {e}"),
            })?;

        key.verify_strict(pae, &signature)
            .map_err(|_| VerificationError::CorruptSignature {
                reason: "ed25519 verification failed".to_string(),
            })
    }
}

impl SigningMechanism for KeyringMechanism {
    fn supports_signing(&self) -> Result<(), CapabilityError> {
        if !self.can_sign {
            return Err(CapabilityError {
                reason: "keyring holds public keys only".to_string(),
            });
        }
        if self.closed {
            return Err(CapabilityError {
                reason: "keyring session is closed".to_string(),
            });
        }
        Ok(())
    }

    fn sign(
        &mut self,
        payload: &[u8],
        key_identity: &str,
        options: &SignOptions,
    ) -> Result<Vec<u8>, SigningError> {
        if let Some(passphrase) = &options.passphrase {
            validate_passphrase(passphrase)?;
        }
        if self.closed {
            return Err(SigningError::Backend {
                reason: "keyring session is closed".to_string(),
            });
        }

        let key = self.signing_key(key_identity, options.passphrase.as_deref())?;
        let pae = build_pae(PAYLOAD_TYPE_ATOMIC_V1, payload);
        let signature = key.sign(&pae);

        let envelope = DsseEnvelope {
            payload_type: PAYLOAD_TYPE_ATOMIC_V1.to_string(),
            payload: BASE64.encode(payload),
            signatures: vec![DsseSignature {
                key_id: key_identity.to_string(),
                signature: BASE64.encode(signature.to_bytes()),
            }],
        };

        debug!(key_id = %key_identity, "signed payload");
        envelope.to_wire().map_err(|e| SigningError::Backend {
            reason: format!("cannot serialize envelope: {e}"),
        })
    }

    fn verify(&self, wire: &[u8]) -> Result<SignedContent, VerificationError> {
        let envelope = DsseEnvelope::from_wire(wire)?;
        let content = envelope.decode_payload()?;
        let pae = build_pae(&envelope.payload_type, &content);

        let mut last_error = VerificationError::CorruptSignature {
            reason: "envelope has no signatures".to_string(),
        };
        for signature in &envelope.signatures {
            match self.verify_one(&pae, signature) {
                Ok(()) => {
                    debug!(key_id = %signature.key_id, "signature verified");
                    return Ok(SignedContent {
                        content,
                        signer: signature.key_id.clone(),
                    });
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// Drops all unlocked private key material. Public keys stay trusted,
    /// so a closed keyring can still verify.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.unlocked.clear();
        self.locked.clear();
        self.closed = true;
    }
}

impl Drop for KeyringMechanism {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for KeyringMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringMechanism")
            .field("public_keys", &self.key_identities())
            .field("unlocked", &self.unlocked.len())
            .field("locked", &self.locked.len())
            .field("can_sign", &self.can_sign)
            .field("closed", &self.closed)
            .finish()
    }
}
