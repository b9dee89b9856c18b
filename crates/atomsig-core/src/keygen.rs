//! Key pair generation and storage.
//!
//! Private keys are PKCS#8 PEM. With a passphrase they are encrypted with
//! PBES2 (PBKDF2-SHA256 key derivation, AES-256-CBC).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ed25519_dalek::pkcs8::{EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::SigningKey;
use pkcs8::pkcs5::pbes2;
use pkcs8::{LineEnding, PrivateKeyInfo};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{SignatureError, SignatureResult};
use crate::mechanism::keyring::{
    compute_key_id_from_key, key_file_stem, ENCRYPTED_PRIVATE_KEY_LABEL,
};
use crate::mechanism::validate_passphrase;

/// PBKDF2 iteration count for encrypted private keys.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// A freshly generated key pair.
pub struct GeneratedKey {
    /// `sha256:<hex>` of the public key's SPKI DER.
    pub key_id: String,
    /// PKCS#8 private key PEM (encrypted when `encrypted` is set).
    pub private_pem: Zeroizing<String>,
    /// SPKI public key PEM.
    pub public_pem: String,
    pub encrypted: bool,
}

impl std::fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("key_id", &self.key_id)
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}

/// Paths written by [`write_key_pair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Generate a new Ed25519 key pair, optionally passphrase-protected.
pub fn generate_key(passphrase: Option<&str>) -> SignatureResult<GeneratedKey> {
    if let Some(passphrase) = passphrase {
        validate_passphrase(passphrase)?;
    }

    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    let verifying_key = signing_key.verifying_key();

    let key_id = compute_key_id_from_key(&verifying_key).map_err(keyring_error)?;
    let public_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(keyring_error)?;
    let private_pem = encode_private_key(&signing_key, passphrase)?;

    Ok(GeneratedKey {
        key_id,
        private_pem,
        public_pem,
        encrypted: passphrase.is_some(),
    })
}

/// Encode a private key as PKCS#8 PEM, encrypting it when a passphrase is given.
pub fn encode_private_key(
    key: &SigningKey,
    passphrase: Option<&str>,
) -> SignatureResult<Zeroizing<String>> {
    let Some(passphrase) = passphrase else {
        return key.to_pkcs8_pem(LineEnding::LF).map_err(keyring_error);
    };

    let der = key.to_pkcs8_der().map_err(keyring_error)?;
    let info = PrivateKeyInfo::try_from(der.as_bytes()).map_err(keyring_error)?;

    let mut salt = [0u8; 16];
    let mut iv = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(PBKDF2_ITERATIONS, &salt, &iv)
        .map_err(keyring_error)?;
    let encrypted = info
        .encrypt_with_params(params, passphrase.as_bytes())
        .map_err(keyring_error)?;

    encrypted
        .to_pem(ENCRYPTED_PRIVATE_KEY_LABEL, LineEnding::LF)
        .map_err(keyring_error)
}

/// Write `<hex>.pem` and `<hex>.pub.pem` into `dir`.
///
/// Existing files are never overwritten.
pub fn write_key_pair(dir: &Path, key: &GeneratedKey) -> SignatureResult<KeyPairPaths> {
    let stem = key_file_stem(&key.key_id).ok_or_else(|| SignatureError::Keyring {
        message: format!("invalid key id: {}", key.key_id),
    })?;

    let paths = KeyPairPaths {
        private_key: dir.join(format!("{stem}.pem")),
        public_key: dir.join(format!("{stem}.pub.pem")),
    };

    if paths.public_key.exists() {
        return Err(already_exists(&paths.public_key));
    }

    fs::create_dir_all(dir).map_err(|e| SignatureError::Keyring {
        message: format!("cannot create {}: {e}", dir.display()),
    })?;
    write_new_file(&paths.private_key, key.private_pem.as_bytes(), 0o600)?;
    write_new_file(&paths.public_key, key.public_pem.as_bytes(), 0o644)?;

    tracing::info!(
        key_id = %key.key_id,
        path = %paths.private_key.display(),
        encrypted = key.encrypted,
        "wrote key pair"
    );
    Ok(paths)
}

/// Create `path` with `mode` from the start. Fails if it already exists.
fn write_new_file(path: &Path, contents: &[u8], mode: u32) -> SignatureResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            already_exists(path)
        } else {
            SignatureError::Keyring {
                message: format!("cannot create {}: {e}", path.display()),
            }
        }
    })?;
    file.write_all(contents)
        .and_then(|()| file.sync_all())
        .map_err(|e| SignatureError::Keyring {
            message: format!("cannot write {}: {e}", path.display()),
        })
}

fn already_exists(path: &Path) -> SignatureError {
    SignatureError::Keyring {
        message: format!("{} already exists", path.display()),
    }
}

fn keyring_error(e: impl std::fmt::Display) -> SignatureError {
    SignatureError::Keyring {
        message: e.to_string(),
    }
}
