//! Environment-driven configuration.

use std::path::{Path, PathBuf};

use crate::error::{SignatureError, SignatureResult};
use crate::mechanism::KeyringMechanism;

/// Where keys live and which one signs by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomsigConfig {
    /// Keyring directory.
    pub keyring_dir: PathBuf,

    /// Key identity used when none is given explicitly.
    pub default_key: Option<String>,
}

impl Default for AtomsigConfig {
    fn default() -> Self {
        Self {
            keyring_dir: default_keyring_dir(),
            default_key: None,
        }
    }
}

impl AtomsigConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `ATOMSIG_KEYRING_DIR` | Keyring directory |
    /// | `ATOMSIG_SIGN_BY` | Default signing key identity |
    pub fn from_env() -> Self {
        Self {
            keyring_dir: std::env::var_os("ATOMSIG_KEYRING_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_keyring_dir),
            default_key: std::env::var("ATOMSIG_SIGN_BY")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }

    /// Set the keyring directory.
    pub fn with_keyring_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keyring_dir = dir.into();
        self
    }

    /// Set the default signing key.
    pub fn with_default_key(mut self, key_identity: impl Into<String>) -> Self {
        self.default_key = Some(key_identity.into());
        self
    }

    /// Pick the signing key: explicit choice first, then the configured default.
    pub fn resolve_key(&self, explicit: Option<&str>) -> SignatureResult<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.default_key.clone())
            .ok_or_else(|| SignatureError::Config {
                message: "no signing key given and ATOMSIG_SIGN_BY is not set".to_string(),
            })
    }

    /// Open the configured keyring.
    pub fn open_keyring(&self) -> SignatureResult<KeyringMechanism> {
        KeyringMechanism::open(&self.keyring_dir)
    }

    pub fn keyring_dir(&self) -> &Path {
        &self.keyring_dir
    }
}

fn default_keyring_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("atomsig")
        .join("keyring")
}
