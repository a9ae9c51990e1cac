use crate::crypto::EncryptionConfig;
use crate::http::DEFAULT_TIMEOUT;
use crate::request::{ApiVersion, PushRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Timeout cannot be 0")]
    InvalidTimeout,

    #[error("Encryption is enabled but no key is configured")]
    MissingEncryptionKey,

    #[error("{algorithm} requires a {expected} character key, got {actual}")]
    KeyLengthMismatch {
        algorithm: String,
        expected: usize,
        actual: usize,
    },
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// App-level settings read once per dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Send through the v2 JSON API
    #[serde(default)]
    pub enable_api_v2: bool,
    #[serde(default)]
    pub enable_encryption: bool,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    /// Sound applied to requests that do not choose one
    #[serde(default)]
    pub sound: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_api_v2: false,
            enable_encryption: false,
            encryption: EncryptionConfig::default(),
            sound: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn api_version(&self) -> ApiVersion {
        if self.enable_api_v2 {
            ApiVersion::V2
        } else {
            ApiVersion::V1
        }
    }

    /// Encryption settings, only when encryption is switched on.
    pub fn active_encryption(&self) -> Option<&EncryptionConfig> {
        self.enable_encryption.then_some(&self.encryption)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fill request fields the user left to the settings.
    pub fn apply_defaults(&self, request: &mut PushRequest) {
        if request.sound.is_none() {
            request.sound = self.sound.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if self.enable_encryption {
            let key = self
                .encryption
                .key()
                .ok_or(ValidationError::MissingEncryptionKey)?;
            let expected = self.encryption.algorithm.key_len();
            if key.len() != expected {
                return Err(ValidationError::KeyLengthMismatch {
                    algorithm: self.encryption.algorithm.to_string(),
                    expected,
                    actual: key.len(),
                });
            }
        }

        Ok(())
    }
}
