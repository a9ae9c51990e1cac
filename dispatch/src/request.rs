//! Logical push requests and the device records they target.

use crate::id::generate_id;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use url::Url;

/// Volume the server applies when none is sent.
pub const DEFAULT_VOLUME: u8 = 5;

/// Highest accepted volume.
pub const MAX_VOLUME: u8 = 10;

/// Wire protocol generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V1,
    V2,
}

/// Interruption level of a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    Critical,
    Active,
    TimeSensitive,
    Passive,
}

impl Level {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Critical => "critical",
            Level::Active => "active",
            Level::TimeSensitive => "timeSensitive",
            Level::Passive => "passive",
        }
    }
}

/// Notification volume in `0..=10`.
///
/// Deserializes from either a number or a numeric string, since settings
/// written by other clients store it as text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Volume(pub u8);

impl Volume {
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_VOLUME
    }
}

impl<'de> Deserialize<'de> for Volume {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u8),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Volume(n)),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map(Volume)
                .map_err(|_| serde::de::Error::custom(format!("invalid volume: {s:?}"))),
        }
    }
}

/// Basic authorization credentials for a device server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Pre-encoded `Authorization` header value. Takes precedence when set.
    #[serde(default)]
    pub header: Option<String>,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            header: None,
        }
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        match &self.header {
            Some(header) if !header.is_empty() => header.clone(),
            _ => format!(
                "Basic {}",
                BASE64_STANDARD.encode(format!("{}:{}", self.username, self.password))
            ),
        }
    }
}

/// A registered target device. Owned by the device-management collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device API base, e.g. `https://api.day.app/KEY/`.
    pub api_url: Url,
    /// Server origin the device is registered on.
    #[serde(default)]
    pub server: Option<String>,
    pub device_key: String,
    #[serde(default)]
    pub authorization: Option<BasicAuth>,
}

/// A push as composed by the user.
///
/// Optional fields left as `None` never reach the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct PushRequest {
    pub id: String,
    pub message: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub sound: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub group: Option<String>,
    pub badge: Option<i64>,
    pub level: Option<Level>,
    pub volume: Option<Volume>,
    pub call: bool,
    pub auto_copy: bool,
    pub copy: Option<String>,
    pub is_archive: bool,
    /// Sends `action=none` when set.
    pub no_action: bool,
    pub image: Option<String>,
    /// Explicit device key; derived from `api_url` when absent.
    pub device_key: Option<String>,
    pub api_url: Url,
    pub authorization: Option<BasicAuth>,
    /// Full device records for v2 batching.
    pub devices: Vec<Device>,
}

impl PushRequest {
    /// New request with a fresh identifier and automatic copy enabled.
    pub fn new(message: impl Into<String>, api_url: Url) -> Self {
        Self {
            id: generate_id(),
            message: message.into(),
            title: None,
            subtitle: None,
            sound: None,
            url: None,
            icon: None,
            group: None,
            badge: None,
            level: None,
            volume: None,
            call: false,
            auto_copy: true,
            copy: None,
            is_archive: false,
            no_action: false,
            image: None,
            device_key: None,
            api_url,
            authorization: None,
            devices: Vec::new(),
        }
    }

    /// Request addressed to `device`, carrying its credentials.
    pub fn for_device(message: impl Into<String>, device: &Device) -> Self {
        let mut request = Self::new(message, device.api_url.clone());
        request.device_key = Some(device.device_key.clone());
        request.authorization = device.authorization.clone();
        request
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_devices(mut self, devices: Vec<Device>) -> Self {
        self.devices = devices;
        self
    }

    /// Device key for single-device v2 requests.
    ///
    /// Falls back to the last non-empty path segment of `api_url`.
    pub fn device_key(&self) -> Option<String> {
        if let Some(key) = self.device_key.as_deref().filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }

        self.api_url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .last()
            .map(String::from)
    }

    /// Caller-side sanity checks. The dispatcher does not run these.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.message.trim().is_empty() {
            return Err(RequestError::EmptyMessage);
        }
        if let Some(volume) = self.volume {
            if volume.0 > MAX_VOLUME {
                return Err(RequestError::VolumeOutOfRange(volume.0));
            }
        }
        if let Some(badge) = self.badge {
            if badge < 0 {
                return Err(RequestError::NegativeBadge(badge));
            }
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Volume must be between 0 and 10, got {0}")]
    VolumeOutOfRange(u8),
    #[error("Badge cannot be negative, got {0}")]
    NegativeBadge(i64),
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::V1 => f.write_str("v1"),
            ApiVersion::V2 => f.write_str("v2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_new_request_defaults() {
        let request = PushRequest::new("hello", url("https://x.test/KEY123/"));
        assert!(!request.id.is_empty());
        assert!(request.auto_copy);
        assert!(request.devices.is_empty());
        assert_eq!(request.validate(), Ok(()));
    }

    #[test]
    fn test_device_key_derivation() {
        let request = PushRequest::new("hi", url("https://x.test/KEY123/"));
        assert_eq!(request.device_key().as_deref(), Some("KEY123"));

        let mut request = PushRequest::new("hi", url("https://x.test/KEY123"));
        assert_eq!(request.device_key().as_deref(), Some("KEY123"));

        request.device_key = Some("EXPLICIT".into());
        assert_eq!(request.device_key().as_deref(), Some("EXPLICIT"));

        let request = PushRequest::new("hi", url("https://x.test/"));
        assert_eq!(request.device_key(), None);
    }

    #[test]
    fn test_validation() {
        let mut request = PushRequest::new("  ", url("https://x.test/K/"));
        assert_eq!(request.validate(), Err(RequestError::EmptyMessage));

        request.message = "hi".into();
        request.volume = Some(Volume(11));
        assert_eq!(request.validate(), Err(RequestError::VolumeOutOfRange(11)));

        request.volume = Some(Volume(10));
        request.badge = Some(-1);
        assert_eq!(request.validate(), Err(RequestError::NegativeBadge(-1)));
    }

    #[test]
    fn test_basic_auth_header() {
        let auth = BasicAuth::new("user", "pass");
        assert_eq!(auth.header_value(), "Basic dXNlcjpwYXNz");

        let auth = BasicAuth {
            header: Some("Basic cHJlOmVuY29kZWQ=".into()),
            ..BasicAuth::new("ignored", "ignored")
        };
        assert_eq!(auth.header_value(), "Basic cHJlOmVuY29kZWQ=");
    }

    #[test]
    fn test_volume_deserialization() {
        assert_eq!(serde_json::from_str::<Volume>("5").unwrap(), Volume(5));
        assert_eq!(serde_json::from_str::<Volume>("\"7\"").unwrap(), Volume(7));
        assert!(serde_json::from_str::<Volume>("\"loud\"").is_err());
    }

    #[test]
    fn test_level_names() {
        assert_eq!(
            serde_json::from_str::<Level>("\"timeSensitive\"").unwrap(),
            Level::TimeSensitive
        );
        assert_eq!(Level::TimeSensitive.as_str(), "timeSensitive");
    }
}
