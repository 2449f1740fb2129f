//! Credentials and endpoints read once at startup.
//!
//! Settings are collected by the binary and handed to every factory. A
//! missing credential is only an error for the actors that need it, and it
//! surfaces when such an actor is built.

use deckhand_core::{Error, Result};

/// Default packagecloud API root.
pub const PACKAGECLOUD_ENDPOINT: &str = "https://packagecloud.io/api/v1/";

/// AWS access keys, possibly absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// AWS access keys known to be present.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for AwsKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsKeys")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

impl AwsCredentials {
    /// Create credentials from both keys.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: Some(access_key_id.into()),
            secret_access_key: Some(secret_access_key.into()),
        }
    }

    /// Both keys, or a configuration error naming the first missing one.
    pub fn require(&self) -> Result<AwsKeys> {
        Ok(AwsKeys {
            access_key_id: required(&self.access_key_id, "AWS", "AWS_ACCESS_KEY_ID")?,
            secret_access_key: required(&self.secret_access_key, "AWS", "AWS_SECRET_ACCESS_KEY")?,
        })
    }
}

/// packagecloud account and API token, possibly absent.
#[derive(Clone, PartialEq, Eq)]
pub struct PackagecloudSettings {
    pub account: Option<String>,
    pub token: Option<String>,
    /// API root, ending with a slash.
    pub endpoint: String,
}

impl std::fmt::Debug for PackagecloudSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackagecloudSettings")
            .field("account", &self.account)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Default for PackagecloudSettings {
    fn default() -> Self {
        Self {
            account: None,
            token: None,
            endpoint: PACKAGECLOUD_ENDPOINT.to_string(),
        }
    }
}

/// packagecloud credentials known to be present.
#[derive(Clone, PartialEq, Eq)]
pub struct PackagecloudKeys {
    pub account: String,
    pub token: String,
    pub endpoint: String,
}

impl PackagecloudSettings {
    /// Create settings for `account` against the public endpoint.
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Point the client at another API root.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        self.endpoint = endpoint;
        self
    }

    /// Account and token, or a configuration error naming the missing one.
    pub fn require(&self) -> Result<PackagecloudKeys> {
        Ok(PackagecloudKeys {
            account: required(&self.account, "packagecloud", "PACKAGECLOUD_ACCOUNT")?,
            token: required(&self.token, "packagecloud", "PACKAGECLOUD_TOKEN")?,
            endpoint: self.endpoint.clone(),
        })
    }
}

/// Everything the built-in actors read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub aws: AwsCredentials,
    pub packagecloud: PackagecloudSettings,
}

fn required(value: &Option<String>, service: &str, variable: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::missing_credentials(service, variable))
}
