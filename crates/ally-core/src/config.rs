// Driver configuration, resolved once from a key-value accessor at
// construction time and validated before any network call is made.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AllyError, Result};

/// Key-value accessor the host application hands to a driver.
///
/// Keys are dotted paths such as `services.ally.bitbucket`.
pub trait ConfigProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
}

impl ConfigProvider for serde_json::Value {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut current = self;
        for part in key.split('.') {
            current = current.as_object()?.get(part)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current.clone())
        }
    }
}

impl ConfigProvider for HashMap<String, serde_json::Value> {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        HashMap::get(self, key).filter(|v| !v.is_null()).cloned()
    }
}

/// Reads driver settings from `ALLY_<DRIVER>_*` environment variables.
///
/// `ALLY_BITBUCKET_CLIENT_ID`, `ALLY_BITBUCKET_CLIENT_SECRET`,
/// `ALLY_BITBUCKET_REDIRECT_URI` and the optional `ALLY_BITBUCKET_SCOPE`
/// (space or comma separated) answer the key `services.ally.bitbucket`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    overrides: HashMap<String, String>,
}

impl EnvConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a variable instead of reading it from the process environment.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    fn var(&self, name: &str) -> Option<String> {
        self.overrides
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
            .filter(|v| !v.trim().is_empty())
    }
}

impl ConfigProvider for EnvConfig {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let driver = key.strip_prefix("services.ally.")?;
        let prefix = format!("ALLY_{}", driver.to_uppercase().replace(['-', '.'], "_"));

        let mut object = serde_json::Map::new();
        for (field, suffix) in [
            ("clientId", "CLIENT_ID"),
            ("clientSecret", "CLIENT_SECRET"),
            ("redirectUri", "REDIRECT_URI"),
        ] {
            if let Some(value) = self.var(&format!("{prefix}_{suffix}")) {
                object.insert(field.to_string(), serde_json::Value::String(value));
            }
        }
        if let Some(scope) = self.var(&format!("{prefix}_SCOPE")) {
            let scopes = scope
                .split([' ', ','])
                .filter(|s| !s.is_empty())
                .map(|s| serde_json::Value::String(s.to_string()))
                .collect();
            object.insert("scope".to_string(), serde_json::Value::Array(scopes));
        }

        if object.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(object))
        }
    }
}

/// Configuration for a single OAuth driver.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// OAuth client ID. Numeric IDs are accepted and kept in decimal form.
    #[serde(default, deserialize_with = "string_or_number")]
    pub client_id: String,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,

    /// Callback URL registered with the provider.
    #[serde(default)]
    pub redirect_uri: String,

    /// Requested scopes. Empty means "use the driver defaults".
    #[serde(default)]
    pub scope: Vec<String>,

    /// Extra query parameters merged into the authorization URL.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,

    /// Extra headers sent to the token endpoint.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("options", &self.options)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DriverConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scope: Vec::new(),
            options: serde_json::Map::new(),
            headers: HashMap::new(),
        }
    }

    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scope = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Config key under which a driver's settings live.
    pub fn key_for(driver: &str) -> String {
        format!("services.ally.{driver}")
    }

    /// Resolve and validate the config for `driver` from `provider`.
    ///
    /// Fails with [`AllyError::MissingConfig`] when the key is absent, cannot
    /// be read as a driver config, or any mandatory field is empty.
    pub fn resolve(provider: &dyn ConfigProvider, driver: &str) -> Result<Self> {
        let value = provider
            .get(&Self::key_for(driver))
            .ok_or_else(|| AllyError::missing_config(driver))?;

        let config: Self = serde_json::from_value(value).map_err(|e| {
            tracing::warn!(driver, error = %e, "Unreadable driver config");
            AllyError::missing_config(driver)
        })?;

        config.validate(driver)?;
        tracing::debug!(driver, config = ?config, "Resolved driver config");
        Ok(config)
    }

    /// Check that `clientId`, `clientSecret` and `redirectUri` are all set.
    pub fn validate(&self, driver: &str) -> Result<()> {
        let missing = [
            ("clientId", &self.client_id),
            ("clientSecret", &self.client_secret),
            ("redirectUri", &self.redirect_uri),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        match missing {
            Some((field, _)) => {
                tracing::warn!(driver, field, "Driver config is missing a required field");
                Err(AllyError::missing_config(driver))
            }
            None => Ok(()),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}
