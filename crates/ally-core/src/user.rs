// AllyUser, the normalized, provider-agnostic identity returned by every
// driver once an OAuth flow completes.

use serde::{Deserialize, Serialize};

/// Canonical profile fields extracted from a provider payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFields {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

/// Token data attached to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Only set by OAuth1 providers.
    pub token_secret: Option<String>,
    /// Seconds until the access token expires, when the provider says.
    pub expires_in: Option<u64>,
}

/// Authenticated user, as handed to the host application.
///
/// Built once per successful flow and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllyUser {
    #[serde(flatten)]
    fields: UserFields,
    #[serde(flatten)]
    token: UserToken,
    /// Raw provider payload the fields were read from.
    original: serde_json::Value,
}

impl AllyUser {
    pub fn new(original: serde_json::Value, fields: UserFields, token: UserToken) -> Self {
        Self {
            fields,
            token,
            original,
        }
    }

    pub fn id(&self) -> &str {
        &self.fields.id
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.fields.email.as_deref()
    }

    pub fn nickname(&self) -> Option<&str> {
        self.fields.nickname.as_deref()
    }

    pub fn avatar(&self) -> Option<&str> {
        self.fields.avatar.as_deref()
    }

    pub fn access_token(&self) -> &str {
        &self.token.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.token.refresh_token.as_deref()
    }

    pub fn token_secret(&self) -> Option<&str> {
        self.token.token_secret.as_deref()
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.token.expires_in
    }

    pub fn original(&self) -> &serde_json::Value {
        &self.original
    }

    pub fn fields(&self) -> &UserFields {
        &self.fields
    }

    pub fn token(&self) -> &UserToken {
        &self.token
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
