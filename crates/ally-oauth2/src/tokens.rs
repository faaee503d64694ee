// OAuth2 token response parsing.
//
// Providers disagree on naming and encoding: most answer with JSON, some with
// a form-urlencoded body, and `expires_in` shows up as a number or a string.
// Everything is normalized into `AccessTokenResult` here.

use serde::{Deserialize, Deserializer, Serialize};

/// Result of a successful authorization-code exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResult {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Raw token response, preserves provider-specific fields.
    pub raw: serde_json::Value,
}

/// Raw token response (snake_case wire format).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl AccessTokenResult {
    /// Parse a provider token response. `None` when it carries no access token.
    pub fn from_raw(data: &serde_json::Value) -> Option<Self> {
        let raw: RawTokenResponse = serde_json::from_value(data.clone()).unwrap_or_default();
        let access_token = raw.access_token.filter(|t| !t.is_empty())?;

        Some(Self {
            access_token,
            refresh_token: raw.refresh_token.filter(|t| !t.is_empty()),
            expires_in: raw.expires_in,
            token_type: raw.token_type,
            scope: raw.scope,
            raw: data.clone(),
        })
    }
}

/// Decode a token endpoint body: JSON first, form-urlencoded as fallback.
pub fn parse_token_body(body: &str) -> serde_json::Value {
    let parsed = serde_json::from_str::<serde_json::Value>(body);
    if let Ok(value @ serde_json::Value::Object(_)) = parsed {
        return value;
    }

    let object = url::form_urlencoded::parse(body.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(object)
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
