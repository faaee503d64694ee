// Authorization code exchange.
//
// POSTs the code with the client credentials to the provider's token endpoint
// and normalizes the answer into an `AccessTokenResult`.

use std::collections::HashMap;

use ally_core::error::{AllyError, Result};

use crate::authorization_url::QueryParams;
use crate::tokens::{AccessTokenResult, parse_token_body};

/// Parameters for exchanging an authorization code.
#[derive(Debug, Clone)]
pub struct CodeExchangeParams<'a> {
    /// The authorization code from the callback.
    pub code: &'a str,
    /// The redirect URI (must match the one used in the auth request).
    pub redirect_uri: &'a str,
    /// Token endpoint URL.
    pub token_endpoint: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    /// Additional request headers.
    pub headers: &'a HashMap<String, String>,
    /// Additional body parameters, e.g. `grant_type`.
    pub extra_params: &'a QueryParams,
}

/// Exchange an authorization code for an access token.
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    params: CodeExchangeParams<'_>,
) -> Result<AccessTokenResult> {
    let mut form = params.extra_params.clone();
    form.set("redirect_uri", params.redirect_uri)
        .set("client_id", params.client_id)
        .set("client_secret", params.client_secret)
        .set("code", params.code);

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    for (key, value) in params.headers {
        match (
            reqwest::header::HeaderName::from_bytes(key.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(val)) => {
                headers.insert(name, val);
            }
            _ => tracing::warn!(header = %key, "Skipping invalid token request header"),
        }
    }

    tracing::debug!(endpoint = params.token_endpoint, "Exchanging authorization code");

    let response = client
        .post(params.token_endpoint)
        .headers(headers)
        .form(&form.into_pairs())
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Token endpoint request failed");
            AllyError::token_exchange(format!("Token endpoint request failed: {e}"))
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| AllyError::TokenExchange {
        message: format!("Failed to read token response: {e}"),
        status: Some(status.as_u16()),
        response: None,
    })?;
    let data = parse_token_body(&body);

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "Token endpoint rejected the code");
        let message = provider_error_message(&data)
            .unwrap_or_else(|| format!("Token endpoint returned {status}"));
        return Err(AllyError::TokenExchange {
            message,
            status: Some(status.as_u16()),
            response: Some(body),
        });
    }

    AccessTokenResult::from_raw(&data).ok_or_else(|| AllyError::TokenExchange {
        message: provider_error_message(&data)
            .unwrap_or_else(|| "Token response did not include an access token".to_string()),
        status: Some(status.as_u16()),
        response: Some(body),
    })
}

/// `error_description`, falling back to `error`, from a provider error body.
fn provider_error_message(data: &serde_json::Value) -> Option<String> {
    ["error_description", "error"]
        .iter()
        .filter_map(|key| data.get(*key))
        .find_map(|v| match v {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Object(_) => v
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message_precedence() {
        let data = serde_json::json!({ "error": "invalid_grant", "error_description": "Bad code" });
        assert_eq!(provider_error_message(&data).as_deref(), Some("Bad code"));

        let data = serde_json::json!({ "error": "invalid_grant" });
        assert_eq!(provider_error_message(&data).as_deref(), Some("invalid_grant"));

        let data = serde_json::json!({ "type": "error", "error": { "message": "Nope" } });
        assert_eq!(provider_error_message(&data).as_deref(), Some("Nope"));

        assert!(provider_error_message(&serde_json::json!({})).is_none());
    }
}
