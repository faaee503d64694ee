// OAuth2 base scheme, the part every OAuth2 driver shares: building the
// authorization URL and trading an authorization code for tokens.
//
// Drivers compose a `TokenExchangeClient` instead of re-implementing this.

use std::collections::HashMap;

use async_trait::async_trait;

use ally_core::error::Result;

use crate::authorization_url::{AuthorizationUrlParams, QueryParams, create_authorization_url};
use crate::code_exchange::{CodeExchangeParams, exchange_code_for_token};
use crate::tokens::AccessTokenResult;

/// The OAuth2 capabilities a provider driver relies on.
#[async_trait]
pub trait TokenExchangeClient: Send + Sync + std::fmt::Debug {
    /// Build the provider authorization URL.
    fn build_authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        scope_separator: &str,
        options: &QueryParams,
    ) -> String;

    /// Exchange an authorization code for tokens.
    async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
        extra_params: &QueryParams,
    ) -> Result<AccessTokenResult>;
}

/// Standard OAuth2 scheme talking to `{base_url}{authorize_path}` and
/// `{base_url}{access_token_path}`.
#[derive(Clone)]
pub struct OAuth2Scheme {
    client_id: String,
    client_secret: String,
    headers: HashMap<String, String>,
    base_url: String,
    authorize_path: String,
    access_token_path: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for OAuth2Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Scheme")
            .field("client_id", &self.client_id)
            .field("base_url", &self.base_url)
            .field("authorize_path", &self.authorize_path)
            .field("access_token_path", &self.access_token_path)
            .finish()
    }
}

impl OAuth2Scheme {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            headers,
            base_url: String::new(),
            authorize_path: String::new(),
            access_token_path: String::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Set the provider endpoints. Paths are appended to `base_url` verbatim.
    pub fn with_endpoints(
        mut self,
        base_url: impl Into<String>,
        authorize_path: impl Into<String>,
        access_token_path: impl Into<String>,
    ) -> Self {
        self.base_url = base_url.into();
        self.authorize_path = authorize_path.into();
        self.access_token_path = access_token_path.into();
        self
    }

    /// Share an existing HTTP client (connection pool, timeouts, proxies).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn authorization_endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.authorize_path)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.access_token_path)
    }
}

#[async_trait]
impl TokenExchangeClient for OAuth2Scheme {
    fn build_authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        scope_separator: &str,
        options: &QueryParams,
    ) -> String {
        create_authorization_url(AuthorizationUrlParams {
            authorization_endpoint: &self.authorization_endpoint(),
            client_id: &self.client_id,
            redirect_uri,
            scopes,
            scope_separator,
            options,
        })
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
        extra_params: &QueryParams,
    ) -> Result<AccessTokenResult> {
        exchange_code_for_token(
            &self.http,
            CodeExchangeParams {
                code,
                redirect_uri,
                token_endpoint: &self.token_endpoint(),
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                headers: &self.headers,
                extra_params,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_join_base_url() {
        let scheme = OAuth2Scheme::new("id", "secret", HashMap::new()).with_endpoints(
            "https://bitbucket.org/",
            "site/oauth2/authorize",
            "site/oauth2/access_token",
        );
        assert_eq!(
            scheme.authorization_endpoint(),
            "https://bitbucket.org/site/oauth2/authorize"
        );
        assert_eq!(
            scheme.token_endpoint(),
            "https://bitbucket.org/site/oauth2/access_token"
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let scheme = OAuth2Scheme::new("id", "top-secret", HashMap::new());
        assert!(!format!("{scheme:?}").contains("top-secret"));
    }
}
