// Bitbucket driver.
//
// Flow: redirect to `site/oauth2/authorize`, trade the returned code at
// `site/oauth2/access_token`, then read `api/2.0/user` and
// `api/2.0/user/emails` in parallel and fold both into an `AllyUser`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use ally_core::config::{ConfigProvider, DriverConfig};
use ally_core::error::{AllyError, Result};
use ally_core::user::{AllyUser, UserFields, UserToken};

use crate::authorization_url::QueryParams;
use crate::provider::{AllyDriver, CallbackParams};
use crate::scheme::{OAuth2Scheme, TokenExchangeClient};

pub const BITBUCKET_BASE_URL: &str = "https://bitbucket.org/";
pub const AUTHORIZE_PATH: &str = "site/oauth2/authorize";
pub const ACCESS_TOKEN_PATH: &str = "site/oauth2/access_token";
pub const PROFILE_PATH: &str = "api/2.0/user";
pub const EMAILS_PATH: &str = "api/2.0/user/emails";
pub const DEFAULT_SCOPES: &[&str] = &["account", "email"];

const DRIVER_ID: &str = "bitbucket";

/// One entry of the `api/2.0/user/emails` page.
#[derive(Debug, Clone, Deserialize)]
pub struct BitbucketEmail {
    pub email: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_confirmed: bool,
}

/// Paginated response of `api/2.0/user/emails`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BitbucketEmailPage {
    #[serde(default)]
    pub values: Vec<BitbucketEmail>,
}

/// Email entry attached to the raw profile under `emails`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEntry {
    pub value: String,
    pub primary: bool,
    pub verified: bool,
}

impl From<&BitbucketEmail> for EmailEntry {
    fn from(email: &BitbucketEmail) -> Self {
        Self {
            value: email.email.clone(),
            primary: email.is_primary,
            verified: email.is_confirmed,
        }
    }
}

/// The profile fields the driver reads. Everything else stays in `original`.
#[derive(Debug, Default, Deserialize)]
struct BitbucketProfile {
    uuid: Option<String>,
    display_name: Option<String>,
    username: Option<String>,
    nickname: Option<String>,
    links: Option<ProfileLinks>,
    #[serde(default)]
    emails: Vec<EmailEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileLinks {
    avatar: Option<Link>,
}

#[derive(Debug, Default, Deserialize)]
struct Link {
    href: Option<String>,
}

/// Attach the email page to the raw profile as `emails: [{value, primary, verified}]`.
pub fn attach_emails(
    mut profile: serde_json::Value,
    emails: &BitbucketEmailPage,
) -> serde_json::Value {
    let entries: Vec<EmailEntry> = emails.values.iter().map(EmailEntry::from).collect();
    if let Some(object) = profile.as_object_mut() {
        object.insert(
            "emails".to_string(),
            serde_json::to_value(entries).unwrap_or_default(),
        );
    }
    profile
}

/// Build the normalized user from a merged profile.
///
/// The email is the first entry of `emails`, whether or not Bitbucket flags
/// it as primary.
pub fn normalize_user(profile: serde_json::Value, token: UserToken) -> Result<AllyUser> {
    let parsed: BitbucketProfile = serde_json::from_value(profile.clone()).map_err(|e| {
        AllyError::profile_fetch(format!("Unexpected Bitbucket profile shape: {e}"), None)
    })?;

    let id = parsed
        .uuid
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AllyError::profile_fetch("Bitbucket profile has no uuid", None))?;

    let fields = UserFields {
        id,
        name: parsed.display_name,
        email: parsed.emails.first().map(|e| e.value.clone()),
        nickname: parsed.username.or(parsed.nickname),
        avatar: parsed.links.and_then(|l| l.avatar).and_then(|a| a.href),
    };

    Ok(AllyUser::new(profile, fields, token))
}

/// Bitbucket OAuth2 driver.
///
/// Holds only immutable configuration, so one instance can serve any number
/// of concurrent logins.
#[derive(Debug, Clone)]
pub struct BitbucketDriver {
    config: DriverConfig,
    scope: Vec<String>,
    redirect_options: QueryParams,
    base_url: String,
    scheme: Arc<dyn TokenExchangeClient>,
    http: reqwest::Client,
}

impl BitbucketDriver {
    /// Build the driver from the `services.ally.bitbucket` config entry.
    pub fn new(config: &dyn ConfigProvider) -> Result<Self> {
        Self::with_base_url(config, BITBUCKET_BASE_URL)
    }

    /// Same as [`BitbucketDriver::new`] against another Bitbucket host.
    pub fn with_base_url(config: &dyn ConfigProvider, base_url: impl Into<String>) -> Result<Self> {
        let config = DriverConfig::resolve(config, DRIVER_ID)?;
        Self::from_config(config, base_url)
    }

    /// Build the driver from an already-resolved config.
    pub fn from_config(config: DriverConfig, base_url: impl Into<String>) -> Result<Self> {
        config.validate(DRIVER_ID)?;

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let mut redirect_options = QueryParams::new();
        redirect_options.set("response_type", "code");
        redirect_options.merge(&QueryParams::from_json_object(&config.options));

        let scope = if config.scope.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            config.scope.clone()
        };

        let http = reqwest::Client::new();
        let scheme = OAuth2Scheme::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.headers.clone(),
        )
        .with_endpoints(base_url.clone(), AUTHORIZE_PATH, ACCESS_TOKEN_PATH)
        .with_http_client(http.clone());

        Ok(Self {
            config,
            scope,
            redirect_options,
            base_url,
            scheme: Arc::new(scheme),
            http,
        })
    }

    /// Replace the OAuth2 base scheme used for URL building and code exchange.
    pub fn with_token_client(mut self, scheme: Arc<dyn TokenExchangeClient>) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str, access_token: &str) -> Result<T> {
        let url = format!(
            "{}{}?access_token={}",
            self.base_url,
            path,
            urlencoding::encode(access_token)
        );

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(path, error = %e, "Bitbucket request failed");
                AllyError::profile_fetch(format!("Request to {path} failed: {e}"), None)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "Bitbucket rejected profile request");
            return Err(AllyError::profile_fetch(
                format!("{path} returned {status}"),
                Some(status.as_u16()),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            AllyError::profile_fetch(
                format!("Failed to parse {path} response: {e}"),
                Some(status.as_u16()),
            )
        })
    }

    /// Profile and emails, fetched concurrently and merged.
    async fn get_user_detail(&self, access_token: &str) -> Result<serde_json::Value> {
        let (profile, emails) = tokio::try_join!(
            self.fetch_json::<serde_json::Value>(PROFILE_PATH, access_token),
            self.fetch_json::<BitbucketEmailPage>(EMAILS_PATH, access_token),
        )?;

        Ok(attach_emails(profile, &emails))
    }
}

#[async_trait]
impl AllyDriver for BitbucketDriver {
    fn id(&self) -> &str {
        DRIVER_ID
    }

    fn get_redirect_url(&self, state: Option<&str>) -> String {
        let mut options = self.redirect_options.clone();
        if let Some(state) = state.filter(|s| !s.is_empty()) {
            options.set("state", state);
        }

        self.scheme.build_authorization_url(
            &self.config.redirect_uri,
            &self.scope,
            self.scope_separator(),
            &options,
        )
    }

    async fn get_user(
        &self,
        query: &CallbackParams,
        original_state: Option<&str>,
    ) -> Result<AllyUser> {
        let Some(code) = query.get("code").filter(|c| !c.is_empty()) else {
            let message = self.parse_redirect_error(query);
            tracing::warn!(driver = DRIVER_ID, %message, "Redirect came back without a code");
            return Err(AllyError::TokenExchange {
                message: message.clone(),
                status: None,
                response: Some(message),
            });
        };

        if let Some(state) = query.get("state").filter(|s| !s.is_empty()) {
            if original_state != Some(state.as_str()) {
                tracing::warn!(driver = DRIVER_ID, "OAuth state mismatch");
                return Err(AllyError::InvalidState);
            }
        }

        let mut extra_params = QueryParams::new();
        extra_params.set("grant_type", "authorization_code");

        let tokens = self
            .scheme
            .exchange_code_for_token(code, &self.config.redirect_uri, &extra_params)
            .await?;
        tracing::debug!(driver = DRIVER_ID, "Authorization code exchanged");

        let profile = self.get_user_detail(&tokens.access_token).await?;

        normalize_user(
            profile,
            UserToken {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                token_secret: None,
                expires_in: tokens.expires_in,
            },
        )
    }

    async fn get_user_by_token(&self, access_token: &str) -> Result<AllyUser> {
        let profile = self.get_user_detail(access_token).await?;

        normalize_user(
            profile,
            UserToken {
                access_token: access_token.to_string(),
                ..Default::default()
            },
        )
    }
}
