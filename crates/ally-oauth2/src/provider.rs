// AllyDriver trait: the surface every social login driver exposes to the
// host application.

use std::collections::HashMap;

use async_trait::async_trait;

use ally_core::error::Result;
use ally_core::user::AllyUser;

/// Query string the provider redirected back with.
pub type CallbackParams = HashMap<String, String>;

/// Message used when the provider gives no reason for a failed redirect.
pub const DEFAULT_REDIRECT_ERROR: &str = "Oauth failed during redirect";

/// A social login driver.
#[async_trait]
pub trait AllyDriver: Send + Sync + std::fmt::Debug {
    /// Unique driver identifier (e.g., "bitbucket").
    fn id(&self) -> &str;

    /// Character used to join scopes.
    fn scope_separator(&self) -> &str {
        " "
    }

    /// Whether the driver round-trips a CSRF state through the redirect.
    fn supports_state(&self) -> bool {
        true
    }

    /// URL to send the user to for authorization.
    fn get_redirect_url(&self, state: Option<&str>) -> String;

    /// Human-readable message for a redirect that came back without a code.
    fn parse_redirect_error(&self, query: &CallbackParams) -> String {
        ["error_description", "error"]
            .iter()
            .filter_map(|key| query.get(*key))
            .find(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_REDIRECT_ERROR.to_string())
    }

    /// Complete the authorization-code flow and return the user.
    async fn get_user(
        &self,
        query: &CallbackParams,
        original_state: Option<&str>,
    ) -> Result<AllyUser>;

    /// Fetch the user for an access token obtained elsewhere.
    async fn get_user_by_token(&self, access_token: &str) -> Result<AllyUser>;
}
