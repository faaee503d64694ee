// Authorization URL builder.
//
// Query parameters keep insertion order so the same inputs always render the
// same URL: `redirect_uri`, `scope`, the caller's redirect options, then
// `client_id`.

/// Ordered query parameters. Setting an existing key replaces its value in
/// place; new keys are appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
        self
    }

    /// Merge `other` over `self`, key by key.
    pub fn merge(&mut self, other: &QueryParams) -> &mut Self {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build from a JSON object. Strings are used as-is, other scalars by
    /// their JSON rendering; `null` entries are dropped.
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut params = Self::new();
        for (key, value) in object {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => {
                    params.set(key.clone(), s.clone());
                }
                other => {
                    params.set(key.clone(), other.to_string());
                }
            }
        }
        params
    }

    /// Render as `k=v&k=v`, percent-encoding keys and values (space as `%20`).
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// Parameters for building an authorization URL.
#[derive(Debug, Clone)]
pub struct AuthorizationUrlParams<'a> {
    /// Full authorization endpoint (base URL + authorize path).
    pub authorization_endpoint: &'a str,
    /// OAuth client ID.
    pub client_id: &'a str,
    /// Redirect URI for the callback.
    pub redirect_uri: &'a str,
    /// Requested scopes.
    pub scopes: &'a [String],
    /// Join character for scopes.
    pub scope_separator: &'a str,
    /// Extra query parameters (`response_type`, `state`, ...).
    pub options: &'a QueryParams,
}

/// Build an OAuth2 authorization URL.
pub fn create_authorization_url(params: AuthorizationUrlParams<'_>) -> String {
    let mut query = QueryParams::new();
    query
        .set("redirect_uri", params.redirect_uri)
        .set("scope", params.scopes.join(params.scope_separator))
        .merge(params.options)
        .set("client_id", params.client_id);

    format!("{}?{}", params.authorization_endpoint, query.to_query_string())
}
