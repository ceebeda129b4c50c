use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authenticated user as handed back by the wrapped OIDC client
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct User {
    pub id_token: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    /// Space separated scopes granted by the provider
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub profile: Map<String, Value>,
    /// Access token expiry in seconds since the epoch
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub session_state: Option<String>,
}

impl User {
    /// Granted scopes split on whitespace
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|scope| scope.split_whitespace().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Seconds until the access token expires, negative once it has
    #[must_use]
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_at
            .map(|expires_at| expires_at - Utc::now().timestamp())
    }

    /// Users without `expires_at` never expire
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires_in().is_some_and(|remaining| remaining <= 0)
    }

    /// The `sub` claim of the profile, if any
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.profile.get("sub").and_then(Value::as_str)
    }
}

/// Options forwarded to a sign-in flow of the wrapped client
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SigninOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_replace_to_navigate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_user_info: Option<bool>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_query_params: Map<String, Value>,
    /// Anything else the client understands
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Arguments for the sign-out flows
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SignoutArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload accepted by the sign-in actions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthenticatePayload {
    /// Overrides the per-flow defaults from the store settings
    pub options: Option<SigninOptions>,
    /// Resolve with `None` instead of recording an error (silent flow only)
    pub ignore_errors: bool,
    /// Route to return to after an interactive sign-in
    pub redirect_path: Option<String>,
}

impl AuthenticatePayload {
    #[must_use]
    pub fn ignoring_errors() -> Self {
        Self {
            ignore_errors: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_redirect_path(path: impl Into<String>) -> Self {
        Self {
            redirect_path: Some(path.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SigninOptions) -> Self {
        self.options = Some(options);
        self
    }
}

impl From<&str> for AuthenticatePayload {
    fn from(redirect_path: &str) -> Self {
        Self::with_redirect_path(redirect_path)
    }
}

/// Local error wrapped for the relay
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorPayload {
    pub context: String,
    pub error: String,
}

impl ErrorPayload {
    #[must_use]
    pub fn new(context: &str, error: impl std::fmt::Display) -> Self {
        Self {
            context: context.to_string(),
            error: error.to_string(),
        }
    }
}

/// Per-route metadata record
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetaRecord {
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_oidc_callback: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Route metadata: a single record, or one record per matched route
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum RouteMeta {
    Single(RouteMetaRecord),
    Matched(Vec<RouteMetaRecord>),
}

impl Default for RouteMeta {
    fn default() -> Self {
        RouteMeta::Single(RouteMetaRecord::default())
    }
}

impl RouteMeta {
    fn any(&self, predicate: impl Fn(&RouteMetaRecord) -> bool) -> bool {
        match self {
            RouteMeta::Single(record) => predicate(record),
            RouteMeta::Matched(records) => records.iter().any(predicate),
        }
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.any(|record| record.is_public)
    }

    #[must_use]
    pub fn is_oidc_callback(&self) -> bool {
        self.any(|record| record.is_oidc_callback)
    }
}

/// Navigation target handed over by the host router
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub path: String,
    /// Path including query and hash, used as the return-to route
    #[serde(default)]
    pub full_path: String,
    #[serde(default)]
    pub meta: RouteMeta,
}

impl Route {
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            full_path: path.to_string(),
            meta: RouteMeta::default(),
        }
    }

    #[must_use]
    pub fn with_full_path(mut self, full_path: &str) -> Self {
        self.full_path = full_path.to_string();
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.meta = RouteMeta::Single(RouteMetaRecord {
            is_public: true,
            ..RouteMetaRecord::default()
        });
        self
    }

    #[must_use]
    pub fn oidc_callback(mut self) -> Self {
        self.meta = RouteMeta::Single(RouteMetaRecord {
            is_oidc_callback: true,
            ..RouteMetaRecord::default()
        });
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }
}
