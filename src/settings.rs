use crate::error::ConfigError;
use crate::models::{Route, SigninOptions};
use crate::utils::strings::{camel_case_to_snake_case, is_truthy, object_assign};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::sync::Arc;

/// Settings the wrapped client cannot work without, checked in this order
pub const REQUIRED_CONFIG_PROPERTIES: [&str; 5] = [
    "authority",
    "client_id",
    "redirect_uri",
    "response_type",
    "scope",
];

/// camelCase aliases that are copied to the snake_case keys the client reads
pub const SNAKE_CASED_SETTINGS: [&str; 10] = [
    "clientId",
    "redirectUri",
    "responseType",
    "maxAge",
    "uiLocales",
    "loginHint",
    "acrValues",
    "postLogoutRedirectUri",
    "popupRedirectUri",
    "silentRedirectUri",
];

const SETTINGS_FILE: &str = "OidcSettings.toml";

// =============================================================================
// Client configuration
// =============================================================================

/// Normalized configuration handed to the wrapped OIDC client
///
/// Built by merging, in order: client defaults, the caller's settings with
/// camelCase aliases copied to snake_case, and a forced
/// `automaticSilentRenew = false` because renewal is driven by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct OidcClientConfig {
    settings: Map<String, Value>,
    renew_on_expiring: bool,
}

impl OidcClientConfig {
    /// Normalize raw client settings without validating them
    #[must_use]
    pub fn from_settings(raw: &Map<String, Value>) -> Self {
        let mut defaults = Map::new();
        defaults.insert("loadUserInfo".to_string(), Value::Bool(true));
        defaults.insert("automaticSilentSignin".to_string(), Value::Bool(true));

        // renewal is driven by the store, never by the client itself
        let mut forced = Map::new();
        forced.insert("automaticSilentRenew".to_string(), Value::Bool(false));

        let snake_cased = snake_cased_settings(raw);
        let settings = object_assign([&defaults, &snake_cased, &forced]);

        Self {
            settings,
            renew_on_expiring: is_truthy(raw.get("automaticSilentRenew")),
        }
    }

    /// Normalize and validate raw client settings
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSetting` naming the first required field
    /// that is absent or empty.
    pub fn new(raw: &Map<String, Value>) -> Result<Self, ConfigError> {
        let config = Self::from_settings(raw);
        config.validate()?;
        Ok(config)
    }

    /// Normalize and validate settings given as a JSON value
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object or a required field is missing.
    pub fn from_value(raw: &Value) -> Result<Self, ConfigError> {
        let map = raw.as_object().ok_or_else(|| ConfigError::InvalidSetting {
            name: "settings".to_string(),
            reason: "expected a key/value mapping".to_string(),
        })?;
        Self::new(map)
    }

    /// Check the required fields
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSetting` for the first missing field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match REQUIRED_CONFIG_PROPERTIES
            .iter()
            .find(|property| !is_truthy(self.settings.get(**property)))
        {
            Some(missing) => Err(ConfigError::MissingSetting(*missing)),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.settings
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Non-empty string setting
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.get_str("authority")
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.get_str("client_id")
    }

    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.get_str("redirect_uri")
    }

    #[must_use]
    pub fn popup_redirect_uri(&self) -> Option<&str> {
        self.get_str("popup_redirect_uri")
    }

    #[must_use]
    pub fn silent_redirect_uri(&self) -> Option<&str> {
        self.get_str("silent_redirect_uri")
    }

    #[must_use]
    pub fn post_logout_redirect_uri(&self) -> Option<&str> {
        self.get_str("post_logout_redirect_uri")
    }

    #[must_use]
    pub fn load_user_info(&self) -> bool {
        is_truthy(self.settings.get("loadUserInfo"))
    }

    #[must_use]
    pub fn automatic_silent_signin(&self) -> bool {
        is_truthy(self.settings.get("automaticSilentSignin"))
    }

    /// What the wrapped client sees; always `false`
    #[must_use]
    pub fn automatic_silent_renew(&self) -> bool {
        is_truthy(self.settings.get("automaticSilentRenew"))
    }

    /// Whether the caller asked for renewal when the access token is about to expire
    #[must_use]
    pub fn renew_on_expiring(&self) -> bool {
        self.renew_on_expiring
    }

    /// Silent sign-in needs a silent redirect URI and `automaticSilentSignin`
    #[must_use]
    pub fn silent_signin_enabled(&self) -> bool {
        self.silent_redirect_uri().is_some() && self.automatic_silent_signin()
    }
}

fn snake_cased_settings(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut settings = raw.clone();
    for setting in SNAKE_CASED_SETTINGS {
        if let Some(value) = raw.get(setting) {
            settings.insert(camel_case_to_snake_case(setting), value.clone());
        }
    }
    settings
}

// =============================================================================
// Store settings
// =============================================================================

/// Decides whether a route can be visited without a signed-in user
pub type PublicRoutePredicate = Arc<dyn Fn(&Route) -> bool + Send + Sync>;

/// Which session field decides `oidc_is_authenticated`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticatedBy {
    AccessToken,
    #[default]
    IdToken,
}

/// Adapter flags layered on top of the client configuration
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Also publish events on the browser event bus
    pub dispatch_events_on_window: bool,
    #[serde(skip)]
    pub is_public_route: Option<PublicRoutePredicate>,
    pub public_route_paths: Vec<String>,
    /// Base path the application is served under, `/` when unset
    pub route_base: Option<String>,
    pub default_signin_redirect_options: Option<SigninOptions>,
    pub default_signin_silent_options: Option<SigninOptions>,
    pub default_signin_popup_options: Option<SigninOptions>,
    pub is_authenticated_by: AuthenticatedBy,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("dispatch_events_on_window", &self.dispatch_events_on_window)
            .field("is_public_route", &self.is_public_route.is_some())
            .field("public_route_paths", &self.public_route_paths)
            .field("route_base", &self.route_base)
            .field("is_authenticated_by", &self.is_authenticated_by)
            .finish_non_exhaustive()
    }
}

impl StoreSettings {
    #[must_use]
    pub fn route_base(&self) -> &str {
        self.route_base
            .as_deref()
            .filter(|base| !base.is_empty())
            .unwrap_or("/")
    }

    #[must_use]
    pub fn with_public_route_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_route_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_public_route_predicate(
        mut self,
        predicate: impl Fn(&Route) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_public_route = Some(Arc::new(predicate));
        self
    }

    #[must_use]
    pub fn with_window_events(mut self) -> Self {
        self.dispatch_events_on_window = true;
        self
    }
}

// =============================================================================
// File and environment loading
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Everything needed to build a store, loadable from `OidcSettings.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Raw client settings, camelCase or snake_case keys
    pub oidc: Map<String, Value>,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl StoreConfig {
    /// Load settings from configuration files and environment variables
    ///
    /// Settings are applied with the following priority (highest to lowest):
    /// 1. Environment variables
    /// 2. `OidcSettings.toml` in `OIDC_SETTINGS_DIR` (if set and present)
    /// 3. `OidcSettings.toml` in the current directory (if present)
    /// 4. Defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut config);
        config.initialize_logging();
        Ok(config)
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` when the text is not valid settings TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        basic_toml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))
    }

    fn load_base_settings() -> anyhow::Result<Self> {
        let mut config = Self::default();

        let default_path = std::path::PathBuf::from(SETTINGS_FILE);
        if default_path.exists() {
            config = Self::from_toml_str(&fs::read_to_string(&default_path)?)?;
            info!("Loaded OIDC settings from {}", default_path.display());
        }

        if let Ok(settings_dir) = std::env::var("OIDC_SETTINGS_DIR") {
            let dir_path = std::path::Path::new(&settings_dir).join(SETTINGS_FILE);
            if dir_path.exists() {
                config = Self::from_toml_str(&fs::read_to_string(&dir_path)?)?;
                info!("Overriding OIDC settings from {}", dir_path.display());
            } else {
                debug!(
                    "OIDC_SETTINGS_DIR set but no {SETTINGS_FILE} found at: {}",
                    dir_path.display()
                );
            }
        }

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(config: &mut Self) {
        const CLIENT_OVERRIDES: [(&str, &str); 7] = [
            ("OIDC_AUTHORITY", "authority"),
            ("OIDC_CLIENT_ID", "client_id"),
            ("OIDC_REDIRECT_URI", "redirect_uri"),
            ("OIDC_RESPONSE_TYPE", "response_type"),
            ("OIDC_SCOPE", "scope"),
            ("OIDC_SILENT_REDIRECT_URI", "silent_redirect_uri"),
            ("OIDC_POPUP_REDIRECT_URI", "popup_redirect_uri"),
        ];

        for (env_var, key) in CLIENT_OVERRIDES {
            if let Ok(value) = std::env::var(env_var) {
                config.oidc.insert(key.to_string(), Value::String(value));
            }
        }

        if let Ok(flag) = std::env::var("OIDC_DISPATCH_EVENTS_ON_WINDOW") {
            if let Ok(flag) = flag.parse::<bool>() {
                config.store.dispatch_events_on_window = flag;
            }
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }
    }

    fn initialize_logging(&self) {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&self.logging.level);
        if builder.try_init().is_err() {
            debug!("Logger already initialized, keeping existing configuration");
        }
    }

    /// Normalized and validated client configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSetting` if a required setting is absent.
    pub fn client_config(&self) -> Result<OidcClientConfig, ConfigError> {
        OidcClientConfig::new(&self.oidc)
    }
}
