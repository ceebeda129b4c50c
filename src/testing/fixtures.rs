//! Test fixtures providing pre-built settings and tokens

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde_json::{json, Map, Value};

use super::constants::{
    TEST_AUTHORITY, TEST_CLIENT_ID, TEST_POPUP_REDIRECT_URI, TEST_REDIRECT_URI,
    TEST_SCOPE, TEST_SILENT_REDIRECT_URI,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Unsigned JWT carrying `claims` as its payload
    #[must_use]
    pub fn token_with_claims(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.test-signature")
    }

    /// Token for `subject` expiring `seconds` from now (negative for the past)
    #[must_use]
    pub fn token_expiring_in(subject: &str, seconds: i64) -> String {
        Self::token_with_claims(&json!({
            "sub": subject,
            "exp": Utc::now().timestamp() + seconds,
        }))
    }

    #[must_use]
    pub fn expired_token(subject: &str) -> String {
        Self::token_expiring_in(subject, -60)
    }

    /// Token without an `exp` claim, which never expires
    #[must_use]
    pub fn non_expiring_token(subject: &str) -> String {
        Self::token_with_claims(&json!({ "sub": subject }))
    }

    /// Minimal valid client settings, silent sign-in not configured
    #[must_use]
    pub fn oidc_settings_map() -> Map<String, Value> {
        let mut settings = Map::new();
        settings.insert("authority".to_string(), json!(TEST_AUTHORITY));
        settings.insert("client_id".to_string(), json!(TEST_CLIENT_ID));
        settings.insert("redirect_uri".to_string(), json!(TEST_REDIRECT_URI));
        settings.insert("response_type".to_string(), json!("code"));
        settings.insert("scope".to_string(), json!(TEST_SCOPE));
        settings
    }

    /// Client settings with popup and silent redirect URIs
    #[must_use]
    pub fn oidc_settings_map_with_silent() -> Map<String, Value> {
        let mut settings = Self::oidc_settings_map();
        settings.insert(
            "popup_redirect_uri".to_string(),
            json!(TEST_POPUP_REDIRECT_URI),
        );
        settings.insert(
            "silent_redirect_uri".to_string(),
            json!(TEST_SILENT_REDIRECT_URI),
        );
        settings
    }
}
