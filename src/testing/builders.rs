//! Fluent builders for creating customizable test objects
//!
//! [`TestUserBuilder`] produces users whose tokens carry real (unsigned)
//! `exp` claims, so the store's token getters see the same expiry as
//! `User::expired`. [`TestStoreBuilder`] wires a store to the mock
//! collaborators and hands all of them back for inspection.

use crate::client::EventListener;
use crate::events::{BrowserEventBus, EventListeners};
use crate::models::User;
use crate::navigation::{IframeOpener, MemorySessionStorage, SessionStorage};
use crate::session::OidcStore;
use crate::settings::StoreSettings;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::constants::{TEST_EMAIL, TEST_SCOPE, TEST_SUBJECT};
use super::fixtures::TestFixtures;
use super::mock::{MockOidcClient, RecordingEventBus, RecordingIframeOpener};

/// Builder for test users
pub struct TestUserBuilder {
    subject: String,
    scope: Option<String>,
    expires_in_seconds: Option<i64>,
    with_refresh_token: bool,
    extra_claims: Map<String, Value>,
}

impl TestUserBuilder {
    /// Signed-in user valid for one hour
    #[must_use]
    pub fn new() -> Self {
        Self {
            subject: TEST_SUBJECT.to_string(),
            scope: Some(TEST_SCOPE.to_string()),
            expires_in_seconds: Some(3600),
            with_refresh_token: false,
            extra_claims: Map::new(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    #[must_use]
    pub fn without_scope(mut self) -> Self {
        self.scope = None;
        self
    }

    #[must_use]
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.expires_in_seconds = Some(seconds);
        self
    }

    /// User and tokens that expired a minute ago
    #[must_use]
    pub fn expired(self) -> Self {
        self.expires_in(-60)
    }

    /// Tokens without `exp` and no `expires_at`
    #[must_use]
    pub fn without_expiry(mut self) -> Self {
        self.expires_in_seconds = None;
        self
    }

    #[must_use]
    pub fn with_refresh_token(mut self) -> Self {
        self.with_refresh_token = true;
        self
    }

    /// Additional profile claim
    #[must_use]
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra_claims.insert(name.to_string(), value);
        self
    }

    fn token(&self, kind: &str) -> String {
        let mut claims = json!({ "sub": self.subject, "token_use": kind });
        if let Some(seconds) = self.expires_in_seconds {
            claims["exp"] = json!(Utc::now().timestamp() + seconds);
        }
        TestFixtures::token_with_claims(&claims)
    }

    #[must_use]
    pub fn build(self) -> User {
        let mut profile = Map::new();
        profile.insert("sub".to_string(), json!(self.subject));
        profile.insert("email".to_string(), json!(TEST_EMAIL));
        profile.extend(self.extra_claims.clone());

        User {
            id_token: Some(self.token("id")),
            access_token: self.token("access"),
            refresh_token: self.with_refresh_token.then(|| self.token("refresh")),
            token_type: "Bearer".to_string(),
            scope: self.scope.clone(),
            profile,
            expires_at: self
                .expires_in_seconds
                .map(|seconds| Utc::now().timestamp() + seconds),
            session_state: None,
        }
    }
}

impl Default for TestUserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A store wired to mock collaborators
pub struct TestStore {
    pub store: OidcStore,
    pub client: Arc<MockOidcClient>,
    pub bus: Arc<RecordingEventBus>,
    pub iframe: Arc<RecordingIframeOpener>,
    pub storage: Arc<MemorySessionStorage>,
}

/// Builder for [`TestStore`]
pub struct TestStoreBuilder {
    oidc_settings: Map<String, Value>,
    store_settings: StoreSettings,
    client: MockOidcClient,
    iframe: RecordingIframeOpener,
    listeners: EventListeners,
}

impl TestStoreBuilder {
    /// Minimal settings, silent sign-in not configured
    #[must_use]
    pub fn new() -> Self {
        Self {
            oidc_settings: TestFixtures::oidc_settings_map(),
            store_settings: StoreSettings::default(),
            client: MockOidcClient::new(),
            iframe: RecordingIframeOpener::new(),
            listeners: EventListeners::new(),
        }
    }

    /// Settings with popup and silent redirect URIs
    #[must_use]
    pub fn with_silent_signin(mut self) -> Self {
        self.oidc_settings = TestFixtures::oidc_settings_map_with_silent();
        self
    }

    #[must_use]
    pub fn with_oidc_setting(mut self, name: &str, value: Value) -> Self {
        self.oidc_settings.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_store_settings(mut self, settings: StoreSettings) -> Self {
        self.store_settings = settings;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: MockOidcClient) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_failing_iframe(mut self) -> Self {
        self.iframe = RecordingIframeOpener::failing();
        self
    }

    #[must_use]
    pub fn listener(mut self, event_name: &str, listener: EventListener) -> Self {
        self.listeners.insert(event_name.to_string(), listener);
        self
    }

    /// # Panics
    ///
    /// Panics if the configured settings are invalid.
    #[must_use]
    pub fn build(self) -> TestStore {
        let client = Arc::new(self.client);
        let bus = Arc::new(RecordingEventBus::new());
        let iframe = Arc::new(self.iframe);
        let storage = Arc::new(MemorySessionStorage::new());

        let store = OidcStore::builder(self.oidc_settings)
            .store_settings(self.store_settings)
            .listeners(self.listeners)
            .event_bus(bus.clone() as Arc<dyn BrowserEventBus>)
            .session_storage(storage.clone() as Arc<dyn SessionStorage>)
            .iframe_opener(iframe.clone() as Arc<dyn IframeOpener>)
            .build_with_client(client.clone())
            .expect("test store settings must be valid");

        TestStore {
            store,
            client,
            bus,
            iframe,
            storage,
        }
    }
}

impl Default for TestStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
