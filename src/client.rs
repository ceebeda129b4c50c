//! Seam to the wrapped OpenID Connect client
//!
//! The store never speaks the protocol itself. Everything that touches the
//! identity provider goes through [`OidcClient`], and lifecycle notifications
//! come back through its typed event subscriptions.

use crate::error::ClientError;
use crate::models::{SignoutArgs, SigninOptions, User};
use crate::settings::OidcClientConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Callback invoked with the event payload (user, error payload or null)
pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned when subscribing, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle events raised by the wrapped client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OidcEvent {
    UserLoaded,
    UserUnloaded,
    AccessTokenExpiring,
    AccessTokenExpired,
    SilentRenewError,
    UserSignedOut,
}

impl OidcEvent {
    pub const ALL: [OidcEvent; 6] = [
        OidcEvent::UserLoaded,
        OidcEvent::UserUnloaded,
        OidcEvent::AccessTokenExpiring,
        OidcEvent::AccessTokenExpired,
        OidcEvent::SilentRenewError,
        OidcEvent::UserSignedOut,
    ];

    /// Name used for listener maps and the browser event bus
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OidcEvent::UserLoaded => "userLoaded",
            OidcEvent::UserUnloaded => "userUnloaded",
            OidcEvent::AccessTokenExpiring => "accessTokenExpiring",
            OidcEvent::AccessTokenExpired => "accessTokenExpired",
            OidcEvent::SilentRenewError => "silentRenewError",
            OidcEvent::UserSignedOut => "userSignedOut",
        }
    }
}

impl fmt::Display for OidcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event name that the wrapped client does not raise
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown OIDC client event: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for OidcEvent {
    type Err = UnknownEvent;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        OidcEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == name)
            .ok_or_else(|| UnknownEvent(name.to_string()))
    }
}

/// Operations the store delegates to the wrapped OIDC client
#[async_trait]
pub trait OidcClient: Send + Sync {
    /// Currently cached user, if any
    async fn get_user(&self) -> Result<Option<User>, ClientError>;

    async fn signin_silent(&self, options: &SigninOptions) -> Result<User, ClientError>;

    /// Completes a silent sign-in inside the hidden iframe
    async fn signin_silent_callback(&self, url: Option<&str>) -> Result<(), ClientError>;

    /// Navigates away from the application to the identity provider
    async fn signin_redirect(&self, options: &SigninOptions) -> Result<(), ClientError>;

    async fn signin_redirect_callback(&self, url: Option<&str>) -> Result<User, ClientError>;

    async fn signin_popup(&self, options: &SigninOptions) -> Result<User, ClientError>;

    async fn signin_popup_callback(&self, url: Option<&str>) -> Result<(), ClientError>;

    async fn signout_redirect(&self, args: &SignoutArgs) -> Result<(), ClientError>;

    async fn signout_redirect_callback(&self, url: Option<&str>) -> Result<(), ClientError>;

    async fn signout_popup(&self, args: &SignoutArgs) -> Result<(), ClientError>;

    async fn signout_popup_callback(&self, url: Option<&str>) -> Result<(), ClientError>;

    /// End-session URL for the given arguments, without navigating
    async fn signout_request_url(&self, args: &SignoutArgs) -> Result<String, ClientError>;

    async fn remove_user(&self) -> Result<(), ClientError>;

    async fn clear_stale_state(&self) -> Result<(), ClientError>;

    async fn store_user(&self, user: &User) -> Result<(), ClientError>;

    fn add_event_listener(&self, event: OidcEvent, listener: EventListener) -> ListenerId;

    /// Returns `false` when the listener was not subscribed
    fn remove_event_listener(&self, event: OidcEvent, id: ListenerId) -> bool;
}

/// Builds a client from a validated configuration
pub trait OidcClientFactory {
    fn create(&self, config: &OidcClientConfig) -> Arc<dyn OidcClient>;
}

impl<F> OidcClientFactory for F
where
    F: Fn(&OidcClientConfig) -> Arc<dyn OidcClient>,
{
    fn create(&self, config: &OidcClientConfig) -> Arc<dyn OidcClient> {
        self(config)
    }
}

/// Listener bookkeeping for [`OidcClient`] implementations
#[derive(Default)]
pub struct ClientEventRegistry {
    listeners: Mutex<HashMap<OidcEvent, Vec<(ListenerId, EventListener)>>>,
}

impl ClientEventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, event: OidcEvent, listener: EventListener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event)
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove(&self, event: OidcEvent, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(subscribed) = listeners.get_mut(&event) else {
            return false;
        };
        let before = subscribed.len();
        subscribed.retain(|(listener_id, _)| *listener_id != id);
        subscribed.len() != before
    }

    #[must_use]
    pub fn count(&self, event: OidcEvent) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .map_or(0, Vec::len)
    }

    /// Invoke every listener of `event`
    ///
    /// Listeners are called outside the lock so they may subscribe or
    /// unsubscribe while running.
    pub fn emit(&self, event: OidcEvent, payload: &Value) {
        let snapshot: Vec<EventListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .map(|subscribed| subscribed.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in snapshot {
            listener(payload);
        }
    }
}
