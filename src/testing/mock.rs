//! Mock objects and fake implementations for testing
//!
//! [`MockOidcClient`] records every delegated call and answers from
//! configured users. Sign-in flows without a configured user fail with
//! `login_required`; any method can be forced to fail with
//! [`MockOidcClient::failing`].

use crate::client::{ClientEventRegistry, EventListener, ListenerId, OidcClient, OidcClientFactory, OidcEvent};
use crate::error::{ClientError, StoreError};
use crate::events::{BrowserEvent, BrowserEventBus};
use crate::models::{SigninOptions, SignoutArgs, User};
use crate::navigation::IframeOpener;
use crate::settings::OidcClientConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::constants::{LOGIN_REQUIRED, TEST_SIGNOUT_URL};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call received by [`MockOidcClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    GetUser,
    SigninSilent(SigninOptions),
    SigninSilentCallback(Option<String>),
    SigninRedirect(SigninOptions),
    SigninRedirectCallback(Option<String>),
    SigninPopup(SigninOptions),
    SigninPopupCallback(Option<String>),
    SignoutRedirect(SignoutArgs),
    SignoutRedirectCallback(Option<String>),
    SignoutPopup(SignoutArgs),
    SignoutPopupCallback(Option<String>),
    SignoutRequestUrl(SignoutArgs),
    RemoveUser,
    ClearStaleState,
    StoreUser(User),
}

impl ClientCall {
    pub const GET_USER: &'static str = "get_user";
    pub const SIGNIN_SILENT: &'static str = "signin_silent";
    pub const SIGNIN_SILENT_CALLBACK: &'static str = "signin_silent_callback";
    pub const SIGNIN_REDIRECT: &'static str = "signin_redirect";
    pub const SIGNIN_REDIRECT_CALLBACK: &'static str = "signin_redirect_callback";
    pub const SIGNIN_POPUP: &'static str = "signin_popup";
    pub const SIGNIN_POPUP_CALLBACK: &'static str = "signin_popup_callback";
    pub const SIGNOUT_REDIRECT: &'static str = "signout_redirect";
    pub const SIGNOUT_REDIRECT_CALLBACK: &'static str = "signout_redirect_callback";
    pub const SIGNOUT_POPUP: &'static str = "signout_popup";
    pub const SIGNOUT_POPUP_CALLBACK: &'static str = "signout_popup_callback";
    pub const SIGNOUT_REQUEST_URL: &'static str = "signout_request_url";
    pub const REMOVE_USER: &'static str = "remove_user";
    pub const CLEAR_STALE_STATE: &'static str = "clear_stale_state";
    pub const STORE_USER: &'static str = "store_user";

    /// Name of the client method that was called
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientCall::GetUser => Self::GET_USER,
            ClientCall::SigninSilent(_) => Self::SIGNIN_SILENT,
            ClientCall::SigninSilentCallback(_) => Self::SIGNIN_SILENT_CALLBACK,
            ClientCall::SigninRedirect(_) => Self::SIGNIN_REDIRECT,
            ClientCall::SigninRedirectCallback(_) => Self::SIGNIN_REDIRECT_CALLBACK,
            ClientCall::SigninPopup(_) => Self::SIGNIN_POPUP,
            ClientCall::SigninPopupCallback(_) => Self::SIGNIN_POPUP_CALLBACK,
            ClientCall::SignoutRedirect(_) => Self::SIGNOUT_REDIRECT,
            ClientCall::SignoutRedirectCallback(_) => Self::SIGNOUT_REDIRECT_CALLBACK,
            ClientCall::SignoutPopup(_) => Self::SIGNOUT_POPUP,
            ClientCall::SignoutPopupCallback(_) => Self::SIGNOUT_POPUP_CALLBACK,
            ClientCall::SignoutRequestUrl(_) => Self::SIGNOUT_REQUEST_URL,
            ClientCall::RemoveUser => Self::REMOVE_USER,
            ClientCall::ClearStaleState => Self::CLEAR_STALE_STATE,
            ClientCall::StoreUser(_) => Self::STORE_USER,
        }
    }
}

/// Scriptable in-memory OIDC client
#[derive(Default)]
pub struct MockOidcClient {
    calls: Mutex<Vec<ClientCall>>,
    /// Answer of `get_user`
    user: Mutex<Option<User>>,
    silent_user: Mutex<Option<User>>,
    callback_user: Mutex<Option<User>>,
    popup_user: Mutex<Option<User>>,
    failing: Mutex<HashSet<&'static str>>,
    events: ClientEventRegistry,
}

impl MockOidcClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// User already cached by the client
    #[must_use]
    pub fn with_user(self, user: User) -> Self {
        self.set_user(Some(user));
        self
    }

    /// User returned by a successful silent sign-in, then cached
    #[must_use]
    pub fn with_silent_user(self, user: User) -> Self {
        *lock(&self.silent_user) = Some(user);
        self
    }

    /// User returned by the redirect callback, then cached
    #[must_use]
    pub fn with_callback_user(self, user: User) -> Self {
        *lock(&self.callback_user) = Some(user);
        self
    }

    /// User returned by the popup flow, then cached
    #[must_use]
    pub fn with_popup_user(self, user: User) -> Self {
        *lock(&self.popup_user) = Some(user);
        self
    }

    /// Make the named method fail, see the `ClientCall` constants
    #[must_use]
    pub fn failing(self, method: &'static str) -> Self {
        lock(&self.failing).insert(method);
        self
    }

    pub fn set_user(&self, user: Option<User>) {
        *lock(&self.user) = user;
    }

    #[must_use]
    pub fn cached_user(&self) -> Option<User> {
        lock(&self.user).clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ClientCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls to the named method
    #[must_use]
    pub fn calls_named(&self, method: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.name() == method)
            .count()
    }

    #[must_use]
    pub fn listener_count(&self, event: OidcEvent) -> usize {
        self.events.count(event)
    }

    /// Raise a client event as the real client would
    pub fn emit(&self, event: OidcEvent, payload: &Value) {
        self.events.emit(event, payload);
    }

    fn record(&self, call: ClientCall) -> Result<(), ClientError> {
        let method = call.name();
        lock(&self.calls).push(call);
        if lock(&self.failing).contains(method) {
            return Err(ClientError::new(format!("{method} failed")));
        }
        Ok(())
    }

    fn sign_in_with(&self, configured: &Mutex<Option<User>>) -> Result<User, ClientError> {
        let user = lock(configured)
            .clone()
            .ok_or_else(|| ClientError::new(LOGIN_REQUIRED))?;
        self.set_user(Some(user.clone()));
        Ok(user)
    }
}

#[async_trait]
impl OidcClient for MockOidcClient {
    async fn get_user(&self) -> Result<Option<User>, ClientError> {
        self.record(ClientCall::GetUser)?;
        Ok(self.cached_user())
    }

    async fn signin_silent(&self, options: &SigninOptions) -> Result<User, ClientError> {
        self.record(ClientCall::SigninSilent(options.clone()))?;
        self.sign_in_with(&self.silent_user)
    }

    async fn signin_silent_callback(&self, url: Option<&str>) -> Result<(), ClientError> {
        self.record(ClientCall::SigninSilentCallback(url.map(ToString::to_string)))
    }

    async fn signin_redirect(&self, options: &SigninOptions) -> Result<(), ClientError> {
        self.record(ClientCall::SigninRedirect(options.clone()))
    }

    async fn signin_redirect_callback(&self, url: Option<&str>) -> Result<User, ClientError> {
        self.record(ClientCall::SigninRedirectCallback(url.map(ToString::to_string)))?;
        self.sign_in_with(&self.callback_user)
    }

    async fn signin_popup(&self, options: &SigninOptions) -> Result<User, ClientError> {
        self.record(ClientCall::SigninPopup(options.clone()))?;
        self.sign_in_with(&self.popup_user)
    }

    async fn signin_popup_callback(&self, url: Option<&str>) -> Result<(), ClientError> {
        self.record(ClientCall::SigninPopupCallback(url.map(ToString::to_string)))
    }

    async fn signout_redirect(&self, args: &SignoutArgs) -> Result<(), ClientError> {
        self.record(ClientCall::SignoutRedirect(args.clone()))?;
        self.set_user(None);
        Ok(())
    }

    async fn signout_redirect_callback(&self, url: Option<&str>) -> Result<(), ClientError> {
        self.record(ClientCall::SignoutRedirectCallback(url.map(ToString::to_string)))
    }

    async fn signout_popup(&self, args: &SignoutArgs) -> Result<(), ClientError> {
        self.record(ClientCall::SignoutPopup(args.clone()))?;
        self.set_user(None);
        Ok(())
    }

    async fn signout_popup_callback(&self, url: Option<&str>) -> Result<(), ClientError> {
        self.record(ClientCall::SignoutPopupCallback(url.map(ToString::to_string)))
    }

    async fn signout_request_url(&self, args: &SignoutArgs) -> Result<String, ClientError> {
        self.record(ClientCall::SignoutRequestUrl(args.clone()))?;
        Ok(match &args.id_token_hint {
            Some(hint) => format!("{TEST_SIGNOUT_URL}?id_token_hint={hint}"),
            None => TEST_SIGNOUT_URL.to_string(),
        })
    }

    async fn remove_user(&self) -> Result<(), ClientError> {
        self.record(ClientCall::RemoveUser)?;
        self.set_user(None);
        Ok(())
    }

    async fn clear_stale_state(&self) -> Result<(), ClientError> {
        self.record(ClientCall::ClearStaleState)
    }

    async fn store_user(&self, user: &User) -> Result<(), ClientError> {
        self.record(ClientCall::StoreUser(user.clone()))?;
        self.set_user(Some(user.clone()));
        Ok(())
    }

    fn add_event_listener(&self, event: OidcEvent, listener: EventListener) -> ListenerId {
        self.events.add(event, listener)
    }

    fn remove_event_listener(&self, event: OidcEvent, id: ListenerId) -> bool {
        self.events.remove(event, id)
    }
}

/// Factory handing out one shared [`MockOidcClient`]
pub struct MockClientFactory {
    client: Arc<MockOidcClient>,
    configs: Mutex<Vec<OidcClientConfig>>,
}

impl MockClientFactory {
    #[must_use]
    pub fn new(client: MockOidcClient) -> Self {
        Self {
            client: Arc::new(client),
            configs: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn client(&self) -> Arc<MockOidcClient> {
        Arc::clone(&self.client)
    }

    /// Configuration passed to the most recent `create`
    #[must_use]
    pub fn last_config(&self) -> Option<OidcClientConfig> {
        lock(&self.configs).last().cloned()
    }
}

impl OidcClientFactory for MockClientFactory {
    fn create(&self, config: &OidcClientConfig) -> Arc<dyn OidcClient> {
        lock(&self.configs).push(config.clone());
        self.client.clone()
    }
}

/// Event bus that keeps everything dispatched to it
#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<BrowserEvent>>,
}

impl RecordingEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<BrowserEvent> {
        lock(&self.events).clone()
    }

    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }
}

impl BrowserEventBus for RecordingEventBus {
    fn dispatch_event(&self, event: BrowserEvent) -> Result<(), String> {
        lock(&self.events).push(event);
        Ok(())
    }
}

/// Iframe opener that records URLs, optionally failing every load
#[derive(Default)]
pub struct RecordingIframeOpener {
    urls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingIframeOpener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        lock(&self.urls).clone()
    }
}

#[async_trait]
impl IframeOpener for RecordingIframeOpener {
    async fn open_url_with_iframe(&self, url: &str) -> Result<(), StoreError> {
        lock(&self.urls).push(url.to_string());
        if self.fail {
            return Err(StoreError::Navigation(format!("iframe failed to load {url}")));
        }
        Ok(())
    }
}
