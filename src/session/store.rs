//! OIDC store module: state, getters, actions and mutations
//!
//! The store is a cheap `Clone` handle. The session record sits behind a
//! mutex that is only ever held for the duration of a single mutation or
//! read, never across an `.await`.
//!
//! ## Organization
//!
//! 1. **Construction** - builder and module id
//! 2. **Getters** - derived reads, token expiry recomputed on every call
//! 3. **Mutations** - the only writers of the session record
//! 4. **Actions** - sign-in, sign-out and listener management delegated to the client
//!
//! The route access check lives in [`super::access`].

use crate::client::{EventListener, ListenerId, OidcClient, OidcClientFactory, OidcEvent};
use crate::error::{ClientError, ConfigError, Result, StoreError};
use crate::events::{
    BrowserEventBus, EventListeners, EventRelay, AUTOMATIC_SILENT_RENEW_ERROR_EVENT,
    OIDC_ERROR_EVENT,
};
use crate::models::{AuthenticatePayload, ErrorPayload, Route, SigninOptions, SignoutArgs, User};
use crate::navigation::{
    active_route_or_default, IframeOpener, MemorySessionStorage, NoWindowIframeOpener,
    SessionStorage, ACTIVE_ROUTE_KEY,
};
use crate::session::routes::RouteMatcher;
use crate::session::state::OidcState;
use crate::settings::{OidcClientConfig, StoreSettings};
use crate::utils::jwt::{optional_token_exp, token_is_expired};
use crate::utils::logging::LoggingHelper;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Fixed id under which the module is registered with the host
pub const STORE_ID: &str = "oidc";

pub(crate) struct StoreInner {
    pub(crate) state: Mutex<OidcState>,
    pub(crate) client: Arc<dyn OidcClient>,
    pub(crate) config: OidcClientConfig,
    pub(crate) settings: StoreSettings,
    pub(crate) routes: RouteMatcher,
    pub(crate) relay: EventRelay,
    pub(crate) storage: Arc<dyn SessionStorage>,
    pub(crate) iframe: Arc<dyn IframeOpener>,
}

/// Handle to the OIDC store module
#[derive(Clone)]
pub struct OidcStore {
    pub(crate) inner: Arc<StoreInner>,
}

// =============================================================================
// 1. Construction
// =============================================================================

/// Builder for [`OidcStore`]
pub struct OidcStoreBuilder {
    oidc_settings: Map<String, Value>,
    store_settings: StoreSettings,
    listeners: EventListeners,
    event_bus: Option<Arc<dyn BrowserEventBus>>,
    storage: Option<Arc<dyn SessionStorage>>,
    iframe: Option<Arc<dyn IframeOpener>>,
}

impl OidcStoreBuilder {
    /// Start from raw client settings (camelCase or snake_case keys)
    #[must_use]
    pub fn new(oidc_settings: Map<String, Value>) -> Self {
        Self {
            oidc_settings,
            store_settings: StoreSettings::default(),
            listeners: EventListeners::new(),
            event_bus: None,
            storage: None,
            iframe: None,
        }
    }

    #[must_use]
    pub fn store_settings(mut self, settings: StoreSettings) -> Self {
        self.store_settings = settings;
        self
    }

    /// Listener for a client event or a local error event
    #[must_use]
    pub fn listener(
        mut self,
        event_name: &str,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Self {
        self.listeners
            .insert(event_name.to_string(), Arc::new(listener));
        self
    }

    #[must_use]
    pub fn listeners(mut self, listeners: EventListeners) -> Self {
        self.listeners.extend(listeners);
        self
    }

    #[must_use]
    pub fn event_bus(mut self, bus: Arc<dyn BrowserEventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    #[must_use]
    pub fn session_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn iframe_opener(mut self, iframe: Arc<dyn IframeOpener>) -> Self {
        self.iframe = Some(iframe);
        self
    }

    /// Validate the settings and let `factory` create the client
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSetting` if a required setting is absent.
    pub fn build(self, factory: &dyn OidcClientFactory) -> Result<OidcStore, ConfigError> {
        let config = OidcClientConfig::new(&self.oidc_settings)?;
        let client = factory.create(&config);
        Ok(self.assemble(config, client))
    }

    /// Validate the settings and wrap an already constructed client
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSetting` if a required setting is absent.
    pub fn build_with_client(self, client: Arc<dyn OidcClient>) -> Result<OidcStore, ConfigError> {
        let config = OidcClientConfig::new(&self.oidc_settings)?;
        Ok(self.assemble(config, client))
    }

    fn assemble(self, config: OidcClientConfig, client: Arc<dyn OidcClient>) -> OidcStore {
        let routes = RouteMatcher::new(&config, &self.store_settings);
        let relay = EventRelay::new(
            self.listeners,
            self.event_bus,
            self.store_settings.dispatch_events_on_window,
        );
        relay.bind_client(client.as_ref());

        debug!(
            "Created OIDC store '{STORE_ID}' with callback paths {:?}",
            routes.callback_paths()
        );

        OidcStore {
            inner: Arc::new(StoreInner {
                state: Mutex::new(OidcState::default()),
                client,
                config,
                settings: self.store_settings,
                routes,
                relay,
                storage: self
                    .storage
                    .unwrap_or_else(|| Arc::new(MemorySessionStorage::new())),
                iframe: self.iframe.unwrap_or_else(|| Arc::new(NoWindowIframeOpener)),
            }),
        }
    }
}

impl OidcStore {
    #[must_use]
    pub fn builder(oidc_settings: Map<String, Value>) -> OidcStoreBuilder {
        OidcStoreBuilder::new(oidc_settings)
    }

    #[must_use]
    pub fn id(&self) -> &'static str {
        STORE_ID
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn OidcClient> {
        &self.inner.client
    }

    #[must_use]
    pub fn config(&self) -> &OidcClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    /// Snapshot of the session record
    #[must_use]
    pub fn state(&self) -> OidcState {
        self.read(OidcState::clone)
    }

    fn read<R>(&self, f: impl FnOnce(&OidcState) -> R) -> R {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*state)
    }

    fn write<R>(&self, f: impl FnOnce(&mut OidcState) -> R) -> R {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *state)
    }

    fn from_weak(weak: &Weak<StoreInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

// =============================================================================
// 2. Getters
// =============================================================================

fn unexpired(token: Option<String>) -> Option<String> {
    token.filter(|token| !token_is_expired(token))
}

impl OidcStore {
    #[must_use]
    pub fn oidc_is_authenticated(&self) -> bool {
        let by = self.inner.settings.is_authenticated_by;
        self.read(|state| state.is_authenticated(by))
    }

    /// Profile claims of the signed-in user
    #[must_use]
    pub fn oidc_user(&self) -> Option<Map<String, Value>> {
        self.read(|state| state.user.clone())
    }

    #[must_use]
    pub fn oidc_access_token(&self) -> Option<String> {
        unexpired(self.read(|state| state.access_token.clone()))
    }

    /// Expiry in milliseconds since the epoch
    #[must_use]
    pub fn oidc_access_token_exp(&self) -> Option<i64> {
        self.read(|state| optional_token_exp(state.access_token.as_deref()))
    }

    #[must_use]
    pub fn oidc_scopes(&self) -> Option<Vec<String>> {
        self.read(|state| state.scopes.clone())
    }

    #[must_use]
    pub fn oidc_id_token(&self) -> Option<String> {
        unexpired(self.read(|state| state.id_token.clone()))
    }

    #[must_use]
    pub fn oidc_id_token_exp(&self) -> Option<i64> {
        self.read(|state| optional_token_exp(state.id_token.as_deref()))
    }

    #[must_use]
    pub fn oidc_refresh_token(&self) -> Option<String> {
        unexpired(self.read(|state| state.refresh_token.clone()))
    }

    #[must_use]
    pub fn oidc_refresh_token_exp(&self) -> Option<i64> {
        self.read(|state| optional_token_exp(state.refresh_token.as_deref()))
    }

    #[must_use]
    pub fn oidc_authentication_is_checked(&self) -> bool {
        self.read(|state| state.is_checked)
    }

    #[must_use]
    pub fn oidc_error(&self) -> Option<String> {
        self.read(|state| state.error.clone())
    }

    #[must_use]
    pub fn oidc_is_route_public(&self, route: &Route) -> bool {
        self.inner.routes.is_public(route)
    }
}

// =============================================================================
// 3. Mutations
// =============================================================================

impl OidcStore {
    pub fn set_oidc_auth(&self, user: &User) {
        self.write(|state| state.set_auth(user));
    }

    pub fn set_oidc_user(&self, user: Option<&User>) {
        self.write(|state| state.set_user(user));
    }

    pub fn unset_oidc_auth(&self) {
        LoggingHelper::log_auth_unset("session cleared");
        self.write(OidcState::unset_auth);
    }

    pub fn set_oidc_auth_is_checked(&self) {
        self.write(OidcState::set_auth_is_checked);
    }

    pub fn set_oidc_events_are_bound(&self) {
        self.write(|state| {
            state.bind_events_once();
        });
    }

    /// Record the error and relay it as `oidcError`
    pub fn set_oidc_error(&self, payload: &ErrorPayload) {
        LoggingHelper::log_error_recorded(&payload.context, &payload.error);
        self.write(|state| state.set_error(payload.error.clone()));
        self.inner
            .relay
            .dispatch_custom_error_event(OIDC_ERROR_EVENT, payload);
    }

    fn record_client_error(&self, context: &str, err: &StoreError) {
        self.set_oidc_error(&ErrorPayload::new(context, err.relay_message()));
    }
}

// =============================================================================
// 4. Actions
// =============================================================================

impl OidcStore {
    fn signin_options(
        payload_options: Option<SigninOptions>,
        defaults: Option<&SigninOptions>,
    ) -> SigninOptions {
        payload_options
            .or_else(|| defaults.cloned())
            .unwrap_or_default()
    }

    /// Start an interactive sign-in through a full page redirect
    ///
    /// The return-to route is kept in session storage so the callback can
    /// navigate back to it. Failures are recorded, not returned.
    pub async fn authenticate_oidc(&self, payload: impl Into<AuthenticatePayload>) {
        let payload = payload.into();
        match payload.redirect_path.as_deref().filter(|path| !path.is_empty()) {
            Some(path) => self.inner.storage.set_item(ACTIVE_ROUTE_KEY, path),
            None => self.inner.storage.remove_item(ACTIVE_ROUTE_KEY),
        }

        let options = Self::signin_options(
            payload.options,
            self.inner.settings.default_signin_redirect_options.as_ref(),
        );

        if let Err(e) = self.inner.client.signin_redirect(&options).await {
            self.record_client_error("authenticateOidc", &e.into());
        }
    }

    /// Complete the redirect sign-in and return the route to navigate back to
    ///
    /// # Errors
    ///
    /// Returns the client error after recording it in the store.
    pub async fn oidc_sign_in_callback(&self, url: Option<&str>) -> Result<String> {
        match self.inner.client.signin_redirect_callback(url).await {
            Ok(user) => {
                self.oidc_was_authenticated(&user);
                Ok(active_route_or_default(self.inner.storage.as_ref()))
            }
            Err(e) => {
                let err = StoreError::from(e);
                self.record_client_error("oidcSignInCallback", &err);
                self.set_oidc_auth_is_checked();
                Err(err)
            }
        }
    }

    /// Sign in without user interaction through the hidden iframe flow
    ///
    /// # Errors
    ///
    /// Returns the client error unless `ignore_errors` is set, in which case
    /// a failure resolves to `Ok(None)` without touching the error field.
    pub async fn authenticate_oidc_silent(
        &self,
        payload: impl Into<AuthenticatePayload>,
    ) -> Result<Option<User>> {
        let payload = payload.into();
        let options = Self::signin_options(
            payload.options,
            self.inner.settings.default_signin_silent_options.as_ref(),
        );

        match self.inner.client.signin_silent(&options).await {
            Ok(user) => {
                self.oidc_was_authenticated(&user);
                Ok(Some(user))
            }
            Err(e) => {
                self.set_oidc_auth_is_checked();
                if payload.ignore_errors {
                    debug!("Silent sign-in failed, ignoring: {e}");
                    Ok(None)
                } else {
                    let err = StoreError::from(e);
                    self.record_client_error("authenticateOidcSilent", &err);
                    Err(err)
                }
            }
        }
    }

    /// Sign in through a popup window; failures are recorded
    pub async fn authenticate_oidc_popup(&self, payload: impl Into<AuthenticatePayload>) {
        let payload = payload.into();
        let options = Self::signin_options(
            payload.options,
            self.inner.settings.default_signin_popup_options.as_ref(),
        );

        match self.inner.client.signin_popup(&options).await {
            Ok(user) => self.oidc_was_authenticated(&user),
            Err(e) => self.record_client_error("authenticateOidcPopup", &e.into()),
        }
    }

    /// Complete the popup sign-in inside the popup window
    ///
    /// # Errors
    ///
    /// Returns the client error after recording it in the store.
    pub async fn oidc_sign_in_popup_callback(&self, url: Option<&str>) -> Result<()> {
        self.inner
            .client
            .signin_popup_callback(url)
            .await
            .map_err(|e| {
                let err = StoreError::from(e);
                self.record_client_error("authenticateOidcPopup", &err);
                self.set_oidc_auth_is_checked();
                err
            })
    }

    /// Record a freshly authenticated user
    ///
    /// The first call also subscribes the store to token expiry: an expired
    /// access token clears the session, and when the caller enabled
    /// `automaticSilentRenew` an expiring one triggers a silent sign-in.
    pub fn oidc_was_authenticated(&self, user: &User) {
        self.set_oidc_auth(user);
        LoggingHelper::log_user_authenticated(user.subject());

        if self.write(OidcState::bind_events_once) {
            self.bind_expiry_events();
        }

        self.set_oidc_auth_is_checked();
    }

    fn bind_expiry_events(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.client.add_event_listener(
            OidcEvent::AccessTokenExpired,
            Arc::new(move |_: &Value| {
                if let Some(store) = Self::from_weak(&weak) {
                    store.unset_oidc_auth();
                }
            }),
        );

        if !self.inner.config.renew_on_expiring() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        self.inner.client.add_event_listener(
            OidcEvent::AccessTokenExpiring,
            Arc::new(move |_: &Value| {
                let Some(store) = Self::from_weak(&weak) else {
                    return;
                };
                store.spawn_automatic_silent_renew();
            }),
        );
    }

    fn spawn_automatic_silent_renew(self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("Access token expiring but no async runtime is available for silent renewal");
            return;
        };

        LoggingHelper::log_silent_signin("accessTokenExpiring");
        handle.spawn(async move {
            if let Err(e) = self
                .authenticate_oidc_silent(AuthenticatePayload::default())
                .await
            {
                self.inner.relay.dispatch_custom_error_event(
                    AUTOMATIC_SILENT_RENEW_ERROR_EVENT,
                    &ErrorPayload::new("authenticateOidcSilent", e.relay_message()),
                );
            }
        });
    }

    /// Hand a user to the client's storage and record it
    ///
    /// # Errors
    ///
    /// Returns the client error after recording it in the store.
    pub async fn store_oidc_user(&self, user: &User) -> Result<()> {
        let stored = match self.inner.client.store_user(user).await {
            Ok(()) => self.inner.client.get_user().await,
            Err(e) => Err(e),
        };

        match stored {
            Ok(Some(user)) => {
                self.oidc_was_authenticated(&user);
                Ok(())
            }
            Ok(None) => {
                let err = StoreError::from(ClientError::new("User was not found after storing it"));
                self.record_client_error("storeOidcUser", &err);
                self.set_oidc_auth_is_checked();
                Err(err)
            }
            Err(e) => {
                let err = StoreError::from(e);
                self.record_client_error("storeOidcUser", &err);
                self.set_oidc_auth_is_checked();
                Err(err)
            }
        }
    }

    /// Reload the cached user from the client and refresh the profile
    ///
    /// # Errors
    ///
    /// Returns the client error; nothing is recorded.
    pub async fn get_oidc_user(&self) -> Result<Option<User>> {
        let user = self.inner.client.get_user().await?;
        self.set_oidc_user(user.as_ref());
        Ok(user)
    }

    /// Subscribe to a client event by name
    ///
    /// Returns `None` for names the client does not raise.
    pub fn add_oidc_event_listener(
        &self,
        event_name: &str,
        listener: EventListener,
    ) -> Option<ListenerId> {
        match event_name.parse::<OidcEvent>() {
            Ok(event) => Some(self.inner.client.add_event_listener(event, listener)),
            Err(_) => {
                LoggingHelper::log_unknown_event(event_name);
                None
            }
        }
    }

    pub fn remove_oidc_event_listener(&self, event_name: &str, id: ListenerId) -> bool {
        event_name
            .parse::<OidcEvent>()
            .is_ok_and(|event| self.inner.client.remove_event_listener(event, id))
    }

    /// # Errors
    ///
    /// Returns the client error; the session is only cleared on success.
    pub async fn sign_out_oidc(&self, args: &SignoutArgs) -> Result<()> {
        self.inner.client.signout_redirect(args).await?;
        self.unset_oidc_auth();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the client error.
    pub async fn sign_out_oidc_callback(&self, url: Option<&str>) -> Result<()> {
        Ok(self.inner.client.signout_redirect_callback(url).await?)
    }

    /// # Errors
    ///
    /// Returns the client error; the session is only cleared on success.
    pub async fn sign_out_popup_oidc(&self, args: &SignoutArgs) -> Result<()> {
        self.inner.client.signout_popup(args).await?;
        self.unset_oidc_auth();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the client error.
    pub async fn sign_out_popup_oidc_callback(&self, url: Option<&str>) -> Result<()> {
        Ok(self.inner.client.signout_popup_callback(url).await?)
    }

    /// End the provider session in a hidden iframe
    ///
    /// `id_token_hint` defaults to the cached user's id token. Loading the
    /// iframe is best-effort; its failure is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the cached user or the end-session URL cannot be obtained.
    pub async fn sign_out_oidc_silent(&self, args: &SignoutArgs) -> Result<()> {
        let mut args = args.clone();
        if args.id_token_hint.is_none() {
            args.id_token_hint = self
                .inner
                .client
                .get_user()
                .await?
                .and_then(|user| user.id_token);
        }

        let url = self.inner.client.signout_request_url(&args).await?;
        if let Err(e) = self.inner.iframe.open_url_with_iframe(&url).await {
            LoggingHelper::log_best_effort_failure("silent sign-out iframe", &e.to_string());
        }
        Ok(())
    }

    /// Alias of [`Self::remove_oidc_user`]
    ///
    /// # Errors
    ///
    /// Returns the client error.
    pub async fn remove_user(&self) -> Result<()> {
        self.remove_oidc_user().await
    }

    /// Remove the user from the client's storage
    ///
    /// The store's session record is left as is; call
    /// [`Self::unset_oidc_auth`] to clear it as well.
    ///
    /// # Errors
    ///
    /// Returns the client error.
    pub async fn remove_oidc_user(&self) -> Result<()> {
        Ok(self.inner.client.remove_user().await?)
    }

    /// # Errors
    ///
    /// Returns the client error.
    pub async fn clear_stale_state(&self) -> Result<()> {
        Ok(self.inner.client.clear_stale_state().await?)
    }
}
