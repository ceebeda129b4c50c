#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the oidc-store crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod callbacks;
pub mod client;
pub mod error;
pub mod events;
pub mod models;
pub mod navigation;
pub mod router;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use callbacks::{
    create_oidc_user_manager, get_oidc_callback_path, process_sign_in_callback,
    process_silent_sign_in_callback,
};
pub use client::{EventListener, ListenerId, OidcClient, OidcClientFactory, OidcEvent};
pub use error::{ClientError, ConfigError, StoreError};
pub use events::{dispatch_custom_browser_event, BroadcastEventBus, BrowserEvent, BrowserEventBus};
pub use models::{AuthenticatePayload, Route, SigninOptions, SignoutArgs, User};
pub use router::{create_next_router_middleware, create_router_middleware, NavigationOutcome};
pub use session::{OidcState, OidcStore, OidcStoreBuilder};
pub use settings::{OidcClientConfig, StoreConfig, StoreSettings};

/// Build the store module from raw client settings and store settings
///
/// # Errors
///
/// Returns `ConfigError::MissingSetting` if a required client setting is absent.
pub fn create_store_module(
    factory: &dyn OidcClientFactory,
    oidc_settings: serde_json::Map<String, serde_json::Value>,
    store_settings: StoreSettings,
    listeners: events::EventListeners,
) -> Result<OidcStore, ConfigError> {
    OidcStore::builder(oidc_settings)
        .store_settings(store_settings)
        .listeners(listeners)
        .build(factory)
}
