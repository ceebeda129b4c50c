//! OIDC session store
//!
//! # Modules
//!
//! - [`state`] - The session record and its mutations
//! - [`routes`] - Public and callback route detection
//! - [`store`] - Store handle with getters and actions
//! - [`access`] - Route access check used by the router guards

pub mod access;
pub mod routes;
pub mod state;
pub mod store;

pub use routes::{get_oidc_callback_path, RouteMatcher};
pub use state::OidcState;
pub use store::{OidcStore, OidcStoreBuilder, STORE_ID};
