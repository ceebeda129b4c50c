//! Browser-side collaborators: session storage and hidden iframe navigation

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Session storage key holding the route to return to after sign-in
pub const ACTIVE_ROUTE_KEY: &str = "vuex_oidc_active_route";

/// Route used when no return-to route was stored
pub const DEFAULT_RETURN_ROUTE: &str = "/";

/// Minimal key/value session storage
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-memory storage for non-browser hosts and tests
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Stored return-to route, or `/`
#[must_use]
pub fn active_route_or_default(storage: &dyn SessionStorage) -> String {
    storage
        .get_item(ACTIVE_ROUTE_KEY)
        .filter(|route| !route.is_empty())
        .unwrap_or_else(|| DEFAULT_RETURN_ROUTE.to_string())
}

/// Loads a URL in a hidden iframe and resolves once it has loaded
#[async_trait]
pub trait IframeOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when there is no window to host the iframe.
    async fn open_url_with_iframe(&self, url: &str) -> Result<(), StoreError>;
}

/// Opener for hosts without a window; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWindowIframeOpener;

#[async_trait]
impl IframeOpener for NoWindowIframeOpener {
    async fn open_url_with_iframe(&self, _url: &str) -> Result<(), StoreError> {
        Err(StoreError::Navigation(
            "open_url_with_iframe does not work when window is undefined".to_string(),
        ))
    }
}
