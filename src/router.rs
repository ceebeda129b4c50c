//! Navigation guards for the host router
//!
//! Both guards run [`OidcStore::oidc_check_access`] on the target route. On
//! denial the store has already started an interactive sign-in, so the guard
//! only has to hold the navigation back.

use crate::models::Route;
use crate::session::OidcStore;
use serde::{Deserialize, Serialize};

/// Guard in the `(to, from, next)` style
#[derive(Clone)]
pub struct RouterMiddleware {
    store: OidcStore,
}

impl RouterMiddleware {
    #[must_use]
    pub fn new(store: OidcStore) -> Self {
        Self { store }
    }

    /// Calls `next` only when access is granted and reports the decision
    pub async fn guard<F>(&self, to: &Route, _from: &Route, next: F) -> bool
    where
        F: FnOnce(),
    {
        let has_access = self.store.oidc_check_access(to).await;
        if has_access {
            next();
        }
        has_access
    }
}

/// Context handed to a promise-style guard
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RouteContext {
    pub route: Route,
}

impl From<Route> for RouteContext {
    fn from(route: Route) -> Self {
        Self { route }
    }
}

/// Result of a promise-style guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Navigation may proceed
    Allow,
    /// Navigation stops here; a sign-in redirect is underway
    Halt,
}

impl NavigationOutcome {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == NavigationOutcome::Allow
    }
}

/// Guard in the context/promise style
#[derive(Clone)]
pub struct NextRouterMiddleware {
    store: OidcStore,
}

impl NextRouterMiddleware {
    #[must_use]
    pub fn new(store: OidcStore) -> Self {
        Self { store }
    }

    pub async fn call(&self, context: &RouteContext) -> NavigationOutcome {
        if self.store.oidc_check_access(&context.route).await {
            NavigationOutcome::Allow
        } else {
            NavigationOutcome::Halt
        }
    }
}

#[must_use]
pub fn create_router_middleware(store: &OidcStore) -> RouterMiddleware {
    RouterMiddleware::new(store.clone())
}

#[must_use]
pub fn create_next_router_middleware(store: &OidcStore) -> NextRouterMiddleware {
    NextRouterMiddleware::new(store.clone())
}
