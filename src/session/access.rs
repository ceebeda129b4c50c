//! Route access check run by the router guards
//!
//! ```text
//! checking-cache ──valid user──────────────────────────────► allow
//!        │
//!        ├─public route──► clear stale auth, best-effort silent ► allow
//!        │
//!        └─private route─► silent retry ──valid user──────────► allow
//!                               └───────still none──► redirect, deny
//! ```
//!
//! Callback routes are granted before the cache is consulted.

use super::store::OidcStore;
use crate::models::{AuthenticatePayload, Route, User};
use crate::utils::logging::LoggingHelper;
use log::debug;

impl OidcStore {
    /// Decide whether navigation to `route` may proceed
    ///
    /// Denial always comes with an interactive sign-in that navigates away,
    /// carrying `route.full_path` as the return-to route.
    pub async fn oidc_check_access(&self, route: &Route) -> bool {
        if self.inner.routes.is_oidc_callback(route) {
            LoggingHelper::log_callback_route(&route.path);
            return true;
        }

        let was_authenticated = self.oidc_is_authenticated();

        if let Some(user) = self.cached_valid_user().await {
            self.oidc_was_authenticated(&user);
            if !was_authenticated {
                self.inner.relay.emit_user_loaded(&user);
            }
            LoggingHelper::log_access_decision(&route.path, "cached user", true);
            return true;
        }

        let silent_signin = self.inner.config.silent_signin_enabled();

        if self.oidc_is_route_public(route) {
            if was_authenticated {
                self.unset_oidc_auth();
            }
            self.set_oidc_auth_is_checked();
            if silent_signin {
                self.spawn_best_effort_silent_signin();
            }
            LoggingHelper::log_access_decision(&route.path, "public route", true);
            return true;
        }

        if silent_signin {
            // failures are swallowed; the re-fetch below decides
            let _ = self
                .authenticate_oidc_silent(AuthenticatePayload::ignoring_errors())
                .await;

            if self.cached_valid_user().await.is_some() {
                LoggingHelper::log_access_decision(&route.path, "silent sign-in", true);
                return true;
            }
        }

        if was_authenticated {
            self.unset_oidc_auth();
        }

        self.authenticate_oidc(AuthenticatePayload::with_redirect_path(return_path(route)))
            .await;
        LoggingHelper::log_access_decision(&route.path, "sign-in required", false);
        false
    }

    /// Cached user from the client, if present and unexpired
    ///
    /// A failing lookup counts as no user.
    async fn cached_valid_user(&self) -> Option<User> {
        match self.inner.client.get_user().await {
            Ok(user) => user.filter(|user| !user.expired()),
            Err(e) => {
                debug!("Cached user lookup failed: {e}");
                None
            }
        }
    }

    fn spawn_best_effort_silent_signin(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime available, skipping silent sign-in on public route");
            return;
        };

        LoggingHelper::log_silent_signin("public route");
        let store = self.clone();
        handle.spawn(async move {
            // outcome does not affect the navigation that started it
            let _ = store
                .authenticate_oidc_silent(AuthenticatePayload::ignoring_errors())
                .await;
        });
    }
}

fn return_path(route: &Route) -> &str {
    if route.full_path.is_empty() {
        &route.path
    } else {
        &route.full_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::builders::{TestStoreBuilder, TestUserBuilder};
    use crate::testing::mock::{ClientCall, MockOidcClient};

    #[tokio::test]
    async fn test_callback_route_skips_user_lookup() {
        let harness = TestStoreBuilder::new().build();

        assert!(harness.store.oidc_check_access(&Route::new("/oidc-callback")).await);
        assert!(
            harness
                .store
                .oidc_check_access(&Route::new("/anywhere").oidc_callback())
                .await
        );
        assert_eq!(harness.client.calls_named(ClientCall::GET_USER), 0);
    }

    #[tokio::test]
    async fn test_cached_user_grants_access_and_records_auth() {
        let user = TestUserBuilder::new().with_subject("alice").build();
        let harness = TestStoreBuilder::new()
            .with_client(MockOidcClient::new().with_user(user.clone()))
            .build();

        assert!(harness.store.oidc_check_access(&Route::new("/dashboard")).await);
        assert!(harness.store.oidc_is_authenticated());
        assert!(harness.store.oidc_authentication_is_checked());
        assert_eq!(harness.store.oidc_id_token(), user.id_token);
    }

    #[tokio::test]
    async fn test_expired_cached_user_counts_as_none() {
        let harness = TestStoreBuilder::new()
            .with_client(MockOidcClient::new().with_user(TestUserBuilder::new().expired().build()))
            .build();

        assert!(!harness.store.oidc_check_access(&Route::new("/dashboard")).await);
        assert_eq!(harness.client.calls_named(ClientCall::SIGNIN_REDIRECT), 1);
    }

    #[test]
    fn test_return_path_prefers_full_path() {
        let route = Route::new("/orders").with_full_path("/orders?page=2");
        assert_eq!(return_path(&route), "/orders?page=2");

        let route = Route::new("/orders").with_full_path("");
        assert_eq!(return_path(&route), "/orders");
    }
}
