//! Callback handlers usable without a store
//!
//! These run on the callback pages themselves (the silent renew iframe, the
//! redirect landing route), where building a whole store is unnecessary.

use crate::client::{OidcClient, OidcClientFactory};
use crate::error::{ConfigError, Result};
use crate::navigation::{active_route_or_default, SessionStorage};
use crate::settings::OidcClientConfig;
use log::debug;
use serde_json::{Map, Value};
use std::sync::Arc;

pub use crate::session::routes::get_oidc_callback_path;

/// Normalize and validate `settings`, then let `factory` build the client
///
/// # Errors
///
/// Returns `ConfigError::MissingSetting` naming the first required setting
/// that is absent.
pub fn create_oidc_user_manager(
    factory: &dyn OidcClientFactory,
    settings: &Map<String, Value>,
) -> Result<Arc<dyn OidcClient>, ConfigError> {
    let config = OidcClientConfig::new(settings)?;
    Ok(factory.create(&config))
}

/// Complete a silent sign-in inside the hidden iframe
///
/// # Errors
///
/// Returns a configuration error before any client is built, or the client's
/// callback error.
pub async fn process_silent_sign_in_callback(
    factory: &dyn OidcClientFactory,
    settings: &Map<String, Value>,
    url: Option<&str>,
) -> Result<()> {
    let client = create_oidc_user_manager(factory, settings)?;
    client.signin_silent_callback(url).await?;
    debug!("Silent sign-in callback processed");
    Ok(())
}

/// Complete a redirect sign-in and return the route to navigate back to
///
/// # Errors
///
/// Returns a configuration error before any client is built, or the client's
/// callback error.
pub async fn process_sign_in_callback(
    factory: &dyn OidcClientFactory,
    settings: &Map<String, Value>,
    storage: &dyn SessionStorage,
    url: Option<&str>,
) -> Result<String> {
    let client = create_oidc_user_manager(factory, settings)?;
    client.signin_redirect_callback(url).await?;
    Ok(active_route_or_default(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::navigation::{MemorySessionStorage, ACTIVE_ROUTE_KEY};
    use crate::testing::builders::TestUserBuilder;
    use crate::testing::fixtures::TestFixtures;
    use crate::testing::mock::{ClientCall, MockClientFactory, MockOidcClient};

    #[test]
    fn test_create_user_manager_normalizes_settings() {
        let factory = MockClientFactory::new(MockOidcClient::new());
        let mut settings = TestFixtures::oidc_settings_map();
        settings.remove("client_id");
        settings.insert("clientId".to_string(), Value::from("camel-client"));

        assert!(create_oidc_user_manager(&factory, &settings).is_ok());

        let config = factory.last_config().unwrap();
        assert_eq!(config.client_id(), Some("camel-client"));
        assert!(!config.automatic_silent_renew());
    }

    #[test]
    fn test_create_user_manager_names_missing_setting() {
        let factory = MockClientFactory::new(MockOidcClient::new());
        let mut settings = TestFixtures::oidc_settings_map();
        settings.remove("scope");

        let err = create_oidc_user_manager(&factory, &settings).err().unwrap();
        assert!(matches!(err, ConfigError::MissingSetting("scope")));
        assert!(factory.last_config().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_callback_returns_stored_route() {
        let factory = MockClientFactory::new(
            MockOidcClient::new().with_callback_user(TestUserBuilder::new().build()),
        );
        let storage = MemorySessionStorage::new();
        storage.set_item(ACTIVE_ROUTE_KEY, "/orders?page=2");

        let route = process_sign_in_callback(
            &factory,
            &TestFixtures::oidc_settings_map(),
            &storage,
            None,
        )
        .await
        .unwrap();

        assert_eq!(route, "/orders?page=2");
    }

    #[tokio::test]
    async fn test_sign_in_callback_defaults_to_root_and_propagates_errors() {
        let ok_factory = MockClientFactory::new(
            MockOidcClient::new().with_callback_user(TestUserBuilder::new().build()),
        );
        let storage = MemorySessionStorage::new();
        let route = process_sign_in_callback(
            &ok_factory,
            &TestFixtures::oidc_settings_map(),
            &storage,
            None,
        )
        .await
        .unwrap();
        assert_eq!(route, "/");

        let failing = MockClientFactory::new(MockOidcClient::new());
        let result = process_sign_in_callback(
            &failing,
            &TestFixtures::oidc_settings_map(),
            &storage,
            None,
        )
        .await;
        assert!(matches!(result, Err(StoreError::Client(_))));
    }

    #[tokio::test]
    async fn test_silent_callback_delegates_to_client() {
        let factory = MockClientFactory::new(MockOidcClient::new());

        process_silent_sign_in_callback(
            &factory,
            &TestFixtures::oidc_settings_map_with_silent(),
            Some("http://localhost:1337/oidc-silent-renew#state=abc"),
        )
        .await
        .unwrap();

        assert_eq!(
            factory.client().calls(),
            vec![ClientCall::SigninSilentCallback(Some(
                "http://localhost:1337/oidc-silent-renew#state=abc".to_string()
            ))]
        );
    }
}
