// Integration tests for store getters, sign-in/sign-out actions and event relay
use oidc_store::client::OidcEvent;
use oidc_store::error::StoreError;
use oidc_store::events::{AUTOMATIC_SILENT_RENEW_ERROR_EVENT, OIDC_ERROR_EVENT};
use oidc_store::models::{AuthenticatePayload, SigninOptions, SignoutArgs};
use oidc_store::navigation::{SessionStorage, ACTIVE_ROUTE_KEY};
use oidc_store::settings::{AuthenticatedBy, StoreSettings};
use oidc_store::testing::constants::{LOGIN_REQUIRED, TEST_SIGNOUT_URL};
use oidc_store::testing::mock::{ClientCall, MockOidcClient};
use oidc_store::testing::{TestFixtures, TestStoreBuilder, TestUserBuilder};
use oidc_store::utils::jwt::token_exp;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn recording_listener() -> (Arc<dyn Fn(&Value) + Send + Sync>, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (
        Arc::new(move |detail: &Value| sink.lock().unwrap().push(detail.clone())),
        seen,
    )
}

// =============================================================================
// Getters
// =============================================================================

#[test]
fn test_access_token_round_trip_until_expiry() {
    let harness = TestStoreBuilder::new().build();
    let user = TestUserBuilder::new().build();

    harness.store.set_oidc_auth(&user);
    assert_eq!(
        harness.store.oidc_access_token().as_deref(),
        Some(user.access_token.as_str())
    );
    assert_eq!(
        harness.store.oidc_access_token_exp(),
        token_exp(&user.access_token)
    );

    let expired = TestUserBuilder::new().expired().build();
    harness.store.set_oidc_auth(&expired);
    assert_eq!(harness.store.oidc_access_token(), None);
    assert_eq!(harness.store.oidc_id_token(), None);
    // the expiry stays readable after the token is gone
    assert!(harness.store.oidc_access_token_exp().is_some());
}

#[test]
fn test_tokens_without_exp_never_expire() {
    let harness = TestStoreBuilder::new().build();
    let user = TestUserBuilder::new()
        .without_expiry()
        .with_refresh_token()
        .build();

    harness.store.set_oidc_auth(&user);
    assert_eq!(harness.store.oidc_refresh_token(), user.refresh_token);
    assert_eq!(harness.store.oidc_refresh_token_exp(), None);
    assert_eq!(harness.store.oidc_id_token_exp(), None);
}

#[test]
fn test_scopes_and_profile() {
    let harness = TestStoreBuilder::new().build();
    harness.store.set_oidc_auth(
        &TestUserBuilder::new()
            .with_scope("openid email offline_access")
            .with_claim("name", json!("Alice"))
            .build(),
    );

    assert_eq!(
        harness.store.oidc_scopes(),
        Some(vec![
            "openid".to_string(),
            "email".to_string(),
            "offline_access".to_string()
        ])
    );
    assert_eq!(harness.store.oidc_user().unwrap()["name"], "Alice");

    harness.store.set_oidc_auth(&TestUserBuilder::new().without_scope().build());
    assert_eq!(harness.store.oidc_scopes(), Some(Vec::new()));
}

#[test]
fn test_is_authenticated_by_access_token() {
    let harness = TestStoreBuilder::new()
        .with_store_settings(StoreSettings {
            is_authenticated_by: AuthenticatedBy::AccessToken,
            ..StoreSettings::default()
        })
        .build();
    let mut user = TestUserBuilder::new().build();
    user.access_token = String::new();

    harness.store.set_oidc_auth(&user);
    assert!(!harness.store.oidc_is_authenticated());
}

#[test]
fn test_store_id_and_settings_validation() {
    let harness = TestStoreBuilder::new().build();
    assert_eq!(harness.store.id(), "oidc");

    let mut settings = TestFixtures::oidc_settings_map();
    settings.remove("authority");
    let result = oidc_store::OidcStore::builder(settings)
        .build_with_client(Arc::new(MockOidcClient::new()));
    assert!(result.is_err());
}

// =============================================================================
// Sign-in actions
// =============================================================================

#[tokio::test]
async fn test_authenticate_oidc_stores_return_route_and_uses_defaults() {
    let redirect_defaults = SigninOptions {
        use_replace_to_navigate: Some(true),
        ..SigninOptions::default()
    };
    let harness = TestStoreBuilder::new()
        .with_store_settings(StoreSettings {
            default_signin_redirect_options: Some(redirect_defaults.clone()),
            ..StoreSettings::default()
        })
        .build();

    harness.store.authenticate_oidc("/orders/42").await;

    assert_eq!(
        harness.storage.get_item(ACTIVE_ROUTE_KEY).as_deref(),
        Some("/orders/42")
    );
    assert_eq!(
        harness.client.calls(),
        vec![ClientCall::SigninRedirect(redirect_defaults)]
    );

    harness.store.authenticate_oidc(AuthenticatePayload::default()).await;
    assert_eq!(harness.storage.get_item(ACTIVE_ROUTE_KEY), None);
}

#[tokio::test]
async fn test_authenticate_oidc_failure_is_recorded_and_relayed() {
    let (listener, seen) = recording_listener();
    let harness = TestStoreBuilder::new()
        .with_store_settings(StoreSettings::default().with_window_events())
        .with_client(MockOidcClient::new().failing(ClientCall::SIGNIN_REDIRECT))
        .listener(OIDC_ERROR_EVENT, listener)
        .build();

    harness.store.authenticate_oidc("/orders").await;

    assert_eq!(
        harness.store.oidc_error().as_deref(),
        Some("signin_redirect failed")
    );
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[json!({ "context": "authenticateOidc", "error": "signin_redirect failed" })]
    );
    assert_eq!(harness.bus.event_names(), vec!["oidc:oidcError"]);
}

#[tokio::test]
async fn test_sign_in_callback_returns_stored_route() {
    let harness = TestStoreBuilder::new()
        .with_client(MockOidcClient::new().with_callback_user(TestUserBuilder::new().build()))
        .build();
    harness.storage.set_item(ACTIVE_ROUTE_KEY, "/profile");

    let route = harness
        .store
        .oidc_sign_in_callback(Some("http://localhost:1337/oidc-callback?code=abc"))
        .await
        .unwrap();

    assert_eq!(route, "/profile");
    assert!(harness.store.oidc_is_authenticated());
    assert!(harness.store.state().events_are_bound);
}

#[tokio::test]
async fn test_sign_in_callback_failure_marks_checked() {
    let harness = TestStoreBuilder::new().build();

    let result = harness.store.oidc_sign_in_callback(None).await;

    assert!(matches!(result, Err(StoreError::Client(_))));
    assert_eq!(harness.store.oidc_error().as_deref(), Some(LOGIN_REQUIRED));
    assert!(harness.store.oidc_authentication_is_checked());
}

#[tokio::test]
async fn test_silent_signin_error_handling() {
    let harness = TestStoreBuilder::new().with_silent_signin().build();

    let ignored = harness
        .store
        .authenticate_oidc_silent(AuthenticatePayload::ignoring_errors())
        .await
        .unwrap();
    assert_eq!(ignored, None);
    assert_eq!(harness.store.oidc_error(), None);
    assert!(harness.store.oidc_authentication_is_checked());

    let result = harness
        .store
        .authenticate_oidc_silent(AuthenticatePayload::default())
        .await;
    assert!(result.is_err());
    assert_eq!(harness.store.oidc_error().as_deref(), Some(LOGIN_REQUIRED));
}

#[tokio::test]
async fn test_popup_signin_and_callback() {
    let harness = TestStoreBuilder::new()
        .with_client(
            MockOidcClient::new()
                .with_popup_user(TestUserBuilder::new().with_subject("popup").build())
                .failing(ClientCall::SIGNIN_POPUP_CALLBACK),
        )
        .build();

    harness
        .store
        .authenticate_oidc_popup(AuthenticatePayload::default())
        .await;
    assert_eq!(harness.store.oidc_user().unwrap()["sub"], "popup");

    let result = harness.store.oidc_sign_in_popup_callback(None).await;
    assert!(result.is_err());
    assert_eq!(
        harness.store.oidc_error().as_deref(),
        Some("signin_popup_callback failed")
    );
}

#[tokio::test]
async fn test_store_and_reload_user() {
    let harness = TestStoreBuilder::new().build();
    let user = TestUserBuilder::new().with_subject("stored").build();

    harness.store.store_oidc_user(&user).await.unwrap();
    assert!(harness.store.oidc_is_authenticated());
    assert_eq!(harness.client.cached_user(), Some(user.clone()));

    harness.client.set_user(None);
    let reloaded = harness.store.get_oidc_user().await.unwrap();
    assert_eq!(reloaded, None);
    assert_eq!(harness.store.oidc_user(), None);
}

#[tokio::test]
async fn test_store_user_failure_is_recorded() {
    let harness = TestStoreBuilder::new()
        .with_client(MockOidcClient::new().failing(ClientCall::STORE_USER))
        .build();

    let result = harness
        .store
        .store_oidc_user(&TestUserBuilder::new().build())
        .await;

    assert!(result.is_err());
    assert_eq!(
        harness.store.oidc_error().as_deref(),
        Some("store_user failed")
    );
    assert!(harness.store.oidc_authentication_is_checked());
}

// =============================================================================
// Token expiry events
// =============================================================================

#[tokio::test]
async fn test_access_token_expired_unsets_auth() {
    let harness = TestStoreBuilder::new().build();
    harness
        .store
        .oidc_was_authenticated(&TestUserBuilder::new().build());
    harness
        .store
        .oidc_was_authenticated(&TestUserBuilder::new().build());

    // bound once, however often the user is recorded
    assert_eq!(harness.client.listener_count(OidcEvent::AccessTokenExpired), 1);
    assert_eq!(harness.client.listener_count(OidcEvent::AccessTokenExpiring), 0);

    harness.client.emit(OidcEvent::AccessTokenExpired, &Value::Null);
    assert!(!harness.store.oidc_is_authenticated());
}

#[tokio::test]
async fn test_access_token_expiring_renews_silently() {
    let (listener, seen) = recording_listener();
    let harness = TestStoreBuilder::new()
        .with_silent_signin()
        .with_oidc_setting("automaticSilentRenew", json!(true))
        .listener(AUTOMATIC_SILENT_RENEW_ERROR_EVENT, listener)
        .build();
    harness
        .store
        .oidc_was_authenticated(&TestUserBuilder::new().build());
    assert_eq!(harness.client.listener_count(OidcEvent::AccessTokenExpiring), 1);

    harness.client.emit(OidcEvent::AccessTokenExpiring, &Value::Null);

    for _ in 0..50 {
        if !seen.lock().unwrap().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(harness.client.calls_named(ClientCall::SIGNIN_SILENT), 1);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[json!({ "context": "authenticateOidcSilent", "error": LOGIN_REQUIRED })]
    );
}

// =============================================================================
// Listeners and sign-out
// =============================================================================

#[test]
fn test_add_and_remove_event_listener() {
    let harness = TestStoreBuilder::new().build();
    let (listener, seen) = recording_listener();

    let id = harness
        .store
        .add_oidc_event_listener("userSignedOut", listener.clone())
        .unwrap();
    harness.client.emit(OidcEvent::UserSignedOut, &Value::Null);
    assert_eq!(seen.lock().unwrap().len(), 1);

    assert!(harness.store.remove_oidc_event_listener("userSignedOut", id));
    harness.client.emit(OidcEvent::UserSignedOut, &Value::Null);
    assert_eq!(seen.lock().unwrap().len(), 1);

    assert!(harness
        .store
        .add_oidc_event_listener("notAnEvent", listener)
        .is_none());
}

#[tokio::test]
async fn test_sign_out_redirect_and_popup_unset_auth() {
    let harness = TestStoreBuilder::new().build();

    harness.store.set_oidc_auth(&TestUserBuilder::new().build());
    harness
        .store
        .sign_out_oidc(&SignoutArgs::default())
        .await
        .unwrap();
    assert!(!harness.store.oidc_is_authenticated());

    harness.store.set_oidc_auth(&TestUserBuilder::new().build());
    harness
        .store
        .sign_out_popup_oidc(&SignoutArgs::default())
        .await
        .unwrap();
    assert!(!harness.store.oidc_is_authenticated());

    harness.store.sign_out_oidc_callback(None).await.unwrap();
    harness.store.sign_out_popup_oidc_callback(None).await.unwrap();
    assert_eq!(harness.client.calls_named(ClientCall::SIGNOUT_REDIRECT_CALLBACK), 1);
    assert_eq!(harness.client.calls_named(ClientCall::SIGNOUT_POPUP_CALLBACK), 1);
}

#[tokio::test]
async fn test_failed_sign_out_keeps_session() {
    let harness = TestStoreBuilder::new()
        .with_client(MockOidcClient::new().failing(ClientCall::SIGNOUT_REDIRECT))
        .build();
    harness.store.set_oidc_auth(&TestUserBuilder::new().build());

    assert!(harness
        .store
        .sign_out_oidc(&SignoutArgs::default())
        .await
        .is_err());
    assert!(harness.store.oidc_is_authenticated());
}

#[tokio::test]
async fn test_silent_sign_out_uses_cached_id_token() {
    let user = TestUserBuilder::new().build();
    let id_token = user.id_token.clone().unwrap();
    let harness = TestStoreBuilder::new()
        .with_client(MockOidcClient::new().with_user(user))
        .build();

    harness
        .store
        .sign_out_oidc_silent(&SignoutArgs::default())
        .await
        .unwrap();

    assert_eq!(
        harness.iframe.urls(),
        vec![format!("{TEST_SIGNOUT_URL}?id_token_hint={id_token}")]
    );
}

#[tokio::test]
async fn test_silent_sign_out_ignores_iframe_failure() {
    let harness = TestStoreBuilder::new().with_failing_iframe().build();

    let result = harness
        .store
        .sign_out_oidc_silent(&SignoutArgs {
            id_token_hint: Some("hint".to_string()),
            ..SignoutArgs::default()
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(harness.client.calls_named(ClientCall::GET_USER), 0);
    assert_eq!(harness.iframe.urls().len(), 1);
}

#[tokio::test]
async fn test_remove_user_keeps_store_state() {
    let user = TestUserBuilder::new().build();
    let harness = TestStoreBuilder::new()
        .with_client(MockOidcClient::new().with_user(user.clone()))
        .build();
    harness.store.set_oidc_auth(&user);

    harness.store.remove_user().await.unwrap();
    harness.store.clear_stale_state().await.unwrap();

    assert_eq!(harness.client.cached_user(), None);
    assert!(harness.store.oidc_is_authenticated());
    assert_eq!(harness.client.calls_named(ClientCall::CLEAR_STALE_STATE), 1);
}
