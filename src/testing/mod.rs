//! Testing utilities for the OIDC store
//!
//! Enabled under `cfg(test)` and by the `testing` feature, so integration
//! tests can build stores without a real identity provider.
//!
//! ## Organization
//!
//! - [`fixtures`] - Pre-built settings maps and unsigned tokens
//! - [`builders`] - Fluent builders for users and fully wired test stores
//! - [`mock`] - Mock client, client factory, event bus and iframe opener
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oidc_store::models::Route;
//! use oidc_store::testing::{TestStoreBuilder, TestUserBuilder};
//! use oidc_store::testing::mock::MockOidcClient;
//!
//! async fn dashboard_is_reachable_when_signed_in() {
//!     let harness = TestStoreBuilder::new()
//!         .with_client(MockOidcClient::new().with_user(TestUserBuilder::new().build()))
//!         .build();
//!
//!     assert!(harness.store.oidc_check_access(&Route::new("/dashboard")).await);
//! }
//! ```

pub mod builders;
pub mod fixtures;
pub mod mock;

pub use builders::*;
pub use fixtures::TestFixtures;

/// Common test constants
pub mod constants {
    pub const TEST_AUTHORITY: &str = "https://idp.example.com";

    pub const TEST_CLIENT_ID: &str = "spa-client";

    pub const TEST_REDIRECT_URI: &str = "http://localhost:1337/oidc-callback";

    pub const TEST_POPUP_REDIRECT_URI: &str = "http://localhost:1337/oidc-popup-callback";

    pub const TEST_SILENT_REDIRECT_URI: &str = "http://localhost:1337/oidc-silent-renew";

    pub const TEST_SCOPE: &str = "openid profile";

    /// Default `sub` claim of test users
    pub const TEST_SUBJECT: &str = "test-user";

    pub const TEST_EMAIL: &str = "test@example.com";

    /// End-session URL returned by the mock client
    pub const TEST_SIGNOUT_URL: &str = "https://idp.example.com/connect/endsession";

    /// Error message of mock sign-in flows without a configured user
    pub const LOGIN_REQUIRED: &str = "login_required";
}
