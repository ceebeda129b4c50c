//! Session record owned by the store
//!
//! Every change goes through one of the named mutations below; nothing else
//! writes to the record.

use crate::models::User;
use crate::settings::AuthenticatedBy;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct OidcState {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Profile claims of the signed-in user
    pub user: Option<Map<String, Value>>,
    pub scopes: Option<Vec<String>>,
    /// An authentication attempt has completed, or was bypassed for a public route
    pub is_checked: bool,
    pub events_are_bound: bool,
    pub error: Option<String>,
}

impl OidcState {
    pub fn set_auth(&mut self, user: &User) {
        self.id_token.clone_from(&user.id_token);
        self.access_token = Some(user.access_token.clone()).filter(|token| !token.is_empty());
        self.refresh_token.clone_from(&user.refresh_token);
        self.user = Some(user.profile.clone());
        self.scopes = Some(user.scopes());
        self.error = None;
    }

    pub fn set_user(&mut self, user: Option<&User>) {
        self.user = user.map(|user| user.profile.clone());
    }

    pub fn unset_auth(&mut self) {
        self.id_token = None;
        self.access_token = None;
        self.refresh_token = None;
        self.user = None;
        self.scopes = None;
    }

    pub fn set_auth_is_checked(&mut self) {
        self.is_checked = true;
    }

    /// Flip `events_are_bound`, returning whether it was unset before
    pub fn bind_events_once(&mut self) -> bool {
        let first = !self.events_are_bound;
        self.events_are_bound = true;
        first
    }

    pub fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }

    /// Presence of the configured token field
    #[must_use]
    pub fn is_authenticated(&self, by: AuthenticatedBy) -> bool {
        let token = match by {
            AuthenticatedBy::AccessToken => self.access_token.as_deref(),
            AuthenticatedBy::IdToken => self.id_token.as_deref(),
        };
        token.is_some_and(|token| !token.is_empty())
    }
}
