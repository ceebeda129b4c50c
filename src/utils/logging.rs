// Centralized logging for the store, router and relay to keep call sites short
use log::{debug, info, warn};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log the outcome of a route access check
    pub fn log_access_decision(path: &str, reason: &str, has_access: bool) {
        if has_access {
            debug!("Access granted to {path} ({reason})");
        } else {
            info!("Access denied to {path} ({reason}), starting interactive sign-in");
        }
    }

    /// Log that a route was recognised as an OIDC callback
    pub fn log_callback_route(path: &str) {
        debug!("Route {path} is an OIDC callback route, skipping authentication check");
    }

    /// Log a successful authentication recorded in the store
    pub fn log_user_authenticated(subject: Option<&str>) {
        info!(
            "OIDC user authenticated (sub: {})",
            subject.unwrap_or("unknown")
        );
    }

    /// Log that the session fields were cleared
    pub fn log_auth_unset(reason: &str) {
        info!("Clearing OIDC session state: {reason}");
    }

    /// Log an error recorded into the store
    pub fn log_error_recorded(context: &str, message: &str) {
        warn!("OIDC error in {context}: {message}");
    }

    /// Log a best-effort side channel failure
    pub fn log_best_effort_failure(channel: &str, message: &str) {
        debug!("Ignoring {channel} failure: {message}");
    }

    /// Log an event relayed to listeners or to the browser bus
    pub fn log_event_relayed(event_name: &str, to_bus: bool) {
        debug!(
            "Relayed OIDC event {event_name}{}",
            if to_bus { " (and browser bus)" } else { "" }
        );
    }

    /// Log a silent sign-in attempt
    pub fn log_silent_signin(started_by: &str) {
        debug!("Attempting silent sign-in ({started_by})");
    }

    /// Log an event name that has no client subscription
    pub fn log_unknown_event(event_name: &str) {
        debug!("Ignoring listener for unknown OIDC event {event_name}");
    }
}
