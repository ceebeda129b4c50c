//! Event and error relay
//!
//! Lifecycle events from the wrapped client, plus errors raised by the store
//! itself, are forwarded to the caller's listener map and, when enabled, to a
//! browser event bus under the `oidc:` prefix. Bus dispatch is a best-effort
//! side channel: failures are logged and dropped.

use crate::client::{EventListener, OidcClient, OidcEvent};
use crate::models::{ErrorPayload, User};
use crate::utils::logging::LoggingHelper;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Prefix applied to every event published on the browser bus
pub const EVENT_PREFIX: &str = "oidc:";

/// Local error event; not raised by the wrapped client
pub const OIDC_ERROR_EVENT: &str = "oidcError";

/// Failure of the store-driven renewal on `accessTokenExpiring`
pub const AUTOMATIC_SILENT_RENEW_ERROR_EVENT: &str = "automaticSilentRenewError";

/// Listeners keyed by event name, client events and local error events alike
pub type EventListeners = HashMap<String, EventListener>;

/// Custom event as published on the browser bus
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserEvent {
    /// Prefixed name, e.g. `oidc:userLoaded`
    pub name: String,
    pub detail: Value,
    pub bubbles: bool,
    pub cancelable: bool,
}

impl BrowserEvent {
    #[must_use]
    pub fn new(event_name: &str, detail: Value) -> Self {
        Self {
            name: prefixed_event_name(event_name),
            detail,
            bubbles: false,
            cancelable: false,
        }
    }
}

/// Global event bus, the `window` of a browser host
pub trait BrowserEventBus: Send + Sync {
    /// # Errors
    ///
    /// Returns a description of why the event could not be delivered.
    fn dispatch_event(&self, event: BrowserEvent) -> Result<(), String>;
}

/// In-process bus backed by a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<BrowserEvent>,
}

impl BroadcastEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BrowserEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BrowserEventBus for BroadcastEventBus {
    fn dispatch_event(&self, event: BrowserEvent) -> Result<(), String> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|e| format!("no subscribers for {}", e.0.name))
    }
}

#[must_use]
pub fn prefixed_event_name(event_name: &str) -> String {
    format!("{EVENT_PREFIX}{event_name}")
}

/// Publish `detail` on the bus as `oidc:<event_name>`
///
/// Does nothing without a bus. Delivery failures are ignored.
pub fn dispatch_custom_browser_event(
    bus: Option<&dyn BrowserEventBus>,
    event_name: &str,
    detail: &Value,
) {
    let Some(bus) = bus else {
        return;
    };

    let detail = if detail.is_null() {
        json!({})
    } else {
        detail.clone()
    };

    if let Err(e) = bus.dispatch_event(BrowserEvent::new(event_name, detail)) {
        LoggingHelper::log_best_effort_failure("browser event dispatch", &e);
    }
}

/// Fans events out to listeners and the optional browser bus
#[derive(Clone, Default)]
pub struct EventRelay {
    listeners: EventListeners,
    bus: Option<Arc<dyn BrowserEventBus>>,
    dispatch_on_window: bool,
}

impl EventRelay {
    #[must_use]
    pub fn new(
        listeners: EventListeners,
        bus: Option<Arc<dyn BrowserEventBus>>,
        dispatch_on_window: bool,
    ) -> Self {
        Self {
            listeners,
            bus,
            dispatch_on_window,
        }
    }

    #[must_use]
    pub fn listener(&self, event_name: &str) -> Option<&EventListener> {
        self.listeners.get(event_name)
    }

    /// Whether events also go to the browser bus
    #[must_use]
    pub fn dispatches_on_window(&self) -> bool {
        self.dispatch_on_window && self.bus.is_some()
    }

    fn window_bus(&self) -> Option<&dyn BrowserEventBus> {
        if self.dispatch_on_window {
            self.bus.as_deref()
        } else {
            None
        }
    }

    /// Subscribe the listener map and, if enabled, the bus forwarders on the client
    ///
    /// Listener names that the client does not raise (such as `oidcError`)
    /// stay local to the relay.
    pub fn bind_client(&self, client: &dyn OidcClient) {
        for (event_name, listener) in &self.listeners {
            match event_name.parse::<OidcEvent>() {
                Ok(event) => {
                    client.add_event_listener(event, Arc::clone(listener));
                }
                Err(_) => {
                    if event_name != OIDC_ERROR_EVENT
                        && event_name != AUTOMATIC_SILENT_RENEW_ERROR_EVENT
                    {
                        LoggingHelper::log_unknown_event(event_name);
                    }
                }
            }
        }

        let Some(bus) = self.bus.as_ref().filter(|_| self.dispatch_on_window) else {
            return;
        };
        for event in OidcEvent::ALL {
            let bus = Arc::clone(bus);
            client.add_event_listener(
                event,
                Arc::new(move |detail: &Value| {
                    dispatch_custom_browser_event(Some(bus.as_ref()), event.as_str(), detail);
                }),
            );
        }
    }

    /// Relay a local error event
    pub fn dispatch_custom_error_event(&self, event_name: &str, payload: &ErrorPayload) {
        let detail = json!({ "context": payload.context, "error": payload.error });
        if let Some(listener) = self.listeners.get(event_name) {
            listener(&detail);
        }
        dispatch_custom_browser_event(self.window_bus(), event_name, &detail);
        LoggingHelper::log_event_relayed(event_name, self.dispatches_on_window());
    }

    /// Relay `userLoaded` for a user the store picked up from the client cache
    pub fn emit_user_loaded(&self, user: &User) {
        let event_name = OidcEvent::UserLoaded.as_str();
        let detail = serde_json::to_value(user).unwrap_or(Value::Null);
        if let Some(listener) = self.listeners.get(event_name) {
            listener(&detail);
        }
        dispatch_custom_browser_event(self.window_bus(), event_name, &detail);
        LoggingHelper::log_event_relayed(event_name, self.dispatches_on_window());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::{MockOidcClient, RecordingEventBus};
    use std::sync::Mutex;

    fn recording_listener() -> (EventListener, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: EventListener = Arc::new(move |detail: &Value| {
            sink.lock().unwrap().push(detail.clone());
        });
        (listener, seen)
    }

    #[test]
    fn test_prefixed_event_name() {
        assert_eq!(prefixed_event_name("userLoaded"), "oidc:userLoaded");
    }

    #[test]
    fn test_dispatch_without_bus_is_a_no_op() {
        dispatch_custom_browser_event(None, "userLoaded", &json!({}));
    }

    #[test]
    fn test_null_detail_becomes_empty_object() {
        let bus = RecordingEventBus::new();
        dispatch_custom_browser_event(Some(&bus), "userSignedOut", &Value::Null);

        let events = bus.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "oidc:userSignedOut");
        assert_eq!(events[0].detail, json!({}));
    }

    #[test]
    fn test_bus_failures_are_ignored() {
        // no subscribers, so the broadcast send fails
        let bus = BroadcastEventBus::new(4);
        dispatch_custom_browser_event(Some(&bus), "userLoaded", &json!({ "sub": "1" }));
    }

    #[tokio::test]
    async fn test_broadcast_bus_delivers_to_subscribers() {
        let bus = BroadcastEventBus::default();
        let mut receiver = bus.subscribe();

        dispatch_custom_browser_event(Some(&bus), "accessTokenExpired", &json!({ "a": 1 }));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, "oidc:accessTokenExpired");
        assert_eq!(event.detail, json!({ "a": 1 }));
    }

    #[test]
    fn test_error_event_goes_to_listener_and_bus() {
        let (listener, seen) = recording_listener();
        let bus = Arc::new(RecordingEventBus::new());
        let relay = EventRelay::new(
            HashMap::from([(OIDC_ERROR_EVENT.to_string(), listener)]),
            Some(bus.clone() as Arc<dyn BrowserEventBus>),
            true,
        );

        relay.dispatch_custom_error_event(
            OIDC_ERROR_EVENT,
            &ErrorPayload::new("authenticateOidc", "boom"),
        );

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[json!({ "context": "authenticateOidc", "error": "boom" })]
        );
        assert_eq!(bus.event_names(), vec!["oidc:oidcError"]);
    }

    #[test]
    fn test_bus_is_skipped_when_window_dispatch_is_off() {
        let bus = Arc::new(RecordingEventBus::new());
        let relay = EventRelay::new(
            EventListeners::new(),
            Some(bus.clone() as Arc<dyn BrowserEventBus>),
            false,
        );

        relay.dispatch_custom_error_event(
            OIDC_ERROR_EVENT,
            &ErrorPayload::new("storeOidcUser", "nope"),
        );
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_bind_client_subscribes_known_events_only() {
        let (listener, seen) = recording_listener();
        let (error_listener, _) = recording_listener();
        let client = MockOidcClient::new();
        let relay = EventRelay::new(
            HashMap::from([
                ("userSignedOut".to_string(), listener),
                (OIDC_ERROR_EVENT.to_string(), error_listener),
            ]),
            None,
            false,
        );

        relay.bind_client(&client);

        assert_eq!(client.listener_count(OidcEvent::UserSignedOut), 1);
        client.emit(OidcEvent::UserSignedOut, &json!(null));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_bind_client_forwards_all_client_events_to_bus() {
        let client = MockOidcClient::new();
        let bus = Arc::new(RecordingEventBus::new());
        let relay = EventRelay::new(
            EventListeners::new(),
            Some(bus.clone() as Arc<dyn BrowserEventBus>),
            true,
        );

        relay.bind_client(&client);
        for event in OidcEvent::ALL {
            assert_eq!(client.listener_count(event), 1);
        }

        client.emit(OidcEvent::AccessTokenExpiring, &Value::Null);
        assert_eq!(bus.event_names(), vec!["oidc:accessTokenExpiring"]);
    }
}
