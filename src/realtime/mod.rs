//! Realtime push to connected clients.
//!
//! A single [`Broadcaster`] holds every live connection, WebSocket and SSE
//! alike. Each client owns the receiving half of an unbounded channel; the
//! transport task drains it onto the wire. Removing a client from the
//! registry drops the sender, which ends that task.
//!
//! Delivery is best effort: no queueing for offline clients, no replay.
//!
//! # Liveness
//!
//! Every heartbeat cycle, WebSocket clients that have not answered the
//! previous ping are dropped and the rest are pinged again. SSE clients get
//! a `heartbeat` event and are dropped once their stream is gone.

pub mod sse;
pub mod ws;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::comparison::Comparison;

/// Connection transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    WebSocket,
    Sse,
}

/// Server-to-client events. Serialized with a kebab-case `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Connected {
        client_id: Uuid,
        message: String,
    },
    Subscribed {
        countries: Vec<String>,
    },
    Unsubscribed {
        countries: Vec<String>,
    },
    Pong,
    ComparisonResult {
        data: Box<Comparison>,
    },
    Error {
        message: String,
    },
    DataUpdated {
        message: String,
        /// Providers that succeeded in the run.
        providers: Vec<String>,
        /// Records produced per successful provider.
        records: BTreeMap<String, usize>,
    },
    Heartbeat,
}

impl ServerEvent {
    /// The `type` tag, also used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::Subscribed { .. } => "subscribed",
            ServerEvent::Unsubscribed { .. } => "unsubscribed",
            ServerEvent::Pong => "pong",
            ServerEvent::ComparisonResult { .. } => "comparison-result",
            ServerEvent::Error { .. } => "error",
            ServerEvent::DataUpdated { .. } => "data-updated",
            ServerEvent::Heartbeat => "heartbeat",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

/// An event stamped with its send time.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    #[serde(flatten)]
    pub event: ServerEvent,
    pub timestamp: DateTime<Utc>,
}

impl ServerMessage {
    pub fn new(event: ServerEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing plain data with string keys cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Client-to-server WebSocket messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(default)]
        countries: Vec<String>,
    },
    Unsubscribe {
        #[serde(default)]
        countries: Vec<String>,
    },
    Ping,
    Compare {
        #[serde(alias = "c1", default)]
        country1: Option<String>,
        #[serde(alias = "c2", default)]
        country2: Option<String>,
    },
}

/// What a transport task is asked to put on the wire.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMessage),
    /// Transport-level ping (WebSocket only).
    Ping,
}

struct Client {
    transport: Transport,
    tx: mpsc::UnboundedSender<Outbound>,
    subscriptions: BTreeSet<String>,
    alive: bool,
}

impl Client {
    fn send(&self, outbound: Outbound) -> bool {
        self.tx.send(outbound).is_ok()
    }

    fn is_subscribed_to_any(&self, codes: &BTreeSet<String>) -> bool {
        !self.subscriptions.is_disjoint(codes)
    }
}

/// Registry of connected clients. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct Broadcaster {
    clients: Arc<Mutex<HashMap<Uuid, Client>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Client>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a client and return its id with the receiving end of its queue.
    pub fn register(&self, transport: Transport) -> (Uuid, mpsc::UnboundedReceiver<Outbound>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(
            id,
            Client {
                transport,
                tx,
                subscriptions: BTreeSet::new(),
                alive: true,
            },
        );
        info!(client_id = %id, ?transport, "Realtime client connected");
        (id, rx)
    }

    /// Remove a client. Returns `false` when it was already gone.
    pub fn unregister(&self, id: Uuid) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            info!(client_id = %id, "Realtime client disconnected");
        }
        removed
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    /// Add country codes (uppercased) to a client's subscriptions.
    ///
    /// # Returns
    ///
    /// The full subscription list, or `None` for an unknown client.
    pub fn subscribe(&self, id: Uuid, codes: &[String]) -> Option<Vec<String>> {
        let mut clients = self.lock();
        let client = clients.get_mut(&id)?;
        client
            .subscriptions
            .extend(codes.iter().map(|c| c.trim().to_uppercase()));
        Some(client.subscriptions.iter().cloned().collect())
    }

    /// Remove country codes from a client's subscriptions.
    pub fn unsubscribe(&self, id: Uuid, codes: &[String]) -> Option<Vec<String>> {
        let mut clients = self.lock();
        let client = clients.get_mut(&id)?;
        for code in codes {
            client.subscriptions.remove(&code.trim().to_uppercase());
        }
        Some(client.subscriptions.iter().cloned().collect())
    }

    /// Record a pong (or any sign of life) from a client.
    pub fn mark_alive(&self, id: Uuid) {
        if let Some(client) = self.lock().get_mut(&id) {
            client.alive = true;
        }
    }

    /// Send to one client. Returns `false` when it is gone.
    pub fn send_to(&self, id: Uuid, event: ServerEvent) -> bool {
        match self.lock().get(&id) {
            Some(client) => client.send(Outbound::Message(ServerMessage::new(event))),
            None => false,
        }
    }

    /// Send to every client. Returns the number of clients reached.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        let kind = event.kind();
        let message = ServerMessage::new(event);
        let clients = self.lock();
        let reached = clients
            .values()
            .filter(|client| client.send(Outbound::Message(message.clone())))
            .count();
        debug!(kind, reached, total = clients.len(), "Broadcast sent");
        reached
    }

    /// Send to clients subscribed to at least one of `codes`.
    ///
    /// Sync notifications go to every client through [`Self::broadcast`];
    /// subscription sets are kept so per-country events can be routed here
    /// to the clients that asked for them.
    pub fn broadcast_to_subscribed(&self, codes: &[String], event: ServerEvent) -> usize {
        let codes: BTreeSet<String> = codes.iter().map(|c| c.trim().to_uppercase()).collect();
        let message = ServerMessage::new(event);
        self.lock()
            .values()
            .filter(|client| client.is_subscribed_to_any(&codes))
            .filter(|client| client.send(Outbound::Message(message.clone())))
            .count()
    }

    /// Run one liveness cycle.
    ///
    /// # Returns
    ///
    /// The number of clients dropped.
    pub fn heartbeat_tick(&self) -> usize {
        let mut clients = self.lock();
        let before = clients.len();

        clients.retain(|id, client| match client.transport {
            Transport::WebSocket if !client.alive => {
                debug!(client_id = %id, "Client missed heartbeat");
                false
            }
            Transport::WebSocket => {
                client.alive = false;
                client.send(Outbound::Ping)
            }
            Transport::Sse => {
                client.send(Outbound::Message(ServerMessage::new(ServerEvent::Heartbeat)))
            }
        });

        let dropped = before - clients.len();
        if dropped > 0 {
            info!(dropped, remaining = clients.len(), "Dropped unresponsive realtime clients");
        }
        dropped
    }

    /// Run [`Self::heartbeat_tick`] every `interval` until the task is aborted.
    pub fn spawn_heartbeat(&self, interval: Duration) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                broadcaster.heartbeat_tick();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_event_serialization() {
        let message = ServerMessage::new(ServerEvent::DataUpdated {
            message: "Country data has been refreshed".into(),
            providers: vec!["who".into()],
            records: BTreeMap::from([("who".to_string(), 10)]),
        });
        let json: serde_json::Value = serde_json::from_str(&message.to_json()).unwrap();

        assert_eq!(json["type"], "data-updated");
        assert_eq!(json["providers"][0], "who");
        assert_eq!(json["records"]["who"], 10);
        assert!(json["timestamp"].is_string());

        let connected = ServerMessage::new(ServerEvent::Connected {
            client_id: Uuid::nil(),
            message: "hi".into(),
        });
        let json: serde_json::Value = serde_json::from_str(&connected.to_json()).unwrap();
        assert_eq!(json["clientId"], Uuid::nil().to_string());
    }

    #[test]
    fn test_client_message_aliases() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"compare","c1":"us","c2":"de"}"#).unwrap();
        match msg {
            ClientMessage::Compare { country1, country2 } => {
                assert_eq!(country1.as_deref(), Some("us"));
                assert_eq!(country2.as_deref(), Some("de"));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[tokio::test]
    async fn test_broadcast_to_subscribed_only() {
        let broadcaster = Broadcaster::new();
        let (us_fan, mut us_rx) = broadcaster.register(Transport::WebSocket);
        let (_other, mut other_rx) = broadcaster.register(Transport::Sse);

        assert_eq!(
            broadcaster.subscribe(us_fan, &codes(&["us", "de"])),
            Some(codes(&["DE", "US"]))
        );

        let reached = broadcaster.broadcast_to_subscribed(&codes(&["US"]), ServerEvent::Pong);
        assert_eq!(reached, 1);
        assert_eq!(drain(&mut us_rx).len(), 1);
        assert!(drain(&mut other_rx).is_empty());

        assert_eq!(broadcaster.broadcast(ServerEvent::Pong), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_unknown_client() {
        let broadcaster = Broadcaster::new();
        let (id, _rx) = broadcaster.register(Transport::Sse);
        broadcaster.subscribe(id, &codes(&["FR", "JP"]));

        assert_eq!(broadcaster.unsubscribe(id, &codes(&["fr"])), Some(codes(&["JP"])));
        assert_eq!(broadcaster.subscribe(Uuid::new_v4(), &codes(&["FR"])), None);
    }

    #[tokio::test]
    async fn test_unresponsive_client_is_dropped() {
        let broadcaster = Broadcaster::new();
        let (silent, mut silent_rx) = broadcaster.register(Transport::WebSocket);
        let (chatty, _chatty_rx) = broadcaster.register(Transport::WebSocket);

        // First ping goes out to both.
        assert_eq!(broadcaster.heartbeat_tick(), 0);
        assert!(matches!(drain(&mut silent_rx).as_slice(), [Outbound::Ping]));

        broadcaster.mark_alive(chatty);
        assert_eq!(broadcaster.heartbeat_tick(), 1);
        assert_eq!(broadcaster.client_count(), 1);

        assert_eq!(broadcaster.broadcast(ServerEvent::Pong), 1);
        assert!(!broadcaster.send_to(silent, ServerEvent::Pong));
        // Sender dropped with the registry entry.
        assert!(silent_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_sse_stream_is_dropped() {
        let broadcaster = Broadcaster::new();
        let (_id, rx) = broadcaster.register(Transport::Sse);
        drop(rx);

        assert_eq!(broadcaster.heartbeat_tick(), 1);
        assert_eq!(broadcaster.client_count(), 0);
    }

    #[tokio::test]
    async fn test_sse_clients_get_heartbeat_events() {
        let broadcaster = Broadcaster::new();
        let (_id, mut rx) = broadcaster.register(Transport::Sse);

        broadcaster.heartbeat_tick();
        broadcaster.heartbeat_tick();

        let received = drain(&mut rx);
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|m| matches!(
            m,
            Outbound::Message(ServerMessage { event: ServerEvent::Heartbeat, .. })
        )));
    }
}
