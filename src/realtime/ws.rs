//! WebSocket transport at `/ws/compare`.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ClientMessage, Outbound, ServerEvent, ServerMessage, Transport};
use crate::api::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one connection until either side goes away.
///
/// Outgoing traffic is whatever the broadcaster queues for this client,
/// including the heartbeat pings. Unregistering drops the queue, which
/// closes the connection from our side.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (client_id, mut outbound) = state.broadcaster.register(Transport::WebSocket);

    state.broadcaster.send_to(
        client_id,
        ServerEvent::Connected {
            client_id,
            message: "Connected to WorldStats realtime server".to_string(),
        },
    );

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let frame = match queued {
                    Some(Outbound::Message(message)) => Message::Text(message.to_json()),
                    Some(Outbound::Ping) => Message::Ping(Vec::new()),
                    // Dropped from the registry.
                    None => break,
                };
                if sender.send(frame).await.is_err() {
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        state.broadcaster.mark_alive(client_id);
                        if let Some(reply) = handle_text(&state, client_id, &text).await {
                            let frame = Message::Text(ServerMessage::new(reply).to_json());
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => state.broadcaster.mark_alive(client_id),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    state.broadcaster.unregister(client_id);
}

/// Reply to one client text frame.
async fn handle_text(state: &AppState, client_id: Uuid, text: &str) -> Option<ServerEvent> {
    let message = match parse_client_message(text) {
        Ok(message) => message,
        Err(reply) => return Some(reply),
    };

    let reply = match message {
        ClientMessage::Subscribe { countries } => {
            let countries = state.broadcaster.subscribe(client_id, &countries)?;
            ServerEvent::Subscribed { countries }
        }
        ClientMessage::Unsubscribe { countries } => {
            let countries = state.broadcaster.unsubscribe(client_id, &countries)?;
            ServerEvent::Unsubscribed { countries }
        }
        ClientMessage::Ping => ServerEvent::Pong,
        ClientMessage::Compare { country1, country2 } => {
            let (Some(c1), Some(c2)) = (
                country1.filter(|c| !c.trim().is_empty()),
                country2.filter(|c| !c.trim().is_empty()),
            ) else {
                return Some(ServerEvent::error("Missing country codes for comparison"));
            };
            match state.comparisons.compare(&c1, &c2).await {
                Ok(lookup) => ServerEvent::ComparisonResult {
                    data: Box::new(lookup.data),
                },
                Err(e) => {
                    warn!(client_id = %client_id, c1 = %c1, c2 = %c2, error = %e, "WebSocket comparison failed");
                    ServerEvent::error(e.to_string())
                }
            }
        }
    };
    Some(reply)
}

/// Parse a client frame, or produce the error event to send back.
fn parse_client_message(text: &str) -> Result<ClientMessage, ServerEvent> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|_| ServerEvent::error("Invalid message format"))?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| ServerEvent::error("Invalid message format"))?;

    serde_json::from_value(value).map_err(|_| match kind.as_str() {
        "subscribe" | "unsubscribe" | "ping" | "compare" => ServerEvent::error("Invalid message format"),
        other => ServerEvent::error(format!("Unknown message type: {other}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_message(event: ServerEvent) -> String {
        match event {
            ServerEvent::Error { message } => message,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            error_message(parse_client_message("not json").unwrap_err()),
            "Invalid message format"
        );
        assert_eq!(
            error_message(parse_client_message(r#"{"countries":["US"]}"#).unwrap_err()),
            "Invalid message format"
        );
        assert_eq!(
            error_message(parse_client_message(r#"{"type":"shout"}"#).unwrap_err()),
            "Unknown message type: shout"
        );
    }

    #[test]
    fn test_parse_known_messages() {
        assert!(matches!(
            parse_client_message(r#"{"type":"ping"}"#),
            Ok(ClientMessage::Ping)
        ));
        match parse_client_message(r#"{"type":"subscribe","countries":["us","de"]}"#) {
            Ok(ClientMessage::Subscribe { countries }) => assert_eq!(countries, vec!["us", "de"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
