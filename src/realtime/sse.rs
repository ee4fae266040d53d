//! Server-sent events transport.
//!
//! `GET /api/sse/updates` opens a stream. Subscriptions are managed with
//! separate POSTs keyed by the client id announced in the `connected` event.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::instrument;
use uuid::Uuid;

use super::{Broadcaster, Outbound, ServerEvent, Transport};
use crate::api::{AppState, Envelope};
use crate::error::{ApiResult, AppError};

/// Unregisters the client when the response stream is dropped.
struct Registration {
    broadcaster: Broadcaster,
    client_id: Uuid,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.client_id);
    }
}

pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let broadcaster = state.broadcaster.clone();
    let (client_id, rx) = broadcaster.register(Transport::Sse);
    broadcaster.send_to(
        client_id,
        ServerEvent::Connected {
            client_id,
            message: "Connected to WorldStats SSE server".to_string(),
        },
    );

    let registration = Registration {
        broadcaster,
        client_id,
    };
    let stream = UnboundedReceiverStream::new(rx).filter_map(move |outbound| {
        let _alive = &registration;
        match outbound {
            Outbound::Message(message) => Some(Ok(Event::default()
                .event(message.event.kind())
                .data(message.to_json()))),
            Outbound::Ping => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub countries: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    pub client_id: Uuid,
    pub countries: Vec<String>,
}

#[instrument(skip(state, body))]
pub async fn sse_subscribe(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    body: Option<Json<SubscriptionRequest>>,
) -> ApiResult<Json<Envelope<SubscriptionState>>> {
    let (client_id, codes) = parse_request(&client_id, body)?;
    let countries = state
        .broadcaster
        .subscribe(client_id, &codes)
        .ok_or_else(|| AppError::not_found("Client"))?;

    state
        .broadcaster
        .send_to(client_id, ServerEvent::Subscribed { countries: countries.clone() });
    Ok(Json(Envelope::new(SubscriptionState {
        client_id,
        countries,
    })))
}

#[instrument(skip(state, body))]
pub async fn sse_unsubscribe(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    body: Option<Json<SubscriptionRequest>>,
) -> ApiResult<Json<Envelope<SubscriptionState>>> {
    let (client_id, codes) = parse_request(&client_id, body)?;
    let countries = state
        .broadcaster
        .unsubscribe(client_id, &codes)
        .ok_or_else(|| AppError::not_found("Client"))?;

    state
        .broadcaster
        .send_to(client_id, ServerEvent::Unsubscribed { countries: countries.clone() });
    Ok(Json(Envelope::new(SubscriptionState {
        client_id,
        countries,
    })))
}

fn parse_request(
    client_id: &str,
    body: Option<Json<SubscriptionRequest>>,
) -> ApiResult<(Uuid, Vec<String>)> {
    let codes = body
        .and_then(|Json(request)| request.countries)
        .ok_or_else(|| AppError::validation("countries array is required"))?;
    // An id we never issued cannot name a live client.
    let client_id = Uuid::parse_str(client_id).map_err(|_| AppError::not_found("Client"))?;
    Ok((client_id, codes))
}
