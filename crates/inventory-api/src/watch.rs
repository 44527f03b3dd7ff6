//! `WebSocket` watch streaming.
//!
//! A collection request carrying the `X-Watch` header is negotiated here.
//! The kind is checked and the subscription opened before the upgrade, so
//! an unsupported kind or a failed snapshot is an ordinary error response.
//! Once upgraded the client receives JSON text frames:
//!
//! ```text
//! {"sequence":7,"type":"Snapshot","resource":{...}}   one per matching record
//! {"sequence":7,"type":"Parity"}                       view complete
//! {"sequence":9,"type":"Created","resource":{...}}    each later change
//! ```
//!
//! The stream ends with a close frame naming the reason when the server
//! closes the subscription (slow consumer, shutdown, store error), or when
//! the client goes away.

use std::sync::Arc;

use axum::extract::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::response::Response;
use inventory_core::{CloseReason, Delivery, Subscription};
use inventory_types::{MessageType, ModelRecord, WatchEventType, WatchMessage};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::handlers::{CollectionRequest, attach_path};
use crate::state::AppState;

/// Open the subscription and upgrade the connection.
pub(crate) fn negotiate(
    state: Arc<AppState>,
    request: CollectionRequest,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    if !state.watch.supports(request.kind) {
        return Err(ApiError::UnsupportedKind(request.kind));
    }
    if request.path_name.is_some() {
        return Err(ApiError::BadRequest("path names cannot be watched".to_owned()));
    }

    let subscription = state.watch.subscribe(request.kind, request.filter)?;
    let upgrade = upgrade
        .map_err(|e| ApiError::BadRequest(format!("watch requires a websocket upgrade: {e}")))?;
    debug!(
        subscription_id = %subscription.id(),
        kind = %request.kind,
        "watch negotiated, upgrading"
    );
    Ok(upgrade.on_upgrade(move |socket| stream(socket, subscription, state)))
}

/// Full content for `record`, with its `path` when it has one. A path
/// that cannot be resolved is left out.
fn full_payload(state: &AppState, record: &ModelRecord) -> Value {
    let mut body = state.shapers.shape(record, true, &state.links);
    if let Err(e) = attach_path(state, record, &mut body) {
        debug!(id = %record.id, "watch payload without path: {e}");
    }
    body
}

/// Render a delivery as its wire message. Deleted resources are reference
/// stubs; everything else carries full content.
pub fn render(state: &AppState, delivery: Delivery) -> WatchMessage {
    match delivery {
        Delivery::Snapshot { sequence, record } => WatchMessage {
            sequence,
            message_type: MessageType::Snapshot,
            resource: Some(full_payload(state, &record)),
        },
        Delivery::Parity(sequence) => WatchMessage {
            sequence,
            message_type: MessageType::Parity,
            resource: None,
        },
        Delivery::Event(event) => {
            let resource = if event.event_type == WatchEventType::Deleted {
                state.shapers.shape(&event.resource, false, &state.links)
            } else {
                full_payload(state, &event.resource)
            };
            WatchMessage {
                sequence: event.sequence,
                message_type: event.event_type.into(),
                resource: Some(resource),
            }
        }
    }
}

/// Pump deliveries to the socket until either side closes.
async fn stream(mut socket: WebSocket, mut subscription: Subscription, state: Arc<AppState>) {
    debug!(subscription_id = %subscription.id(), "watch stream started");

    loop {
        tokio::select! {
            delivery = subscription.next() => {
                let Some(delivery) = delivery else {
                    let reason = subscription
                        .close_reason()
                        .unwrap_or(CloseReason::Unsubscribed);
                    close(&mut socket, reason).await;
                    return;
                };
                let json = match serde_json::to_string(&render(&state, delivery)) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize watch message: {e}");
                        subscription.unsubscribe();
                        close(&mut socket, CloseReason::FeedClosed).await;
                        return;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!("Watch client disconnected (send failed)");
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Watch client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("Watch client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Send a close frame naming `reason`.
async fn close(socket: &mut WebSocket, reason: CloseReason) {
    let code = match reason {
        CloseReason::Unsubscribed => close_code::NORMAL,
        CloseReason::SlowConsumer => close_code::POLICY,
        CloseReason::Shutdown => close_code::AWAY,
        CloseReason::FeedClosed => close_code::ERROR,
    };
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason.as_str()),
    };
    if socket.send(Message::Close(Some(frame))).await.is_err() {
        debug!(%reason, "Watch client gone before close frame");
    }
}
