//! WebSocket transport for streamed debates
//!
//! One debate per connection: the client sends a single JSON request, the
//! server answers with `ready`, every step record and one terminal record,
//! then closes. Hanging up early cancels the session.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use dissent_core::{DebateMessage, DebateRequest, ErrorKind};

use crate::error::ApiError;
use crate::routes::DebatePayload;
use crate::state::AppState;

/// Upgrade to a debate WebSocket
#[utoipa::path(
    get,
    path = "/ws/debate",
    responses(
        (status = 101, description = "Switching to the debate event stream")
    )
)]
pub async fn debate_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| debate_socket(socket, state))
}

/// Outcome of waiting for the client's request
enum Handshake {
    Request(DebateRequest),
    Rejected(DebateMessage),
    Closed,
}

fn rejection(kind: ErrorKind, detail: impl Into<String>) -> DebateMessage {
    DebateMessage::Error {
        kind,
        detail: detail.into(),
    }
}

/// Terminal record for a request refused before any session started
fn error_record(err: &ApiError) -> DebateMessage {
    match err {
        ApiError::Debate(e) => DebateMessage::error(e),
        ApiError::Validation(msg) | ApiError::BadRequest(msg) => {
            rejection(ErrorKind::InputValidation, msg.clone())
        }
        other => rejection(ErrorKind::Internal, other.to_string()),
    }
}

fn parse_payload(bytes: &[u8]) -> Handshake {
    match serde_json::from_slice::<DebatePayload>(bytes) {
        Ok(payload) => Handshake::Request(payload.into()),
        Err(e) => Handshake::Rejected(rejection(
            ErrorKind::InputValidation,
            format!("Malformed debate request: {}", e),
        )),
    }
}

async fn wait_for_request(ws_rx: &mut SplitStream<WebSocket>, timeout: Duration) -> Handshake {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                return Handshake::Rejected(rejection(
                    ErrorKind::InputValidation,
                    format!("No debate request received within {}s", timeout.as_secs()),
                ));
            }
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => return parse_payload(text.as_bytes()),
                Some(Ok(Message::Binary(bytes))) => return parse_payload(&bytes),
                Some(Ok(Message::Close(_))) | None => return Handshake::Closed,
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error during handshake");
                    return Handshake::Closed;
                }
                // Pings are answered by the socket itself
                Some(Ok(_)) => {}
            }
        }
    }
}

async fn send_message(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    message: &DebateMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    ws_tx.send(Message::Text(json.into())).await
}

/// Drive one debate over an upgraded socket
pub async fn debate_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    let span = tracing::info_span!("debate_ws", conn_id = %conn_id);
    serve(socket, state).instrument(span).await
}

async fn serve(socket: WebSocket, state: AppState) {
    info!("Debate WebSocket opened");
    let (mut ws_tx, mut ws_rx) = socket.split();

    let prepared = match wait_for_request(&mut ws_rx, state.ws_payload_timeout()).await {
        Handshake::Request(request) => {
            state.prepare(request).await.map_err(|e| error_record(&e))
        }
        Handshake::Rejected(record) => Err(record),
        Handshake::Closed => {
            info!("Client left before sending a request");
            return;
        }
    };

    let (orchestrator, request) = match prepared {
        Ok(pair) => pair,
        Err(record) => {
            debug!(?record, "Rejecting debate request");
            let _ = send_message(&mut ws_tx, &record).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };

    if send_message(&mut ws_tx, &DebateMessage::Ready).await.is_err() {
        return;
    }

    let token = CancellationToken::new();
    let mut messages = orchestrator.stream_with_cancel(request, token.clone());

    loop {
        tokio::select! {
            next = messages.next() => match next {
                Some(message) => {
                    let terminal = message.is_terminal();
                    if let Err(e) = send_message(&mut ws_tx, &message).await {
                        warn!(error = %e, "Failed to deliver debate message");
                        token.cancel();
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
                None => break,
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                    info!("Client disconnected, cancelling debate");
                    token.cancel();
                    break;
                }
                // Anything else mid-debate is ignored
                Some(Ok(_)) => {}
            }
        }
    }

    let _ = ws_tx.send(Message::Close(None)).await;
    info!("Debate WebSocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dissent_core::DebateError;

    #[test]
    fn test_malformed_payload_is_rejected() {
        match parse_payload(br#"{"query": "missing documents"}"#) {
            Handshake::Rejected(DebateMessage::Error { kind, detail }) => {
                assert_eq!(kind, ErrorKind::InputValidation);
                assert!(detail.starts_with("Malformed debate request"));
            }
            _ => panic!("expected a rejection"),
        }
    }

    #[test]
    fn test_valid_payload_becomes_request() {
        let parsed = parse_payload(br#"{"documents": ["Born in 1963."], "query": "When?", "rounds": 2}"#);
        match parsed {
            Handshake::Request(request) => {
                assert_eq!(request.rounds, 2);
                assert_eq!(request.documents.len(), 1);
            }
            _ => panic!("expected a request"),
        }
    }

    #[test]
    fn test_error_record_keeps_debate_kind() {
        let record = error_record(&ApiError::Debate(DebateError::Cancelled));
        assert!(matches!(record, DebateMessage::Error { kind: ErrorKind::Cancelled, .. }));

        let record = error_record(&ApiError::Validation("query too long".to_string()));
        assert!(matches!(
            record,
            DebateMessage::Error { kind: ErrorKind::InputValidation, .. }
        ));

        let record = error_record(&ApiError::ServiceUnavailable("no key".to_string()));
        assert!(matches!(record, DebateMessage::Error { kind: ErrorKind::Internal, .. }));
    }
}
