//! WebSocket route handler
//!
//! Upgrades the connection and adapts axum's socket to the tungstenite
//! message types the session handler works with.

use axum::{
    extract::{
        ws::{self, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{stream, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{frame::coding::CloseCode, CloseFrame},
};
use tracing::info;

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket upgrade request received");
    let max_message_size = state.ws_state.config().max_message_size;

    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();

    let reader = receiver.map(|result| result.map(into_tungstenite));
    let writer = sender.with_flat_map(|message| stream::iter(from_tungstenite(message).map(Ok)));

    state.ws_state.handle_connection(writer, reader).await;
}

fn into_tungstenite(message: ws::Message) -> tungstenite::Message {
    match message {
        ws::Message::Text(text) => tungstenite::Message::Text(text.to_string().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data.to_vec().into()),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data.to_vec().into()),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data.to_vec().into()),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.to_string().into(),
        })),
    }
}

/// Raw frames have no axum counterpart and are skipped
fn from_tungstenite(message: tungstenite::Message) -> Option<ws::Message> {
    let message = match message {
        tungstenite::Message::Text(text) => ws::Message::Text(text.to_string().into()),
        tungstenite::Message::Binary(data) => ws::Message::Binary(data.to_vec().into()),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data.to_vec().into()),
        tungstenite::Message::Pong(data) => ws::Message::Pong(data.to_vec().into()),
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: f.code.into(),
            reason: f.reason.to_string().into(),
        })),
        tungstenite::Message::Frame(_) => return None,
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_conversion() {
        let message = into_tungstenite(ws::Message::Text("{\"event\":\"ping\"}".to_string().into()));
        assert_eq!(
            message,
            tungstenite::Message::Text("{\"event\":\"ping\"}".to_string().into())
        );

        let back = from_tungstenite(message).unwrap();
        assert_eq!(back, ws::Message::Text("{\"event\":\"ping\"}".to_string().into()));
    }

    #[test]
    fn test_close_conversion() {
        let message = from_tungstenite(tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "bye".to_string().into(),
        })))
        .unwrap();

        match message {
            ws::Message::Close(Some(frame)) => {
                assert_eq!(frame.code, 1001);
                assert_eq!(frame.reason.as_str(), "bye");
            }
            other => panic!("expected close frame, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_conversion() {
        let message = from_tungstenite(tungstenite::Message::Ping(Vec::new().into())).unwrap();
        assert!(matches!(message, ws::Message::Ping(data) if data.is_empty()));
    }
}
