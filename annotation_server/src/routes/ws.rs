use crate::{
    server::SharedState,
    session::{InboundFrame, StreamSession},
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{future, SinkExt, StreamExt};
use tracing::instrument;

#[instrument(skip_all)]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (sink, stream) = socket.split();

    let inbound = Box::pin(stream.filter_map(|message| async move {
        match message {
            Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text.as_str().to_owned()))),
            Ok(Message::Binary(bytes)) => Some(Ok(InboundFrame::Binary(bytes))),
            Ok(Message::Close(_)) => Some(Ok(InboundFrame::Close)),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Err(e) => Some(Err(e)),
        }
    }));
    let outbound =
        sink.with(|data_uri: String| future::ready(Ok::<_, axum::Error>(Message::Text(data_uri.into()))));

    let mut session = StreamSession::new(
        state.pipeline.clone(),
        &state.stream_config,
        state.metrics.clone(),
    );
    let reason = session.run(inbound, outbound).await;

    tracing::debug!(reason = reason.as_str(), "WebSocket handler finished");
}
