//! WebSocket session lifecycle: one connected peer from upgrade through
//! disconnect.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame as WsCloseFrame, Message, Utf8Bytes, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use quizzer_core::ConnectionId;
use quizzer_execution::protocol;
use quizzer_execution::{ClientConnection, ExecutionError, Outbound, SessionHandle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_PROTOCOL_ERRORS_TOTAL,
};

/// Run a WebSocket session for a peer of `session`.
///
/// 1. Forwards queued state frames and close frames to the socket
/// 2. Sends periodic Ping frames and drops peers that stop answering
/// 3. Decodes inbound text (or UTF-8 binary) frames and submits them
/// 4. Reports the disconnect to the session on exit
#[instrument(skip_all, fields(code = session.code(), conn_id = tracing::field::Empty))]
pub async fn run_ws_session(
    ws: WebSocket,
    session: SessionHandle,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let conn_id = ConnectionId::new();
    let _ = tracing::Span::current().record("conn_id", conn_id.as_str());
    let (ws_tx, mut ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<Outbound>(config.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        send_rx,
        Arc::clone(&connection),
        Arc::clone(&config),
    ));

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = shutdown.cancelled() => {
                debug!("server shutting down");
                break;
            }
            _ = &mut writer => {
                debug!("writer finished");
                break;
            }
        };
        let Some(Ok(msg)) = frame else {
            break;
        };
        connection.mark_alive();

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(t) => t,
                Err(_) => {
                    debug!(len = data.len(), "received non-UTF8 binary frame");
                    let e = ExecutionError::Protocol("binary frame is not UTF-8".into());
                    reject(&connection, &e);
                    continue;
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        match protocol::decode(&text) {
            Ok(message) => {
                let kind = message.kind();
                match session.submit(Arc::clone(&connection), message).await {
                    Ok(()) => {}
                    Err(ExecutionError::Closed(_)) => {
                        debug!(kind, "session closed");
                        break;
                    }
                    Err(e) => debug!(kind, code = e.code(), "message rejected"),
                }
            }
            Err(e) => {
                debug!(error = %e, "undecodable frame");
                reject(&connection, &e);
            }
        }
    }

    session.disconnect(conn_id).await;
    writer.abort();

    info!(dropped = connection.drop_count(), "client disconnected");
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.connected_for().as_secs_f64());
}

/// Report a malformed inbound frame to its sender.
fn reject(connection: &ClientConnection, error: &ExecutionError) {
    counter!(WS_PROTOCOL_ERRORS_TOTAL).increment(1);
    if !connection.send_json(&error.to_payload()) {
        debug!("failed to enqueue error payload");
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Outbound>,
    connection: Arc<ClientConnection>,
    config: Arc<ServerConfig>,
) {
    let pong_timeout = config.pong_timeout();
    let mut ping_interval = tokio::time::interval(config.ping_interval());
    // skip the immediate first tick
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            frame = send_rx.recv() => match frame {
                Some(Outbound::Text(text)) => {
                    if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close(frame)) => {
                    let close = WsCloseFrame {
                        code: frame.code,
                        reason: Utf8Bytes::from_static(frame.reason),
                    };
                    if ws_tx.send(Message::Close(Some(close))).await.is_err() {
                        debug!("peer gone before close frame");
                    }
                    break;
                }
                None => break,
            },
            () = connection.closing().cancelled() => {
                let frame = connection.close_frame();
                let close = WsCloseFrame {
                    code: frame.code,
                    reason: Utf8Bytes::from_static(frame.reason),
                };
                let _ = ws_tx.send(Message::Close(Some(close))).await;
                break;
            }
            _ = ping_interval.tick() => {
                if connection.last_pong_elapsed() > pong_timeout {
                    warn!("client unresponsive for {pong_timeout:?}, disconnecting");
                    break;
                }
                if ws_tx.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = ws_tx.close().await;
}
