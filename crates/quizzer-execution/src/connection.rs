//! Outbound handle for one connected peer.
//!
//! The transport owns the socket; the session only ever holds an
//! `Arc<ClientConnection>` and pushes frames into its bounded queue. Sends
//! never block, so a slow or dead peer cannot stall a session.

use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use quizzer_core::ConnectionId;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// WebSocket normal-closure status code.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close reason when the host ends the quiz or disconnects.
pub const QUIZ_END: &str = "QUIZ_END";
/// Close reason when the registry sweep reclaims a session.
pub const QUIZ_EXPIRED: &str = "QUIZ_EXPIRED";

/// A close control frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFrame {
    /// Status code.
    pub code: u16,
    /// Reason text.
    pub reason: &'static str,
}

impl CloseFrame {
    /// Normal closure with the given reason.
    pub fn normal(reason: &'static str) -> Self {
        Self {
            code: NORMAL_CLOSURE,
            reason,
        }
    }
}

/// A frame queued for the transport writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// JSON text frame.
    Text(Arc<String>),
    /// Close control frame; the writer stops after sending it.
    Close(CloseFrame),
}

/// A connected peer (host or participant).
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    closing: CancellationToken,
    closed: AtomicBool,
    close_reason: OnceLock<&'static str>,
    connected_at: Instant,
    last_pong: Mutex<Instant>,
    /// Count of frames dropped due to a full or closed queue.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection around the writer's queue.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outbound>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            closing: CancellationToken::new(),
            closed: AtomicBool::new(false),
            close_reason: OnceLock::new(),
            connected_at: now,
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a text frame.
    ///
    /// Returns `false` if the queue is full or closed, or the connection has
    /// been closed, and increments the dropped counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if !self.is_closed() && self.tx.try_send(Outbound::Text(message)).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize `value` and queue it.
    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize outbound payload");
                false
            }
        }
    }

    /// Queue a normal-closure frame with `reason`.
    ///
    /// Later sends are dropped. If the queue cannot take the frame, the writer
    /// is told to stop via [`closing`](Self::closing) instead and sends
    /// [`close_frame`](Self::close_frame) itself. Returns `false` if the
    /// connection was already closed.
    pub fn close(&self, reason: &'static str) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _ = self.close_reason.set(reason);
        if self.tx.try_send(Outbound::Close(CloseFrame::normal(reason))).is_err() {
            self.closing.cancel();
        }
        true
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Token cancelled when a close frame could not be queued.
    pub fn closing(&self) -> &CancellationToken {
        &self.closing
    }

    /// The normal-closure frame for this connection, carrying the reason
    /// passed to [`close`](Self::close) (empty if it was never called).
    pub fn close_frame(&self) -> CloseFrame {
        CloseFrame::normal(self.close_reason.get().copied().unwrap_or_default())
    }

    /// Time since the connection was established.
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record pong (or any inbound activity).
    pub fn mark_alive(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new(ConnectionId::from("conn_1"), tx), rx)
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(rx.recv().await, Some(Outbound::Text(Arc::new("hello".into()))));
    }

    #[tokio::test]
    async fn send_json_serializes() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.send_json(&serde_json::json!({"phase": "lobby"})));
        let Some(Outbound::Text(text)) = rx.recv().await else {
            panic!("expected text frame");
        };
        assert_eq!(&*text, r#"{"phase":"lobby"}"#);
    }

    #[test]
    fn send_to_closed_channel_returns_false() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_channel_returns_false() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("a".into())));
        assert!(!conn.send(Arc::new("b".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn close_queues_frame_once() {
        let (conn, mut rx) = make_connection(4);
        assert!(conn.close(QUIZ_END));
        assert!(!conn.close(QUIZ_END));
        assert!(conn.is_closed());
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Close(CloseFrame {
                code: 1000,
                reason: "QUIZ_END"
            }))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_after_close_is_dropped() {
        let (conn, _rx) = make_connection(4);
        let _ = conn.close(QUIZ_END);
        assert!(!conn.send(Arc::new("late".into())));
    }

    #[test]
    fn close_on_full_queue_cancels_writer() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("a".into())));
        assert!(conn.close(QUIZ_EXPIRED));
        assert!(conn.closing().is_cancelled());
    }

    #[test]
    fn close_reason_survives_full_queue() {
        let (conn, mut rx) = make_connection(1);
        assert!(conn.send(Arc::new("state".into())));
        assert!(conn.close(QUIZ_END));

        let frames: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(frames, vec![Outbound::Text(Arc::new("state".into()))]);
        assert!(conn.closing().is_cancelled());
        assert_eq!(conn.close_frame(), CloseFrame::normal(QUIZ_END));
    }

    #[test]
    fn first_close_reason_wins() {
        let (conn, _rx) = make_connection(4);
        assert_eq!(conn.close_frame().reason, "");
        let _ = conn.close(QUIZ_EXPIRED);
        let _ = conn.close(QUIZ_END);
        assert_eq!(conn.close_frame().reason, QUIZ_EXPIRED);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_age() {
        let (conn, _rx) = make_connection(1);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(conn.connected_for() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn pong_tracking() {
        let (conn, _rx) = make_connection(1);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(conn.last_pong_elapsed() >= Duration::from_secs(5));
        conn.mark_alive();
        assert!(conn.last_pong_elapsed() < Duration::from_secs(1));
    }
}
