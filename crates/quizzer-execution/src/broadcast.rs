//! State fan-out to every bound connection.

use metrics::counter;
use tracing::{debug, warn};

use crate::connection::ClientConnection;
use crate::metrics::BROADCAST_SEND_FAILURES_TOTAL;
use crate::session::SessionState;
use crate::views::{self, StateView};

/// Delivery counts of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Frames queued.
    pub delivered: usize,
    /// Recipients whose queue was full or closed.
    pub failed: usize,
}

/// Send the host view to the host connection and each participant its own
/// view. A failed send affects only that recipient.
pub fn broadcast(state: &SessionState) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    if let (Some(conn), Some(view)) = (state.host_conn(), views::host_view(state)) {
        deliver(conn, &view, &mut report);
    }
    for participant in state.participants() {
        if let Some(view) = views::participant_view(state, participant) {
            deliver(&participant.conn, &view, &mut report);
        }
    }

    debug!(
        code = state.code(),
        phase = %state.phase(),
        delivered = report.delivered,
        failed = report.failed,
        "broadcast state"
    );
    report
}

fn deliver(conn: &ClientConnection, view: &StateView, report: &mut BroadcastReport) {
    if conn.send_json(view) {
        report.delivered += 1;
    } else {
        report.failed += 1;
        counter!(BROADCAST_SEND_FAILURES_TOTAL).increment(1);
        warn!(conn_id = %conn.id, dropped = conn.drop_count(), "failed to send state to client");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quizzer_core::{ConnectionId, ParticipantId};
    use tokio::sync::mpsc;

    use super::*;
    use crate::testutil::{self, HOST_ID, Peer};

    #[test]
    fn every_bound_connection_gets_its_view() {
        let mut state = testutil::state(1);
        let mut host = Peer::new("h");
        let mut ann = Peer::new("a");
        state
            .join(&host.conn, ParticipantId::from(HOST_ID), "hostess".into())
            .unwrap();
        state.join(&ann.conn, ParticipantId::from("ann"), "Ann".into()).unwrap();

        let report = broadcast(&state);
        assert_eq!(report, BroadcastReport { delivered: 2, failed: 0 });
        assert_eq!(host.last_json()["isHost"], true);
        assert_eq!(ann.last_json()["isHost"], false);
    }

    #[test]
    fn one_dead_peer_does_not_block_others() {
        let mut state = testutil::state(1);
        let mut host = Peer::new("h");
        state
            .join(&host.conn, ParticipantId::from(HOST_ID), "hostess".into())
            .unwrap();

        // first participant's writer is gone
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let dead = Arc::new(ClientConnection::new(ConnectionId::from("dead"), tx));
        state.join(&dead, ParticipantId::from("dead"), "Dead".into()).unwrap();

        let mut alive = Peer::new("alive");
        state
            .join(&alive.conn, ParticipantId::from("alive"), "Alive".into())
            .unwrap();

        let report = broadcast(&state);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(dead.drop_count(), 1);
        assert_eq!(host.last_json()["participantNames"].as_array().unwrap().len(), 2);
        assert_eq!(alive.last_json()["phase"], "lobby");
    }

    #[test]
    fn unbound_host_is_skipped() {
        let mut state = testutil::state(1);
        let mut ann = Peer::new("a");
        state.join(&ann.conn, ParticipantId::from("ann"), "Ann".into()).unwrap();
        assert_eq!(broadcast(&state).delivered, 1);
        assert_eq!(ann.drain().len(), 1);
    }
}
