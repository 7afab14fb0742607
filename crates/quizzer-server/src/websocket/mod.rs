//! WebSocket transport for one execution peer.

pub mod session;
