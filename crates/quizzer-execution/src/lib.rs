//! # quizzer-execution
//!
//! Live quiz execution engine.
//!
//! Each running quiz is an actor task that owns all mutable session state and
//! processes client messages, disconnects, and timer ticks from one mailbox.
//! The [`ExecutionRegistry`] maps join codes to session handles and sweeps
//! finished or expired sessions.
//!
//! - [`connection`]: outbound queue handle for one peer
//! - [`protocol`]: inbound envelope decoding
//! - [`views`] / [`broadcast`]: per-phase, per-role state payloads and fan-out
//! - [`scorer`]: correct-answer tally
//! - [`session`]: state machine, actor loop, auto-advance timer
//! - [`registry`]: code allocation, lookup, sweep

#![deny(unsafe_code)]

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod scorer;
pub mod session;
pub mod views;

pub use connection::{ClientConnection, CloseFrame, Outbound};
pub use error::{ExecutionError, Result};
pub use protocol::{ClientMessage, Envelope};
pub use registry::{CodeSource, ExecutionRegistry, RandomCodes};
pub use session::{Phase, SessionHandle, SessionSnapshot};
pub use views::StateView;

#[cfg(test)]
pub(crate) mod testutil;
