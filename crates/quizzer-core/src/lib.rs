//! # quizzer-core
//!
//! Foundation types shared by every Quizzer crate:
//!
//! - **Branded IDs**: `QuizId`, `QuestionId`, `UserId`, `ParticipantId`, `ConnectionId`
//! - **Records**: `Quiz`, `Question`, `User` snapshots as served by the collaborator store
//! - **Store**: the read-only [`store::QuizStore`] contract plus an in-memory implementation
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod quiz;
pub mod store;

pub use ids::{ConnectionId, ParticipantId, QuestionId, QuizId, UserId};
pub use quiz::{Question, Quiz, User, VideoRef};
pub use store::{InMemoryStore, QuizStore, StoreError};
