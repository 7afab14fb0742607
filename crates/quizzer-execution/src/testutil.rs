//! Fixtures shared by unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use quizzer_core::{
    ConnectionId, InMemoryStore, Question, QuestionId, Quiz, QuizId, QuizStore, StoreError, User,
    UserId,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::connection::{ClientConnection, CloseFrame, Outbound};
use crate::session::SessionState;

pub(crate) const HOST_ID: &str = "host-user";
pub(crate) const QUIZ_ID: &str = "quiz-1";

pub(crate) fn quiz() -> Quiz {
    Quiz {
        id: QuizId::from(QUIZ_ID),
        title: "Capitals".into(),
        created_by: UserId::from(HOST_ID),
        created_at: Utc::now(),
    }
}

pub(crate) fn host() -> User {
    User {
        id: UserId::from(HOST_ID),
        username: "hostess".into(),
    }
}

/// Questions `q0..qN` whose correct answers are `A`, `B`, `C`, ... in turn.
pub(crate) fn questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| {
            let correct = ["A", "B", "C", "D"][i % 4].to_string();
            Question {
                id: QuestionId::from(format!("q{i}")),
                quiz_id: QuizId::from(QUIZ_ID),
                index: u32::try_from(i).unwrap(),
                question: format!("Question {i}?"),
                answers: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_answers: vec![correct],
                time_limit_secs: 20,
                video: None,
            }
        })
        .collect()
}

pub(crate) fn state(n: usize) -> SessionState {
    SessionState::new("123456".into(), quiz(), questions(n), host())
}

pub(crate) fn store(n: usize) -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    store.insert_user(host());
    store.insert_quiz(quiz());
    for q in questions(n) {
        store.insert_question(q);
    }
    Arc::new(store)
}

pub(crate) struct Peer {
    pub conn: Arc<ClientConnection>,
    pub rx: mpsc::Receiver<Outbound>,
}

impl Peer {
    pub fn new(id: &str) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            conn: Arc::new(ClientConnection::new(ConnectionId::from(id), tx)),
            rx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id.clone()
    }

    /// All frames queued so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// All text frames queued so far, parsed.
    pub fn drain_json(&mut self) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter_map(|f| match f {
                Outbound::Text(t) => Some(serde_json::from_str(&t).unwrap()),
                Outbound::Close(_) => None,
            })
            .collect()
    }

    /// The most recent text frame, discarding older ones.
    pub fn last_json(&mut self) -> Value {
        self.drain_json().pop().expect("no frame queued")
    }

    pub fn close_frame(&mut self) -> Option<CloseFrame> {
        self.drain().into_iter().find_map(|f| match f {
            Outbound::Close(c) => Some(c),
            Outbound::Text(_) => None,
        })
    }
}

/// Store whose every call fails.
pub(crate) struct BrokenStore;

#[async_trait]
impl QuizStore for BrokenStore {
    async fn get_quiz(&self, _id: &QuizId) -> Result<Quiz, StoreError> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn list_questions(&self, _quiz_id: &QuizId) -> Result<Vec<Question>, StoreError> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn get_user(&self, _id: &UserId) -> Result<User, StoreError> {
        Err(StoreError::Unavailable("offline".into()))
    }
}
