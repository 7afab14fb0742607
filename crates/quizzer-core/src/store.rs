//! Read-only collaborator store contract.
//!
//! The execution engine fetches a quiz, its questions, and the host's user
//! record exactly once, when an execution is created. Real deployments back
//! this with a database; [`InMemoryStore`] serves fixtures and tests.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::ids::{QuestionId, QuizId, UserId};
use crate::quiz::{Question, Quiz, User};

/// Errors returned by a [`QuizStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Record kind (`quiz`, `user`).
        entity: &'static str,
        /// Requested ID.
        id: String,
    },
    /// The backing store could not be reached or read.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A fixture file could not be loaded.
    #[error("invalid fixtures: {0}")]
    InvalidFixtures(String),
}

/// Read-only data-fetch contract consumed at execution creation.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Fetch a quiz by ID.
    async fn get_quiz(&self, id: &QuizId) -> Result<Quiz, StoreError>;

    /// List a quiz's questions ordered by display index.
    async fn list_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, StoreError>;

    /// Fetch a user by ID.
    async fn get_user(&self, id: &UserId) -> Result<User, StoreError>;
}

/// On-disk fixture format.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    /// Registered users.
    pub users: Vec<User>,
    /// Stored quizzes.
    pub quizzes: Vec<Quiz>,
    /// Questions of all quizzes.
    pub questions: Vec<Question>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    quizzes: HashMap<QuizId, Quiz>,
    questions: HashMap<QuestionId, Question>,
}

/// Thread-safe in-memory [`QuizStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from parsed fixtures, validating every question.
    pub fn from_fixtures(fixtures: Fixtures) -> Result<Self, StoreError> {
        let store = Self::new();
        for user in fixtures.users {
            store.insert_user(user);
        }
        for quiz in fixtures.quizzes {
            store.insert_quiz(quiz);
        }
        for question in fixtures.questions {
            question.validate().map_err(StoreError::InvalidFixtures)?;
            store.insert_question(question);
        }
        Ok(store)
    }

    /// Load fixtures from a JSON file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::InvalidFixtures(format!("{}: {e}", path.display())))?;
        let fixtures: Fixtures = serde_json::from_str(&content)
            .map_err(|e| StoreError::InvalidFixtures(format!("{}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            users = fixtures.users.len(),
            quizzes = fixtures.quizzes.len(),
            questions = fixtures.questions.len(),
            "loaded fixtures"
        );
        Self::from_fixtures(fixtures)
    }

    /// Insert or replace a user.
    pub fn insert_user(&self, user: User) {
        let _ = self.tables.write().users.insert(user.id.clone(), user);
    }

    /// Insert or replace a quiz.
    pub fn insert_quiz(&self, quiz: Quiz) {
        let _ = self.tables.write().quizzes.insert(quiz.id.clone(), quiz);
    }

    /// Insert or replace a question.
    pub fn insert_question(&self, question: Question) {
        let _ = self
            .tables
            .write()
            .questions
            .insert(question.id.clone(), question);
    }
}

#[async_trait]
impl QuizStore for InMemoryStore {
    async fn get_quiz(&self, id: &QuizId) -> Result<Quiz, StoreError> {
        self.tables
            .read()
            .quizzes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "quiz",
                id: id.to_string(),
            })
    }

    async fn list_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.read();
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| &q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.index);
        Ok(questions)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, StoreError> {
        self.tables
            .read()
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn question(id: &str, quiz: &str, index: u32) -> Question {
        Question {
            id: QuestionId::from(id),
            quiz_id: QuizId::from(quiz),
            index,
            question: format!("Question {id}"),
            answers: vec!["A".into(), "B".into()],
            correct_answers: vec!["A".into()],
            time_limit_secs: 10,
            video: None,
        }
    }

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_user(User {
            id: UserId::from("host"),
            username: "Hosty".into(),
        });
        store.insert_quiz(Quiz {
            id: QuizId::from("quiz"),
            title: "Capitals".into(),
            created_by: UserId::from("host"),
            created_at: Utc::now(),
        });
        store.insert_question(question("q2", "quiz", 1));
        store.insert_question(question("q1", "quiz", 0));
        store.insert_question(question("other", "another-quiz", 0));
        store
    }

    #[tokio::test]
    async fn get_quiz_and_user() {
        let store = seeded();
        let quiz = store.get_quiz(&QuizId::from("quiz")).await.unwrap();
        assert_eq!(quiz.title, "Capitals");
        let user = store.get_user(&UserId::from("host")).await.unwrap();
        assert_eq!(user.username, "Hosty");
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let store = seeded();
        let err = store.get_quiz(&QuizId::from("nope")).await.unwrap_err();
        assert_matches!(err, StoreError::NotFound { entity: "quiz", .. });
        let err = store.get_user(&UserId::from("nope")).await.unwrap_err();
        assert_eq!(err.to_string(), "user not found: nope");
    }

    #[tokio::test]
    async fn questions_are_filtered_and_ordered_by_index() {
        let store = seeded();
        let questions = store.list_questions(&QuizId::from("quiz")).await.unwrap();
        let ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, ["q1", "q2"]);
    }

    #[tokio::test]
    async fn load_fixture_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixtures.json");
        std::fs::write(
            &path,
            r#"{
                "users": [{"id": "u1", "username": "alice"}],
                "quizzes": [{"id": "z1", "title": "T", "createdBy": "u1", "createdAt": "2026-01-01T00:00:00Z"}],
                "questions": [{"id": "q1", "quizId": "z1", "index": 0, "question": "?",
                               "answers": ["x", "y"], "correctAnswers": ["y"], "timeLimitSecs": 5}]
            }"#,
        )
        .unwrap();

        let store = InMemoryStore::load(&path).unwrap();
        let questions = store.list_questions(&QuizId::from("z1")).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert!(questions[0].is_correct("y"));
    }

    #[test]
    fn load_rejects_invalid_question() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixtures.json");
        std::fs::write(
            &path,
            r#"{"questions": [{"id": "q1", "quizId": "z1", "index": 0, "question": "?",
                 "answers": ["x"], "correctAnswers": [], "timeLimitSecs": 5}]}"#,
        )
        .unwrap();

        let err = InMemoryStore::load(&path).err().unwrap();
        assert_matches!(err, StoreError::InvalidFixtures(_));
    }

    #[test]
    fn load_missing_file_fails() {
        let err = InMemoryStore::load(Path::new("/nonexistent/fixtures.json"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/fixtures.json"));
    }
}
