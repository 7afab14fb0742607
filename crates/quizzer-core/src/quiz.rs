//! Quiz, question, and user records.
//!
//! These are read-only snapshots fetched from the collaborator store when an
//! execution is created. Field names follow the JSON fixture format
//! (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{QuestionId, QuizId, UserId};

/// A stored quiz.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Quiz ID.
    pub id: QuizId,
    /// Display title.
    pub title: String,
    /// Author of the quiz.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A video clip shown alongside a question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    /// Video URL.
    pub url: String,
    /// Playback start offset in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_secs: Option<u64>,
    /// Playback end offset in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_secs: Option<u64>,
}

/// One question of a quiz.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question ID.
    pub id: QuestionId,
    /// Owning quiz.
    pub quiz_id: QuizId,
    /// Display position within the quiz.
    pub index: u32,
    /// Question text.
    pub question: String,
    /// Answer options, in display order.
    pub answers: Vec<String>,
    /// Accepted answers (a non-empty subset of `answers`).
    pub correct_answers: Vec<String>,
    /// Time limit in seconds.
    pub time_limit_secs: u64,
    /// Optional video clip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoRef>,
}

impl Question {
    /// Whether `answer` is one of the accepted answers.
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answers.iter().any(|c| c == answer)
    }

    /// Check the record invariants: at least one correct answer, and every
    /// correct answer is one of the options.
    pub fn validate(&self) -> Result<(), String> {
        if self.correct_answers.is_empty() {
            return Err(format!("question {} has no correct answer", self.id));
        }
        if let Some(stray) = self
            .correct_answers
            .iter()
            .find(|c| !self.answers.contains(c))
        {
            return Err(format!(
                "question {}: correct answer {stray:?} is not an option",
                self.id
            ));
        }
        Ok(())
    }
}

/// A registered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub username: String,
}
