//! Correct-answer tally.

use std::collections::HashMap;

use quizzer_core::{Question, QuestionId};

/// Count the completed questions (the first `completed` of `questions`) for
/// which `answers` holds an accepted answer.
pub fn score(questions: &[Question], completed: usize, answers: &HashMap<QuestionId, String>) -> usize {
    questions
        .iter()
        .take(completed)
        .filter(|q| answers.get(&q.id).is_some_and(|a| q.is_correct(a)))
        .count()
}
