//! Phase- and role-specific state payloads.
//!
//! One variant per (phase, role). Participant views never carry the
//! question text or other players' scores.

use quizzer_core::VideoRef;
use serde::Serialize;

use crate::session::{Participant, Phase, SessionState};

/// A state payload for one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateView {
    /// Host in `Lobby`.
    HostLobby(HostLobbyView),
    /// Participant in `Lobby`.
    ParticipantLobby(ParticipantLobbyView),
    /// Host in `Question`.
    HostQuestion(HostQuestionView),
    /// Participant in `Question`.
    ParticipantQuestion(ParticipantQuestionView),
    /// Host in `Results`.
    HostResults(HostResultsView),
    /// Participant in `Results`.
    ParticipantResults(ParticipantResultsView),
}

/// Host in the lobby.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostLobbyView {
    /// Always `lobby`.
    pub phase: Phase,
    /// Join code.
    pub code: String,
    /// Quiz title.
    pub quiz_title: String,
    /// Host display name.
    pub host_name: String,
    /// Always `true`.
    pub is_host: bool,
    /// Joined participants, in join order.
    pub participant_names: Vec<String>,
}

/// Participant in the lobby.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantLobbyView {
    /// Always `lobby`.
    pub phase: Phase,
    /// Join code.
    pub code: String,
    /// Quiz title.
    pub quiz_title: String,
    /// Host display name.
    pub host_name: String,
    /// Always `false`.
    pub is_host: bool,
}

/// Host while a question is open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostQuestionView {
    /// Always `question`.
    pub phase: Phase,
    /// Question text.
    pub question: String,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// 1-based position of the question.
    pub question_number: usize,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Time limit in seconds.
    pub time_limit_secs: u64,
    /// Video clip, if the question has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoRef>,
    /// Participants who have answered this question.
    pub nr_answered: usize,
    /// Participants currently joined.
    pub nr_participants: usize,
}

/// Participant while a question is open. Carries options only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantQuestionView {
    /// Always `question`.
    pub phase: Phase,
    /// Answer options, in display order.
    pub options: Vec<String>,
    /// 1-based position of the question.
    pub question_number: usize,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Time limit in seconds.
    pub time_limit_secs: u64,
}

/// Host between questions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResultsView {
    /// Always `results`.
    pub phase: Phase,
    /// Questions finished so far.
    pub nr_questions_completed: usize,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Score of every participant.
    pub results: Vec<ParticipantResult>,
}

/// One row of the host's results table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResult {
    /// Participant display name.
    pub name: String,
    /// Correct answers among the finished questions.
    pub nr_correct: usize,
}

/// Participant between questions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResultsView {
    /// Always `results`.
    pub phase: Phase,
    /// Questions finished so far.
    pub nr_questions_completed: usize,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// The recipient's own correct answers.
    pub nr_correct: usize,
}

/// The host's view, or `None` once closed.
pub fn host_view(state: &SessionState) -> Option<StateView> {
    let view = match state.phase() {
        Phase::Lobby => StateView::HostLobby(HostLobbyView {
            phase: Phase::Lobby,
            code: state.code().to_owned(),
            quiz_title: state.quiz().title.clone(),
            host_name: state.host().username.clone(),
            is_host: true,
            participant_names: state.participants().iter().map(|p| p.name.clone()).collect(),
        }),
        Phase::Question => {
            let question = state.current_question()?;
            StateView::HostQuestion(HostQuestionView {
                phase: Phase::Question,
                question: question.question.clone(),
                options: question.answers.clone(),
                question_number: state.current_index() + 1,
                total_questions: state.questions().len(),
                time_limit_secs: question.time_limit_secs,
                video: question.video.clone(),
                nr_answered: state.answered_count(),
                nr_participants: state.participants().len(),
            })
        }
        Phase::Results => StateView::HostResults(HostResultsView {
            phase: Phase::Results,
            nr_questions_completed: state.current_index(),
            total_questions: state.questions().len(),
            results: state
                .participants()
                .iter()
                .map(|p| ParticipantResult {
                    name: p.name.clone(),
                    nr_correct: state.score(p),
                })
                .collect(),
        }),
        Phase::Closed => return None,
    };
    Some(view)
}

/// `participant`'s view, or `None` once closed.
pub fn participant_view(state: &SessionState, participant: &Participant) -> Option<StateView> {
    let view = match state.phase() {
        Phase::Lobby => StateView::ParticipantLobby(ParticipantLobbyView {
            phase: Phase::Lobby,
            code: state.code().to_owned(),
            quiz_title: state.quiz().title.clone(),
            host_name: state.host().username.clone(),
            is_host: false,
        }),
        Phase::Question => {
            let question = state.current_question()?;
            StateView::ParticipantQuestion(ParticipantQuestionView {
                phase: Phase::Question,
                options: question.answers.clone(),
                question_number: state.current_index() + 1,
                total_questions: state.questions().len(),
                time_limit_secs: question.time_limit_secs,
            })
        }
        Phase::Results => StateView::ParticipantResults(ParticipantResultsView {
            phase: Phase::Results,
            nr_questions_completed: state.current_index(),
            total_questions: state.questions().len(),
            nr_correct: state.score(participant),
        }),
        Phase::Closed => return None,
    };
    Some(view)
}
