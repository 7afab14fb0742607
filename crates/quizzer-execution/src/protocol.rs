//! Inbound wire protocol.
//!
//! Every client frame is an [`Envelope`] `{type, code, action, data}`. The
//! `type` tag selects a [`ClientMessage`] variant by exact match; `data` is
//! decoded into the variant's fields.

use quizzer_core::ParticipantId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExecutionError, Result};

/// Raw inbound frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Join code the client believes it is talking to.
    #[serde(default)]
    pub code: String,
    /// Free-form action hint (unused by the engine).
    #[serde(default)]
    pub action: String,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Value,
}

/// A decoded client message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    /// Bind the connection as host (when `id` is the host) or join as a
    /// participant.
    Join {
        /// Participant (or host user) id.
        id: ParticipantId,
        /// Display name.
        username: String,
    },
    /// Leave the lobby and show the first question.
    Start,
    /// Close the current question.
    FinishQuestion,
    /// Show the next question.
    NextQuestion,
    /// Record an answer for the current question.
    AnswerQuestion {
        /// Answering participant.
        id: ParticipantId,
        /// Chosen option.
        answer: String,
    },
    /// End the quiz for everyone.
    End,
}

impl ClientMessage {
    /// The wire type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "Join",
            Self::Start => "Start",
            Self::FinishQuestion => "FinishQuestion",
            Self::NextQuestion => "NextQuestion",
            Self::AnswerQuestion { .. } => "AnswerQuestion",
            Self::End => "End",
        }
    }
}

#[derive(Deserialize)]
struct JoinData {
    id: ParticipantId,
    username: String,
}

#[derive(Deserialize)]
struct AnswerData {
    id: ParticipantId,
    answer: String,
}

/// Decode a text frame.
pub fn decode(text: &str) -> Result<ClientMessage> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| ExecutionError::Protocol(format!("malformed envelope: {e}")))?;
    decode_envelope(envelope)
}

/// Decode an already-parsed envelope.
pub fn decode_envelope(envelope: Envelope) -> Result<ClientMessage> {
    match envelope.kind.as_str() {
        "Join" => {
            let JoinData { id, username } = data(&envelope)?;
            Ok(ClientMessage::Join { id, username })
        }
        "Start" => Ok(ClientMessage::Start),
        "FinishQuestion" => Ok(ClientMessage::FinishQuestion),
        "NextQuestion" => Ok(ClientMessage::NextQuestion),
        "AnswerQuestion" => {
            let AnswerData { id, answer } = data(&envelope)?;
            Ok(ClientMessage::AnswerQuestion { id, answer })
        }
        "End" => Ok(ClientMessage::End),
        other => Err(ExecutionError::Protocol(format!(
            "unknown message type: {other}"
        ))),
    }
}

fn data<T: DeserializeOwned>(envelope: &Envelope) -> Result<T> {
    T::deserialize(&envelope.data).map_err(|e| {
        ExecutionError::Protocol(format!("invalid {} payload: {e}", envelope.kind))
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn decodes_join() {
        let msg = decode(
            r#"{"type":"Join","code":"123456","action":"","data":{"id":"p1","username":"ann"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                id: ParticipantId::from("p1"),
                username: "ann".into()
            }
        );
    }

    #[test]
    fn decodes_bare_control_messages() {
        assert_eq!(decode(r#"{"type":"Start"}"#).unwrap(), ClientMessage::Start);
        assert_eq!(
            decode(r#"{"type":"FinishQuestion","data":null}"#).unwrap(),
            ClientMessage::FinishQuestion
        );
        assert_eq!(
            decode(r#"{"type":"NextQuestion","data":{}}"#).unwrap(),
            ClientMessage::NextQuestion
        );
        assert_eq!(decode(r#"{"type":"End"}"#).unwrap(), ClientMessage::End);
    }

    #[test]
    fn decodes_answer() {
        let msg = decode(r#"{"type":"AnswerQuestion","data":{"id":"p1","answer":"B"}}"#).unwrap();
        assert_eq!(msg.kind(), "AnswerQuestion");
        assert_matches!(msg, ClientMessage::AnswerQuestion { answer, .. } if answer == "B");
    }

    #[test]
    fn unknown_type_is_protocol_error() {
        let err = decode(r#"{"type":"Cheat","data":{}}"#).unwrap_err();
        assert_matches!(err, ExecutionError::Protocol(m) if m.contains("Cheat"));
    }

    #[test]
    fn type_tag_is_case_sensitive() {
        assert_matches!(
            decode(r#"{"type":"start"}"#),
            Err(ExecutionError::Protocol(_))
        );
    }

    #[test]
    fn answer_without_id_is_protocol_error() {
        let err = decode(r#"{"type":"AnswerQuestion","data":{"answer":"A"}}"#).unwrap_err();
        assert_eq!(err.code(), "PROTOCOL_ERROR");
        assert!(err.to_string().contains("AnswerQuestion"));
    }

    #[test]
    fn join_without_data_is_protocol_error() {
        assert_matches!(
            decode(r#"{"type":"Join"}"#),
            Err(ExecutionError::Protocol(_))
        );
    }

    #[test]
    fn non_json_is_protocol_error() {
        assert_matches!(decode("hello"), Err(ExecutionError::Protocol(_)));
        assert_matches!(decode(r#"{"code":"1"}"#), Err(ExecutionError::Protocol(_)));
    }
}
