//! Branded ID newtypes.
//!
//! Each entity has its own ID type wrapping a `String`, so a participant id can
//! never be handed to something expecting a question id. Freshly minted IDs are
//! UUID v7; IDs that arrive from clients or the store are wrapped as-is.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a new time-ordered ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Borrow the inner string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a stored quiz.
    QuizId
}

branded_id! {
    /// Identifier of a stored question.
    QuestionId
}

branded_id! {
    /// Identifier of a registered user (the host of an execution).
    UserId
}

branded_id! {
    /// Opaque participant identifier supplied by the joining client.
    ParticipantId
}

branded_id! {
    /// Server-side identifier of one duplex connection.
    ConnectionId
}

impl ParticipantId {
    /// Whether this participant id names the given user.
    ///
    /// The host joins with its user id, so the session compares the two
    /// namespaces directly.
    #[must_use]
    pub fn is_user(&self, user: &UserId) -> bool {
        self.as_str() == user.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn client_supplied_ids_are_kept_verbatim() {
        let id = ParticipantId::from("player-7");
        assert_eq!(id.as_str(), "player-7");
        assert_eq!(id.to_string(), "player-7");
        assert_eq!(String::from(id), "player-7");
    }

    #[test]
    fn participant_matches_user_by_value() {
        let user = UserId::from("u1");
        assert!(ParticipantId::from("u1").is_user(&user));
        assert!(!ParticipantId::from("u2").is_user(&user));
    }

    #[test]
    fn serializes_transparently() {
        let id = QuestionId::from("q-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"q-1\"");
        let back: QuestionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
