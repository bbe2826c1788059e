use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a stored or requested string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what}: '{value}'")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

/// The kind of a directed interaction.
///
/// `Unspecified` is the zero kind: it is what a decoded row carries when its
/// `kind` cell is null or the column is missing. The write path never stores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    #[default]
    #[serde(rename = "")]
    Unspecified,
    Report,
    Like,
    Dislike,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Unspecified => "",
            InteractionKind::Report => "report",
            InteractionKind::Like => "like",
            InteractionKind::Dislike => "dislike",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report" => Ok(InteractionKind::Report),
            "like" => Ok(InteractionKind::Like),
            "dislike" => Ok(InteractionKind::Dislike),
            other => Err(UnknownVariant {
                what: "interaction kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Which side of an interaction a user is queried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Interactions the user initiated.
    Sent,
    /// Interactions targeted at the user.
    Received,
}

impl FromStr for Direction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Direction::Sent),
            "received" => Ok(Direction::Received),
            other => Err(UnknownVariant {
                what: "direction",
                value: other.to_string(),
            }),
        }
    }
}

/// A single directed interaction between two users. Immutable once written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    #[serde(alias = "userId")]
    pub actor_id: String,
    #[serde(alias = "reportedUserId")]
    pub target_id: String,
    pub kind: InteractionKind,
    /// Only reports carry a message; likes and dislikes store "".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Unix nanoseconds, assigned by the writer.
    pub timestamp: i64,
}

impl InteractionRecord {
    pub fn report(
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        message: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            target_id: target_id.into(),
            kind: InteractionKind::Report,
            message: message.into(),
            timestamp,
        }
    }

    pub fn like(actor_id: impl Into<String>, target_id: impl Into<String>, timestamp: i64) -> Self {
        Self::reaction(InteractionKind::Like, actor_id, target_id, timestamp)
    }

    pub fn dislike(
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self::reaction(InteractionKind::Dislike, actor_id, target_id, timestamp)
    }

    fn reaction(
        kind: InteractionKind,
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            target_id: target_id.into(),
            kind,
            message: String::new(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_stored_values() {
        assert_eq!("report".parse::<InteractionKind>(), Ok(InteractionKind::Report));
        assert_eq!("like".parse::<InteractionKind>(), Ok(InteractionKind::Like));
        assert_eq!("dislike".parse::<InteractionKind>(), Ok(InteractionKind::Dislike));
        assert!("Report".parse::<InteractionKind>().is_err());
        assert!("".parse::<InteractionKind>().is_err());
    }

    #[test]
    fn direction_parses_path_segments() {
        assert_eq!("sent".parse::<Direction>(), Ok(Direction::Sent));
        assert_eq!("received".parse::<Direction>(), Ok(Direction::Received));
        let err = "inbox".parse::<Direction>().unwrap_err();
        assert_eq!(err.to_string(), "unknown direction: 'inbox'");
    }

    #[test]
    fn record_json_uses_camel_case_and_omits_empty_message() {
        let like = InteractionRecord::like("u1", "u2", 42);
        let json = serde_json::to_value(&like).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "actorId": "u1",
                "targetId": "u2",
                "kind": "like",
                "timestamp": 42
            })
        );

        let report = InteractionRecord::report("u1", "u2", "spam", 7);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["message"], "spam");
        assert_eq!(json["kind"], "report");
    }

    #[test]
    fn record_accepts_legacy_field_names() {
        let record: InteractionRecord = serde_json::from_str(
            r#"{"userId":"a","reportedUserId":"b","kind":"dislike","timestamp":1}"#,
        )
        .unwrap();
        assert_eq!(record, InteractionRecord::dislike("a", "b", 1));
    }
}
