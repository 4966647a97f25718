//! Change message envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::events::{EventsError, EventsResult};

/// A change notification as published on the bus.
///
/// Only the envelope fields are read; event-specific payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessage {
    #[serde(rename = "subjectID")]
    pub subject_id: String,

    /// Open string; classify with [`ChangeMessage::kind`].
    #[serde(rename = "eventType")]
    pub event_type: String,

    /// Publishers may send `null` here; it decodes as empty.
    #[serde(rename = "additionalSubjectIDs", default, deserialize_with = "null_as_empty")]
    pub additional_subject_ids: Vec<String>,

    #[serde(rename = "actorID", default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChangeMessage {
    pub fn new(subject_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    pub fn with_additional_subjects<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_subject_ids
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Decode a message from its JSON encoding.
    pub fn from_slice(bytes: &[u8]) -> EventsResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| EventsError::Decode(e.to_string()))
    }

    /// The event type, if it is one the manager acts on.
    pub fn kind(&self) -> Result<EventType, UnknownEventType> {
        self.event_type.parse()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Event types that trigger reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::Delete => "delete",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0:?}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(EventType::Create),
            "update" => Ok(EventType::Update),
            "delete" => Ok(EventType::Delete),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope() {
        let raw = br#"{
            "subjectID": "loadprt-abc",
            "eventType": "update",
            "additionalSubjectIDs": ["loadbal-123", "loadpol-456"],
            "actorID": "idntusr-1",
            "source": "load-balancer-api",
            "timestamp": "2023-06-01T12:00:00Z",
            "fieldsChanged": ["number"]
        }"#;

        let msg = ChangeMessage::from_slice(raw).unwrap();
        assert_eq!(msg.subject_id, "loadprt-abc");
        assert_eq!(msg.kind(), Ok(EventType::Update));
        assert_eq!(msg.additional_subject_ids, vec!["loadbal-123", "loadpol-456"]);
        assert_eq!(msg.actor_id.as_deref(), Some("idntusr-1"));
    }

    #[test]
    fn test_decode_minimal() {
        let msg = ChangeMessage::from_slice(br#"{"subjectID":"loadbal-1","eventType":"delete"}"#)
            .unwrap();
        assert!(msg.additional_subject_ids.is_empty());
        assert_eq!(msg.kind(), Ok(EventType::Delete));
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn test_decode_null_additional_subjects() {
        let msg = ChangeMessage::from_slice(
            br#"{"subjectID":"loadbal-x","eventType":"update","additionalSubjectIDs":null}"#,
        )
        .unwrap();
        assert_eq!(msg.subject_id, "loadbal-x");
        assert!(msg.additional_subject_ids.is_empty());
    }

    #[test]
    fn test_decode_garbage() {
        let err = ChangeMessage::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, EventsError::Decode(_)));
    }

    #[test]
    fn test_event_type_parsing() {
        assert_eq!("create".parse::<EventType>(), Ok(EventType::Create));
        assert_eq!(
            "CREATE".parse::<EventType>(),
            Err(UnknownEventType("CREATE".into()))
        );
        assert!("audit".parse::<EventType>().is_err());
        assert!("".parse::<EventType>().is_err());
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        let msg = ChangeMessage::new("loadbal-1", "create");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["subjectID"], "loadbal-1");
        assert!(value.get("actorID").is_none());
        assert_eq!(value["additionalSubjectIDs"], serde_json::json!([]));
    }
}
