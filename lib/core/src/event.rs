use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name that creates or updates entity properties
pub const SET_EVENT: &str = "$set";

pub const USER_ENTITY: &str = "user";
pub const ITEM_ENTITY: &str = "item";

/// An event as accepted by the event server.
///
/// The same value is sent by the live client and written by the JSON-Lines
/// exporter, so both paths always agree on the shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entity_id: Option<String>,
    #[serde(default)]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
}

impl Event {
    #[must_use]
    pub fn new(event: impl Into<String>, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        Self {
            event: event.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            target_entity_type: None,
            target_entity_id: None,
            properties: Value::Object(Default::default()),
            event_time: None,
        }
    }

    /// `$set` event carrying entity properties
    #[must_use]
    pub fn set_entity(entity_type: impl Into<String>, entity_id: impl ToString, properties: Value) -> Self {
        Self::new(SET_EVENT, entity_type, entity_id).with_properties(properties)
    }

    /// Named event from a user to an item at `at`
    #[must_use]
    pub fn user_action(
        event: impl Into<String>,
        user: impl ToString,
        item: impl ToString,
        properties: Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(event, USER_ENTITY, user)
            .with_target(ITEM_ENTITY, item)
            .with_properties(properties)
            .with_event_time(at)
    }

    #[inline]
    #[must_use]
    pub fn with_target(mut self, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        self.target_entity_type = Some(entity_type.into());
        self.target_entity_id = Some(entity_id.to_string());
        self
    }

    /// `null` properties are stored as an empty object
    #[inline]
    #[must_use]
    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = match properties {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        self
    }

    #[inline]
    #[must_use]
    pub fn with_event_time(mut self, at: DateTime<Utc>) -> Self {
        self.event_time = Some(format_event_time(&at));
        self
    }
}

/// Extended ISO-8601 with millisecond precision, e.g. `2024-03-01T12:00:00.000Z`
pub fn format_event_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
