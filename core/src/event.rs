//! Event envelopes.
//!
//! Outbound events are JSON documents keyed by the beverage id and carry three
//! headers: `content-type`, `timestamp` (RFC 3339) and `producer`. Inbound
//! events use the same headers.
//!
//! # Topics
//!
//! - `recipe.requests` - [`RecipeRequestedEvent`]
//! - `ingredient.discovered` - [`IngredientDiscoveredEvent`]
//! - `beverage.events` (configurable) - [`BeverageEvent`]

use crate::beverage::{Beverage, BeverageId, BeverageStatus};
use crate::error::{InventorError, Result};
use crate::request::{Constraints, Request};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Envelope schema version.
pub const SCHEMA_VERSION: &str = "1.0";

/// JSON content type.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Header name for the content type.
pub const HEADER_CONTENT_TYPE: &str = "content-type";

/// Header name for the RFC 3339 timestamp.
pub const HEADER_TIMESTAMP: &str = "timestamp";

/// Header name for the producing service.
pub const HEADER_PRODUCER: &str = "producer";

/// Creator assigned to requests synthesized from discovery events.
pub const SYSTEM_CREATOR: &str = "system";

/// The three required message headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeaders {
    /// MIME type of the payload
    pub content_type: String,
    /// When the message was produced
    pub timestamp: DateTime<Utc>,
    /// Producing service
    pub producer: String,
}

impl MessageHeaders {
    /// JSON headers stamped with `at`.
    #[must_use]
    pub fn json(producer: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            content_type: CONTENT_TYPE_JSON.to_string(),
            timestamp: at,
            producer: producer.into(),
        }
    }

    /// Headers as `(name, value)` pairs, ready for the wire.
    #[must_use]
    pub fn to_pairs(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_CONTENT_TYPE, self.content_type.clone()),
            (HEADER_TIMESTAMP, self.timestamp.to_rfc3339()),
            (HEADER_PRODUCER, self.producer.clone()),
        ]
    }

    /// Parse raw header pairs, requiring all three headers.
    ///
    /// # Errors
    ///
    /// `invalid_request` when a header is missing, not UTF-8, or the
    /// timestamp is not RFC 3339.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut content_type = None;
        let mut timestamp = None;
        let mut producer = None;

        for (name, value) in pairs {
            let slot = match name.to_ascii_lowercase().as_str() {
                HEADER_CONTENT_TYPE => &mut content_type,
                HEADER_TIMESTAMP => &mut timestamp,
                HEADER_PRODUCER => &mut producer,
                _ => continue,
            };
            let text = std::str::from_utf8(value).map_err(|_| {
                InventorError::invalid_request("headers.decode", format!("header {name} is not UTF-8"))
            })?;
            *slot = Some(text.to_string());
        }

        let require = |value: Option<String>, name: &str| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                InventorError::invalid_request("headers.decode", format!("missing header {name}"))
            })
        };

        let content_type = require(content_type, HEADER_CONTENT_TYPE)?;
        let raw_timestamp = require(timestamp, HEADER_TIMESTAMP)?;
        let producer = require(producer, HEADER_PRODUCER)?;

        let timestamp = DateTime::parse_from_rfc3339(&raw_timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                InventorError::invalid_request("headers.decode", format!("bad timestamp: {e}"))
            })?;

        Ok(Self {
            content_type,
            timestamp,
            producer,
        })
    }
}

/// Outbound event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A beverage was created
    BeverageCreated,
    /// A beverage changed
    BeverageUpdated,
    /// A beverage changed status
    BeverageStatusChanged,
}

impl EventType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeverageCreated => "beverage_created",
            Self::BeverageUpdated => "beverage_updated",
            Self::BeverageStatusChanged => "beverage_status_changed",
        }
    }
}

/// Old and new value of a changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before
    pub old: serde_json::Value,
    /// Value after
    pub new: serde_json::Value,
}

/// Outbound beverage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeverageEvent {
    /// Unique event id
    pub event_id: String,
    /// Event type
    pub event_type: EventType,
    /// Schema version
    pub version: String,
    /// Subject beverage
    pub beverage_id: BeverageId,
    /// When it happened
    pub occurred_at: DateTime<Utc>,
    /// Producing service
    pub producer: String,
    /// Beverage snapshot after the change
    pub beverage: Beverage,
    /// Changed fields (updated / status-changed only)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changes: BTreeMap<String, FieldChange>,
}

impl BeverageEvent {
    fn new(event_type: EventType, beverage: &Beverage, producer: &str, at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            version: SCHEMA_VERSION.to_string(),
            beverage_id: beverage.id,
            occurred_at: at,
            producer: producer.to_string(),
            beverage: beverage.clone(),
            changes: BTreeMap::new(),
        }
    }

    /// `beverage_created`
    #[must_use]
    pub fn created(beverage: &Beverage, producer: &str, at: DateTime<Utc>) -> Self {
        Self::new(EventType::BeverageCreated, beverage, producer, at)
    }

    /// `beverage_updated` with the given field changes.
    #[must_use]
    pub fn updated(
        beverage: &Beverage,
        changes: BTreeMap<String, FieldChange>,
        producer: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            changes,
            ..Self::new(EventType::BeverageUpdated, beverage, producer, at)
        }
    }

    /// `beverage_status_changed` with `changes.status = {old, new}`.
    #[must_use]
    pub fn status_changed(
        beverage: &Beverage,
        old: BeverageStatus,
        producer: &str,
        at: DateTime<Utc>,
    ) -> Self {
        let mut event = Self::new(EventType::BeverageStatusChanged, beverage, producer, at);
        event.changes.insert(
            "status".to_string(),
            FieldChange {
                old: serde_json::Value::String(old.as_str().to_string()),
                new: serde_json::Value::String(beverage.status.as_str().to_string()),
            },
        );
        event
    }

    /// Message key: the beverage id.
    #[must_use]
    pub fn key(&self) -> String {
        self.beverage_id.to_string()
    }

    /// Headers for this event.
    #[must_use]
    pub fn headers(&self) -> MessageHeaders {
        MessageHeaders::json(self.producer.clone(), self.occurred_at)
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// `internal` if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| InventorError::internal("event.encode", e.to_string()))
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// `invalid_request` if the payload is not a valid envelope.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Payload of `recipe.requests`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeRequestedEvent {
    /// Request id, reused as correlation id
    pub request_id: String,
    /// Ingredient names
    pub ingredients: Vec<String>,
    /// Theme
    pub theme: String,
    /// Requester
    pub requested_by: String,
    /// When it was requested
    pub requested_at: Option<DateTime<Utc>>,
    /// Try AI first
    pub use_ai: bool,
    /// Constraints
    pub constraints: Option<Constraints>,
    /// Event type label
    pub event_type: String,
    /// Schema version
    pub version: String,
}

impl RecipeRequestedEvent {
    /// Build the pipeline request.
    #[must_use]
    pub fn into_request(self) -> Request {
        let mut builder = Request::builder()
            .ingredients(self.ingredients)
            .theme(self.theme)
            .use_ai(self.use_ai)
            .created_by(self.requested_by)
            .correlation_id(self.request_id);
        if let Some(constraints) = self.constraints {
            builder = builder.constraints(constraints);
        }
        builder.build()
    }
}

/// Payload of `ingredient.discovered`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngredientDiscoveredEvent {
    /// Ingredient id
    pub ingredient_id: String,
    /// Ingredient name
    pub name: String,
    /// Where it was found
    pub source: String,
    /// Description
    pub description: String,
    /// Category
    pub category: String,
    /// Availability label
    pub availability: String,
    /// Unit cost
    pub cost: f64,
    /// Nutrition facts as reported by the discoverer
    pub nutritional: serde_json::Value,
    /// Discoverer
    pub discovered_by: String,
    /// When it was discovered
    pub discovered_at: Option<DateTime<Utc>>,
    /// Arbitrary properties
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Event type label
    pub event_type: String,
    /// Schema version
    pub version: String,
}

impl IngredientDiscoveredEvent {
    /// Build a request around the discovered ingredient.
    ///
    /// Theme comes from [`theme_for_source`]; creator is `system`.
    #[must_use]
    pub fn into_request(self) -> Request {
        let theme = theme_for_source(&self.source);
        let correlation = if self.ingredient_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("discovery-{}", self.ingredient_id)
        };
        Request::builder()
            .ingredient(self.name)
            .theme(theme)
            .use_ai(true)
            .created_by(SYSTEM_CREATOR)
            .correlation_id(correlation)
            .build()
    }
}

/// Fixed mapping from discovery source to theme.
#[must_use]
pub fn theme_for_source(source: &str) -> &'static str {
    let source = source.to_ascii_lowercase();
    if source.contains("mars") {
        "Mars Base"
    } else if ["space", "station", "orbit", "lunar"]
        .iter()
        .any(|needle| source.contains(needle))
    {
        "Space Station"
    } else {
        "Earth Classic"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use crate::beverage::Ingredient;
    use proptest::prelude::*;

    fn beverage() -> Beverage {
        let mut beverage = Beverage::draft(
            "Nebula Mocha",
            "Chocolate and espresso",
            "Space Station",
            vec![Ingredient::new("espresso", 2.0, "shots")],
            Utc::now(),
        );
        beverage.metadata.tags.insert("bold".into());
        beverage
    }

    #[test]
    fn test_status_changed_carries_old_and_new() {
        let mut bev = beverage();
        bev.status = BeverageStatus::Approved;
        let event = BeverageEvent::status_changed(&bev, BeverageStatus::Pending, "svc", Utc::now());
        let change = &event.changes["status"];
        assert_eq!(change.old, "pending");
        assert_eq!(change.new, "approved");
        assert_eq!(event.event_type, EventType::BeverageStatusChanged);
    }

    #[test]
    fn test_envelope_wire_fields() {
        let event = BeverageEvent::created(&beverage(), "svc", Utc::now());
        let json: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();
        assert_eq!(json["event_type"], "beverage_created");
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["beverage_id"], event.key());
        assert!(json.get("changes").is_none());
    }

    #[test]
    fn test_headers_round_trip() {
        let headers = MessageHeaders::json("svc", Utc::now());
        let pairs = headers.to_pairs();
        let parsed = MessageHeaders::from_pairs(
            pairs.iter().map(|(k, v)| (*k, v.as_bytes())),
        )
        .unwrap();
        assert_eq!(parsed.producer, "svc");
        assert_eq!(parsed.content_type, CONTENT_TYPE_JSON);
    }

    #[test]
    fn test_missing_header_rejected() {
        let err = MessageHeaders::from_pairs([("content-type", b"application/json".as_slice())])
            .unwrap_err();
        assert!(err.message.contains("missing header"));
    }

    #[test]
    fn test_theme_mapping() {
        assert_eq!(theme_for_source("Mars Base"), "Mars Base");
        assert_eq!(theme_for_source("ISS orbital lab"), "Space Station");
        assert_eq!(theme_for_source("Lunar Outpost"), "Space Station");
        assert_eq!(theme_for_source("Kyoto market"), "Earth Classic");
    }

    #[test]
    fn test_discovery_request() {
        let event = IngredientDiscoveredEvent {
            ingredient_id: "ing-1".into(),
            name: "Martian Mint".into(),
            source: "Mars Base".into(),
            ..IngredientDiscoveredEvent::default()
        };
        let request = event.into_request();
        assert_eq!(request.theme, "Mars Base");
        assert_eq!(request.created_by, SYSTEM_CREATOR);
        assert_eq!(request.ingredients, vec!["Martian Mint".to_string()]);
        assert!(request.validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_envelope_decode_preserves_fields(
            name in "[A-Za-z ]{1,24}",
            tags in proptest::collection::btree_set("[a-z]{1,8}", 0..5),
        ) {
            let mut bev = beverage();
            bev.name = name.clone();
            bev.metadata.tags = tags.clone();
            let event = BeverageEvent::created(&bev, "svc", Utc::now());
            let decoded = BeverageEvent::decode(&event.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded.beverage.name, name);
            prop_assert_eq!(decoded.beverage.metadata.tags, tags);
            prop_assert_eq!(decoded.beverage_id, event.beverage_id);
        }
    }
}
