//! Journal events: one parsed line of the game's journal.
//!
//! Parsing is two-tier. [`parse_line`] produces a [`JournalEvent`] holding the
//! generic JSON object plus the fields every consumer needs (name, timestamp).
//! Handlers that need the full payload call [`JournalEvent::materialize`] to
//! deserialize into one of the typed shapes in [`shapes`]. Most dispatch only
//! needs a handful of common fields, read straight from the object.

pub mod shapes;

use jiff::{Timestamp, civil, tz::TimeZone};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Errors from parsing a journal line or materializing a typed shape.
///
/// A failing line is skipped by the caller; it never aborts a batch.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("line is not a JSON object")]
    NotAnObject,

    #[error("line has no \"event\" field")]
    MissingEvent,

    #[error("{event} does not match its expected shape: {source}")]
    Shape {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One journal line, parsed into its generic form.
#[derive(Debug, Clone)]
pub struct JournalEvent {
    name: String,
    timestamp: Timestamp,
    /// Whether `timestamp` came from the line rather than the clock.
    stamped: bool,
    raw: String,
    fields: Map<String, Value>,
}

/// Parses one raw journal line.
pub fn parse_line(raw: &str) -> Result<JournalEvent, ParseError> {
    let value: Value = serde_json::from_str(raw).map_err(ParseError::Malformed)?;
    let Value::Object(fields) = value else {
        return Err(ParseError::NotAnObject);
    };
    let name = fields
        .get("event")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or(ParseError::MissingEvent)?
        .to_string();
    let stamp = fields
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);

    Ok(JournalEvent {
        name,
        timestamp: stamp.unwrap_or_else(Timestamp::now),
        stamped: stamp.is_some(),
        raw: raw.to_string(),
        fields,
    })
}

/// Parses a journal timestamp. A timestamp without an offset is taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    if let Ok(ts) = text.parse::<Timestamp>() {
        return Some(ts);
    }
    let local = text.parse::<civil::DateTime>().ok()?;
    local
        .to_zoned(TimeZone::UTC)
        .ok()
        .map(|zoned| zoned.timestamp())
}

impl JournalEvent {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the game wrote the event, or when we parsed it if the line had
    /// no usable timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The timestamp the game wrote, if the line carried a usable one.
    pub fn game_timestamp(&self) -> Option<Timestamp> {
        self.stamped.then_some(self.timestamp)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.field(key).and_then(Value::as_u64)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.field(key).and_then(Value::as_bool)
    }

    /// The system this event names: `StarSystem`, or `SystemName` for the
    /// discovery-scan family.
    pub fn star_system(&self) -> Option<&str> {
        self.str_field("StarSystem")
            .or_else(|| self.str_field("SystemName"))
            .filter(|name| !name.is_empty())
    }

    pub fn system_address(&self) -> Option<u64> {
        self.u64_field("SystemAddress")
    }

    pub fn star_pos(&self) -> Option<[f64; 3]> {
        let coords = self.field("StarPos")?.as_array()?;
        match coords.as_slice() {
            [x, y, z] => Some([x.as_f64()?, y.as_f64()?, z.as_f64()?]),
            _ => None,
        }
    }

    pub fn market_id(&self) -> Option<u64> {
        self.u64_field("MarketID")
    }

    pub fn carrier_id(&self) -> Option<u64> {
        self.u64_field("CarrierID")
    }

    /// Deserializes the full payload into a typed shape.
    pub fn materialize<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        serde_json::from_str(&self.raw).map_err(|source| ParseError::Shape {
            event: self.name.clone(),
            source,
        })
    }
}
