//! Core data types for the Chronos storage engine
//!
//! - `EventPayload`: the wire record carried by the message bus
//! - `Event`: an immutable log event with id and timestamp filled in
//! - `Block`: the columnar buffer backing both the MemTable and decoded segments

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Event record as it travels through the bus
///
/// Wire field names are `id`, `ts`, `msg` and `source`. Producers may omit
/// `id` and `ts`; they are filled in by [`Event::from_payload`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unix timestamp in milliseconds
    #[serde(default)]
    pub ts: i64,
    pub msg: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl EventPayload {
    /// Serialize to the bus representation
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse from the bus representation
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// A single log event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub source: String,
    pub message: String,
}

impl Event {
    /// Create an event stamped now with a fresh id
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            source: source.into(),
            message: message.into(),
        }
    }

    /// Builder method: set timestamp
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Builder method: set id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Build an event from a bus payload, generating the id when absent or
    /// empty and defaulting the timestamp to now when zero.
    pub fn from_payload(payload: EventPayload) -> Self {
        let id = payload
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let timestamp = if payload.ts == 0 {
            Utc::now().timestamp_millis()
        } else {
            payload.ts
        };

        Self {
            id,
            timestamp,
            source: payload.source,
            message: payload.msg,
        }
    }

    /// Convert back to the wire representation
    pub fn to_payload(&self) -> EventPayload {
        EventPayload {
            id: Some(self.id.clone()),
            ts: self.timestamp,
            msg: self.message.clone(),
            source: self.source.clone(),
        }
    }
}

/// Columnar chunk of events
///
/// Four parallel columns; row `i` of every column belongs to the same event.
/// Rows stay in append order. The fields are private so that the columns can
/// only grow together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    ids: Vec<String>,
    timestamps: Vec<i64>,
    sources: Vec<String>,
    messages: Vec<String>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            timestamps: Vec::with_capacity(capacity),
            sources: Vec::with_capacity(capacity),
            messages: Vec::with_capacity(capacity),
        }
    }

    /// Assemble a block from decoded columns, rejecting ragged input
    pub fn from_columns(
        ids: Vec<String>,
        timestamps: Vec<i64>,
        sources: Vec<String>,
        messages: Vec<String>,
    ) -> Result<Self, String> {
        let len = ids.len();
        if timestamps.len() != len || sources.len() != len || messages.len() != len {
            return Err(format!(
                "column length mismatch: ids={}, timestamps={}, sources={}, messages={}",
                len,
                timestamps.len(),
                sources.len(),
                messages.len()
            ));
        }

        Ok(Self {
            ids,
            timestamps,
            sources,
            messages,
        })
    }

    /// Pivot an event into the columns
    pub fn push(&mut self, event: Event) {
        self.ids.push(event.id);
        self.timestamps.push(event.timestamp);
        self.sources.push(event.source);
        self.messages.push(event.message);
    }

    /// Append every row of `other` after the rows of `self`
    pub fn extend(&mut self, other: Block) {
        self.ids.extend(other.ids);
        self.timestamps.extend(other.timestamps);
        self.sources.extend(other.sources);
        self.messages.extend(other.messages);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Reassemble row `idx` as an event
    pub fn row(&self, idx: usize) -> Option<Event> {
        Some(Event {
            id: self.ids.get(idx)?.clone(),
            timestamp: *self.timestamps.get(idx)?,
            source: self.sources.get(idx)?.clone(),
            message: self.messages.get(idx)?.clone(),
        })
    }
}

impl FromIterator<Event> for Block {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut block = Block::new();
        for event in iter {
            block.push(event);
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns_aligned(block: &Block) -> bool {
        let len = block.ids().len();
        block.timestamps().len() == len
            && block.sources().len() == len
            && block.messages().len() == len
    }

    #[test]
    fn test_payload_wire_names() {
        let payload = EventPayload {
            id: Some("abc".into()),
            ts: 1700000000000,
            msg: "boot ok".into(),
            source: "web".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["ts"], 1700000000000i64);
        assert_eq!(json["msg"], "boot ok");
        assert_eq!(json["source"], "web");
    }

    #[test]
    fn test_payload_optional_fields() {
        let payload = EventPayload::from_bytes(br#"{"msg":"hello"}"#).unwrap();
        assert_eq!(payload.id, None);
        assert_eq!(payload.ts, 0);
        assert_eq!(payload.source, "");

        assert!(EventPayload::from_bytes(br#"{"ts":1}"#).is_err());
    }

    #[test]
    fn test_from_payload_fills_defaults() {
        let before = Utc::now().timestamp_millis();
        let event = Event::from_payload(EventPayload {
            id: Some(String::new()),
            ts: 0,
            msg: "m".into(),
            source: "s".into(),
        });

        assert!(!event.id.is_empty());
        assert!(uuid::Uuid::parse_str(&event.id).is_ok());
        assert!(event.timestamp >= before);
    }

    #[test]
    fn test_from_payload_keeps_given_values() {
        let event = Event::from_payload(EventPayload {
            id: Some("fixed".into()),
            ts: 42,
            msg: "m".into(),
            source: "s".into(),
        });
        assert_eq!(event.id, "fixed");
        assert_eq!(event.timestamp, 42);
        assert_eq!(event.to_payload().ts, 42);
    }

    #[test]
    fn test_block_columns_stay_aligned() {
        let mut block = Block::new();
        assert!(block.is_empty());

        for i in 0..10 {
            block.push(Event::new(format!("src-{}", i % 3), format!("msg {}", i)).timestamp(i));
            assert_eq!(block.len(), i as usize + 1);
            assert!(columns_aligned(&block));
        }

        let row = block.row(4).unwrap();
        assert_eq!(row.source, "src-1");
        assert_eq!(row.message, "msg 4");
        assert_eq!(row.timestamp, 4);
        assert!(block.row(10).is_none());
    }

    #[test]
    fn test_block_extend_preserves_order() {
        let mut first: Block = (0..3).map(|i| Event::new("a", i.to_string())).collect();
        let second: Block = (3..5).map(|i| Event::new("b", i.to_string())).collect();
        first.extend(second);

        assert_eq!(first.len(), 5);
        assert_eq!(first.messages(), &["0", "1", "2", "3", "4"]);
        assert!(columns_aligned(&first));
    }

    #[test]
    fn test_from_columns_rejects_mismatch() {
        let err = Block::from_columns(
            vec!["a".into(), "b".into()],
            vec![1],
            vec!["s".into(), "s".into()],
            vec!["m".into(), "m".into()],
        )
        .unwrap_err();
        assert!(err.contains("mismatch"));
    }
}
