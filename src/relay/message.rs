//! Relay wire messages (JSON arrays over websocket text frames).
//!
//! ```text
//! client -> relay   ["EVENT", <record>] | ["REQ", <sub>, <filter>] | ["CLOSE", <sub>]
//! relay -> client   ["OK", <id>, <bool>, <msg>] | ["EVENT", <sub>, <record>]
//!                   ["EOSE", <sub>] | ["CLOSED", <sub>, <msg>] | ["NOTICE", <msg>]
//! ```

use serde_json::{Value, json};

use super::RelayError;
use crate::record::{Filter, Record};

/// Messages sent to a relay.
#[derive(Debug, Clone)]
pub enum ClientMessage<'a> {
    Event(&'a Record),
    Req { sub: &'a str, filter: &'a Filter },
    Close(&'a str),
}

impl ClientMessage<'_> {
    pub fn to_json(&self) -> Result<String, RelayError> {
        let value = match self {
            Self::Event(record) => json!(["EVENT", record]),
            Self::Req { sub, filter } => json!(["REQ", sub, filter]),
            Self::Close(sub) => json!(["CLOSE", sub]),
        };
        serde_json::to_string(&value).map_err(|e| RelayError::Protocol(e.to_string()))
    }
}

/// Messages received from a relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Ok {
        id: String,
        accepted: bool,
        message: String,
    },
    Event {
        sub: String,
        record: Box<Record>,
    },
    Eose(String),
    Closed {
        sub: String,
        message: String,
    },
    Notice(String),
}

impl RelayMessage {
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| RelayError::Protocol(e.to_string()))?;
        let Some(items) = value.as_array() else {
            return Err(RelayError::Protocol("expected JSON array".into()));
        };
        let str_at = |i: usize| -> Result<String, RelayError> {
            items
                .get(i)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| RelayError::Protocol(format!("missing string at index {i}")))
        };

        match str_at(0)?.as_str() {
            "OK" => Ok(Self::Ok {
                id: str_at(1)?,
                accepted: items.get(2).and_then(Value::as_bool).unwrap_or(false),
                message: str_at(3).unwrap_or_default(),
            }),
            "EVENT" => {
                let raw = items
                    .get(2)
                    .cloned()
                    .ok_or_else(|| RelayError::Protocol("EVENT without record".into()))?;
                let record =
                    serde_json::from_value(raw).map_err(|e| RelayError::Protocol(e.to_string()))?;
                Ok(Self::Event {
                    sub: str_at(1)?,
                    record: Box::new(record),
                })
            }
            "EOSE" => Ok(Self::Eose(str_at(1)?)),
            "CLOSED" => Ok(Self::Closed {
                sub: str_at(1)?,
                message: str_at(2).unwrap_or_default(),
            }),
            "NOTICE" => Ok(Self::Notice(str_at(1).unwrap_or_default())),
            other => Err(RelayError::Protocol(format!("unknown message type `{other}`"))),
        }
    }
}
