//! Protocol statistics payloads.
//!
//! The statistics engine returns protocol keys with a `value` whose shape
//! depends on the key: `*.protostats.<proto>` carries one record per
//! operation, `*.protostats.<proto>.total` carries the protocol totals.
//! The schema is chosen from the key before decoding.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Numeric fields shared by operation and total records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ProtoFields {
    #[serde(default)]
    pub in_max: f64,
    #[serde(default)]
    pub in_min: f64,
    #[serde(default)]
    pub in_rate: f64,
    #[serde(default)]
    pub out_max: f64,
    #[serde(default)]
    pub out_min: f64,
    #[serde(default)]
    pub out_rate: f64,
    #[serde(default)]
    pub op_count: f64,
    #[serde(default)]
    pub op_rate: f64,
    #[serde(default)]
    pub time_avg: f64,
    #[serde(default)]
    pub time_max: f64,
    #[serde(default)]
    pub time_min: f64,
}

/// Field names in metric-name form, in the order `ProtoFields::values` yields them.
pub const PROTO_FIELD_NAMES: [&str; 11] = [
    "in_max", "in_min", "in_rate", "out_max", "out_min", "out_rate", "op_count", "op_rate",
    "time_avg", "time_max", "time_min",
];

impl ProtoFields {
    pub fn values(&self) -> [f64; 11] {
        [
            self.in_max,
            self.in_min,
            self.in_rate,
            self.out_max,
            self.out_min,
            self.out_rate,
            self.op_count,
            self.op_rate,
            self.time_avg,
            self.time_max,
            self.time_min,
        ]
    }
}

/// Per-operation record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProtoOpStat {
    pub op_name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(flatten)]
    pub fields: ProtoFields,
}

/// Protocol totals record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProtoTotalStat {
    #[serde(flatten)]
    pub fields: ProtoFields,
}

/// Decoded protocol statistics value.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoStatPayload {
    Operations(Vec<ProtoOpStat>),
    Totals(Vec<ProtoTotalStat>),
}

/// Shape of the `value` field for a protocol statistics key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoStatSchema {
    Operations,
    Totals,
}

impl ProtoStatSchema {
    pub fn for_key(key: &str) -> Self {
        if key.ends_with(".total") {
            ProtoStatSchema::Totals
        } else {
            ProtoStatSchema::Operations
        }
    }

    /// Decodes one record's value. A null value is an empty payload; a
    /// non-array value is an error; malformed array entries are skipped.
    pub fn decode(self, key: &str, value: Value) -> Result<ProtoStatPayload, String> {
        let items = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            other => {
                return Err(format!(
                    "expected an array of records, got {}",
                    json_kind(&other)
                ));
            }
        };
        Ok(match self {
            ProtoStatSchema::Operations => ProtoStatPayload::Operations(decode_each(key, items)),
            ProtoStatSchema::Totals => ProtoStatPayload::Totals(decode_each(key, items)),
        })
    }
}

fn decode_each<T: for<'de> Deserialize<'de>>(key: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, error = %e, "skipping malformed protocol record");
                None
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
