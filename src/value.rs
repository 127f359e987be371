use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const TOTAL: &str = "total";
pub const HOSTS: &str = "hosts";
pub const FILESETS: &str = "filesets";
pub const INSTANCES: &str = "instances";

/// Daily volume in bytes keyed by ISO date (`YYYY-MM-DD`).
/// ISO dates sort lexicographically in chronological order.
pub type VolumeSeries = BTreeMap<String, u64>;

/// One node of a persisted dataset.
///
/// Client, host and fileset nodes are all `Node`s holding a `total` series
/// and, depending on the level, a `hosts`/`filesets` child node and an
/// `instances` identifier set. Anything a snapshot file contains that does
/// not fit the other variants is kept verbatim as `Opaque`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(u64),
    Series(VolumeSeries),
    Ids(BTreeSet<String>),
    Node(BTreeMap<String, Value>),
    Opaque(serde_json::Value),
}

impl Default for Value {
    fn default() -> Self {
        Value::Node(BTreeMap::new())
    }
}

impl Value {
    pub fn node() -> Self {
        Value::default()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Int(_) => false,
            Value::Series(series) => series.is_empty(),
            Value::Ids(ids) => ids.is_empty(),
            Value::Node(map) => map.is_empty(),
            Value::Opaque(json) => json.is_null(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Node(map) => map.get(key),
            _ => None,
        }
    }

    /// Insert `value` under `key`. A non-node receiver is replaced by an
    /// empty node first.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        if !matches!(self, Value::Node(_)) {
            *self = Value::node();
        }
        match self {
            Value::Node(map) => map.insert(key.into(), value),
            _ => None,
        }
    }

    pub fn total(&self) -> Option<&VolumeSeries> {
        match self.get(TOTAL) {
            Some(Value::Series(series)) => Some(series),
            _ => None,
        }
    }

    /// Named children stored under `key`, in name order.
    pub fn children(&self, key: &str) -> impl Iterator<Item = (&str, &Value)> {
        let map = match self.get(key) {
            Some(Value::Node(map)) => Some(map),
            _ => None,
        };
        map.into_iter()
            .flat_map(|map| map.iter())
            .map(|(name, child)| (name.as_str(), child))
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.children(HOSTS)
    }

    pub fn filesets(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.children(FILESETS)
    }

    pub fn host(&self, name: &str) -> Option<&Value> {
        self.get(HOSTS).and_then(|hosts| hosts.get(name))
    }

    pub fn fileset(&self, name: &str) -> Option<&Value> {
        self.get(FILESETS).and_then(|filesets| filesets.get(name))
    }

    pub fn instances(&self) -> impl Iterator<Item = &str> {
        let ids = match self.get(INSTANCES) {
            Some(Value::Ids(ids)) => Some(ids),
            _ => None,
        };
        ids.into_iter().flat_map(|ids| ids.iter()).map(String::as_str)
    }

    /// Tag a client node with the catalog instance it was collected from.
    pub fn with_instance(mut self, instance: &str) -> Self {
        self.insert(INSTANCES, Value::Ids(BTreeSet::from([instance.to_string()])));
        self
    }

    /// Volume recorded at `date` in this node's total, zero when absent.
    pub fn volume_at(&self, date: &str) -> u64 {
        self.total()
            .and_then(|series| series.get(date))
            .copied()
            .unwrap_or(0)
    }
}

impl From<VolumeSeries> for Value {
    fn from(series: VolumeSeries) -> Self {
        Value::Series(series)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Number(number) => match number.as_u64() {
                Some(n) => Value::Int(n),
                None => Value::Opaque(serde_json::Value::Number(number)),
            },
            serde_json::Value::Array(items) if items.iter().all(|item| item.is_string()) => {
                Value::Ids(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            serde_json::Value::String(id) => Some(id),
                            _ => None,
                        })
                        .collect(),
                )
            }
            serde_json::Value::Object(map)
                if !map.is_empty() && map.values().all(serde_json::Value::is_u64) =>
            {
                Value::Series(
                    map.into_iter()
                        .filter_map(|(date, bytes)| bytes.as_u64().map(|n| (date, n)))
                        .collect(),
                )
            }
            serde_json::Value::Object(map) => Value::Node(
                map.into_iter()
                    .map(|(key, child)| (key, Value::from(child)))
                    .collect(),
            ),
            other => Value::Opaque(other),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}
