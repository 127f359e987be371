use crate::{
    error::ReportError,
    merge::{merge, merge_into},
    value::Value,
};
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// JSON snapshots of client datasets under `<output>/json`.
///
/// Per-day snapshots live in one directory per catalog instance and are
/// named `<client>.json-<date>`. They are never removed here. The combined
/// snapshot of a client is `<client>.json`, rewritten on every run.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    json_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            json_dir: output_dir.join("json"),
        }
    }

    pub fn json_dir(&self) -> &Path {
        &self.json_dir
    }

    pub fn instance_dir(&self, instance: &str) -> PathBuf {
        self.json_dir.join(instance)
    }

    pub fn day_path(&self, instance: &str, client: &str, date: &str) -> PathBuf {
        self.instance_dir(instance).join(format!("{}.json-{}", client, date))
    }

    pub fn combined_path(&self, client: &str) -> PathBuf {
        self.json_dir.join(format!("{}.json", client))
    }

    /// Per-day snapshots kept for `client`, oldest first.
    pub fn day_snapshots(&self, instance: &str, client: &str) -> Result<Vec<(String, PathBuf)>, ReportError> {
        let dir = self.instance_dir(instance);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ReportError::Io(e)),
        };

        let prefix = format!("{}.json-", client);
        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(date) = file_name.to_str().and_then(|name| name.strip_prefix(&prefix)) else {
                continue;
            };
            if NaiveDate::parse_from_str(date, DATE_FORMAT).is_err() {
                continue;
            }
            snapshots.push((date.to_string(), entry.path()));
        }
        snapshots.sort();
        Ok(snapshots)
    }

    /// Merge every per-day snapshot of `client` except `today`'s.
    ///
    /// Unreadable or malformed snapshots are logged and left out. The result
    /// is an empty node when no usable snapshot exists.
    pub fn load_history(&self, instance: &str, client: &str, today: &str) -> Result<Value, ReportError> {
        let mut history = Value::node();
        let mut merged = 0usize;
        for (date, path) in self.day_snapshots(instance, client)? {
            if date == today {
                continue;
            }
            if let Some(day) = read_snapshot(&path)? {
                merge_into(&mut history, day);
                merged += 1;
            }
        }
        tracing::debug!("{} ({}): merged {} previous daily snapshots", client, instance, merged);
        Ok(history)
    }

    /// Record today's collection, writing `null` when there was no data.
    pub fn save_today(
        &self,
        instance: &str,
        client: &str,
        today: &str,
        dataset: Option<&Value>,
    ) -> Result<(), ReportError> {
        write_json(&self.day_path(instance, client, today), &dataset)
    }

    pub fn save_combined(&self, client: &str, dataset: &Value) -> Result<(), ReportError> {
        write_json(&self.combined_path(client), dataset)
    }

    pub fn load_combined(&self, client: &str) -> Result<Option<Value>, ReportError> {
        read_snapshot(&self.combined_path(client))
    }
}

/// Fold today's collection into the history of previous days.
///
/// `None` means there is no data at all for this client.
pub fn combine(today: Option<Value>, history: Value) -> Option<Value> {
    match today {
        Some(today) => Some(merge(history, today)),
        None if history.is_empty() => None,
        None => Some(history),
    }
}

fn read_snapshot(path: &Path) -> Result<Option<Value>, ReportError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidData) => {
            tracing::warn!("Error reading {}: {}", path.display(), e);
            return Ok(None);
        }
        Err(e) => return Err(ReportError::Io(e)),
    };

    match serde_json::from_str::<Option<Value>>(&text) {
        Ok(Some(value @ Value::Node(_))) => Ok(Some(value)),
        Ok(Some(_)) => {
            tracing::warn!("Error reading {}: not a client dataset", path.display());
            Ok(None)
        }
        Ok(None) => {
            tracing::debug!("{} records a day without data", path.display());
            Ok(None)
        }
        Err(e) => {
            tracing::warn!("Error reading {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    // Write beside the target then rename over it
    let temp = PathBuf::from(format!("{}.tmp", path.display()));
    fs::write(&temp, serde_json::to_string(value)?)?;
    fs::rename(&temp, path)?;
    Ok(())
}
