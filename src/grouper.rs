use crate::value::{Value, FILESETS, HOSTS, TOTAL, VolumeSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A finished backup job as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,
    pub bytes: u64,
}

impl JobRecord {
    pub fn new(name: impl Into<String>, bytes: u64) -> Self {
        Self { name: name.into(), bytes }
    }
}

/// Host and fileset encoded in a job name as `host_fileset[_...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobName<'a> {
    pub host: &'a str,
    pub fileset: Option<&'a str>,
}

pub fn parse_job_name(name: &str) -> JobName<'_> {
    let mut segments = name.split('_');
    let host = segments.next().unwrap_or(name);
    JobName {
        host,
        fileset: segments.next(),
    }
}

#[derive(Default)]
struct HostVolume {
    bytes: u64,
    filesets: BTreeMap<String, u64>,
}

/// Group one client's job records into a client node with `date` totals.
///
/// Returns `None` when there is nothing to group. Every host and fileset
/// touched gets an entry for `date`, even when all its jobs are empty.
pub fn group_records(records: &[JobRecord], date: &str) -> Option<Value> {
    if records.is_empty() {
        return None;
    }

    let mut client_bytes = 0u64;
    let mut hosts: BTreeMap<String, HostVolume> = BTreeMap::new();
    for record in records {
        let job = parse_job_name(&record.name);
        let host = hosts.entry(job.host.to_string()).or_default();
        if let Some(fileset) = job.fileset {
            let fileset_bytes = host.filesets.entry(fileset.to_string()).or_insert(0);
            *fileset_bytes = fileset_bytes.saturating_add(record.bytes);
        }
        host.bytes = host.bytes.saturating_add(record.bytes);
        client_bytes = client_bytes.saturating_add(record.bytes);
    }

    let mut host_nodes = Value::node();
    for (name, volume) in hosts {
        let mut fileset_nodes = Value::node();
        for (fileset, bytes) in volume.filesets {
            fileset_nodes.insert(fileset, total_node(date, bytes));
        }
        let mut host = total_node(date, volume.bytes);
        host.insert(FILESETS, fileset_nodes);
        host_nodes.insert(name, host);
    }

    let mut client = total_node(date, client_bytes);
    client.insert(HOSTS, host_nodes);
    Some(client)
}

fn total_node(date: &str, bytes: u64) -> Value {
    let mut node = Value::node();
    node.insert(TOTAL, Value::Series(VolumeSeries::from([(date.to_string(), bytes)])));
    node
}
