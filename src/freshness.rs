use crate::value::Value;

/// Most recent date in the node's total, if it has any.
pub fn last_date(node: &Value) -> Option<&str> {
    node.total()
        .and_then(|series| series.keys().next_back())
        .map(String::as_str)
}

/// A child is stale when its last recorded date is older than `reference`.
/// A child with no recorded date at all is stale too.
pub fn is_stale(child: &Value, reference: &str) -> bool {
    match last_date(child) {
        Some(date) => date < reference,
        None => true,
    }
}

/// Hosts whose last backup is not older than the client's last backup.
pub fn current_hosts(client: &Value) -> Vec<(&str, &Value)> {
    current_children(client, client.hosts())
}

/// Filesets whose last backup is not older than their host's last backup.
pub fn current_filesets(host: &Value) -> Vec<(&str, &Value)> {
    current_children(host, host.filesets())
}

fn current_children<'a>(
    parent: &Value,
    children: impl Iterator<Item = (&'a str, &'a Value)>,
) -> Vec<(&'a str, &'a Value)> {
    let Some(reference) = last_date(parent) else {
        return Vec::new();
    };
    children
        .filter(|(name, child)| {
            let stale = is_stale(child, reference);
            if stale {
                tracing::info!(
                    "Skipping {}: last backup ({}) < parent last backup ({})",
                    name,
                    last_date(child).unwrap_or("never"),
                    reference
                );
            }
            !stale
        })
        .collect()
}
