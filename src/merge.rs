use crate::value::{Value, VolumeSeries};
use std::collections::BTreeMap;

/// Combine `incoming` into `base`, returning the merged value.
///
/// Dispatch per pair of values found under the same key:
/// - two mappings (nodes or series) are merged key by key, recursively
/// - two integers are summed
/// - two identifier sets become their sorted union
/// - anything else resolves to `incoming`
///
/// Keys present only in `base` are kept untouched. Integers are summed
/// every time they meet, so merging the same dataset twice doubles them.
pub fn merge(base: Value, incoming: Value) -> Value {
    match (base, incoming) {
        (Value::Node(base), Value::Node(incoming)) => Value::Node(merge_nodes(base, incoming)),
        (Value::Series(base), Value::Series(incoming)) => Value::Series(merge_series(base, incoming)),
        (Value::Series(base), Value::Node(incoming)) => {
            normalize(merge_nodes(lift(base), incoming))
        }
        (Value::Node(base), Value::Series(incoming)) => {
            normalize(merge_nodes(base, lift(incoming)))
        }
        (Value::Int(base), Value::Int(incoming)) => Value::Int(base.saturating_add(incoming)),
        (Value::Ids(mut base), Value::Ids(incoming)) => {
            base.extend(incoming);
            Value::Ids(base)
        }
        (_, incoming) => incoming,
    }
}

/// In-place form of [`merge`] for accumulating loops.
pub fn merge_into(base: &mut Value, incoming: Value) {
    let current = std::mem::take(base);
    *base = merge(current, incoming);
}

/// Fold any number of values into one, starting from an empty node.
pub fn merge_all<I>(values: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    values.into_iter().fold(Value::node(), merge)
}

pub fn merge_series(mut base: VolumeSeries, incoming: VolumeSeries) -> VolumeSeries {
    for (date, bytes) in incoming {
        let entry = base.entry(date).or_insert(0);
        *entry = entry.saturating_add(bytes);
    }
    base
}

fn merge_nodes(
    mut base: BTreeMap<String, Value>,
    incoming: BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    for (key, value) in incoming {
        let merged = match base.remove(&key) {
            Some(existing) => merge(existing, value),
            None => value,
        };
        base.insert(key, merged);
    }
    base
}

fn lift(series: VolumeSeries) -> BTreeMap<String, Value> {
    series
        .into_iter()
        .map(|(date, bytes)| (date, Value::Int(bytes)))
        .collect()
}

// A node made only of integers is a series again.
fn normalize(map: BTreeMap<String, Value>) -> Value {
    if map.is_empty() || !map.values().all(|value| matches!(value, Value::Int(_))) {
        return Value::Node(map);
    }
    Value::Series(
        map.into_iter()
            .filter_map(|(date, value)| match value {
                Value::Int(bytes) => Some((date, bytes)),
                _ => None,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn json(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    fn series(entries: &[(&str, u64)]) -> Value {
        Value::Series(entries.iter().map(|(d, b)| (d.to_string(), *b)).collect())
    }

    #[test]
    fn test_distinct_dates_are_not_summed() {
        let merged = merge(series(&[("2024-01-01", 100)]), series(&[("2024-01-02", 200)]));
        assert_eq!(merged, series(&[("2024-01-01", 100), ("2024-01-02", 200)]));
    }

    #[test]
    fn test_same_date_is_summed() {
        let merged = merge(series(&[("2024-01-01", 100)]), series(&[("2024-01-01", 23)]));
        assert_eq!(merged, series(&[("2024-01-01", 123)]));
    }

    #[test]
    fn test_merging_same_dataset_twice_doubles_integers() {
        let day = json(r#"{"total": {"2024-01-01": 10}, "hosts": {"a": {"total": {"2024-01-01": 10}}}}"#);
        let once = merge(Value::node(), day.clone());
        let twice = merge(once.clone(), day);
        assert_eq!(once.volume_at("2024-01-01"), 10);
        assert_eq!(twice.volume_at("2024-01-01"), 20);
        assert_eq!(twice.host("a").unwrap().volume_at("2024-01-01"), 20);
    }

    #[test]
    fn test_merge_is_order_independent_for_distinct_days() {
        let a = json(r#"{"total": {"2024-01-01": 1}, "hosts": {"h": {"total": {"2024-01-01": 1}}}, "instances": ["i1"]}"#);
        let b = json(r#"{"total": {"2024-01-02": 2}, "hosts": {"h": {"total": {"2024-01-02": 2}}, "g": {"total": {"2024-01-02": 0}}}, "instances": ["i2"]}"#);
        let c = json(r#"{"total": {"2024-01-03": 3}, "hosts": {"g": {"total": {"2024-01-03": 3}}}, "instances": ["i1"]}"#);

        let left = merge(merge(a.clone(), b.clone()), c.clone());
        let right = merge(a.clone(), merge(b.clone(), c.clone()));
        let swapped = merge(merge(b.clone(), a.clone()), c.clone());
        let reversed = merge(merge(c, b), a);

        assert_eq!(left, right);
        assert_eq!(left, swapped);
        assert_eq!(left, reversed);
        assert_eq!(left.host("g").unwrap().total().unwrap().len(), 2);
    }

    #[test]
    fn test_identifier_sets_become_sorted_union() {
        let merged = merge(json(r#"["zeta", "alpha"]"#), json(r#"["beta", "alpha"]"#));
        let expected: BTreeSet<String> = ["alpha", "beta", "zeta"].iter().map(|s| s.to_string()).collect();
        assert_eq!(merged, Value::Ids(expected));
        assert_eq!(serde_json::to_string(&merged).unwrap(), r#"["alpha","beta","zeta"]"#);
    }

    #[test]
    fn test_incompatible_types_take_incoming() {
        assert_eq!(merge(Value::Int(3), json(r#""text""#)), json(r#""text""#));
        assert_eq!(merge(json(r#"["a"]"#), Value::Int(7)), Value::Int(7));
        let merged = merge(json(r#"{"k": 1}"#), json(r#"{"k": ["x"]}"#));
        assert_eq!(merged.get("k"), Some(&json(r#"["x"]"#)));
    }

    #[test]
    fn test_keys_only_on_one_side_survive() {
        let merged = merge(json(r#"{"only_base": {"v": 1}}"#), json(r#"{"only_incoming": {"v": 2}}"#));
        assert_eq!(merged.get("only_base"), Some(&json(r#"{"v": 1}"#)));
        assert_eq!(merged.get("only_incoming"), Some(&json(r#"{"v": 2}"#)));
    }

    #[test]
    fn test_series_meeting_node_is_merged_per_key() {
        // An empty children map read from disk decodes as an empty node
        let merged = merge(Value::node(), series(&[("2024-01-01", 4)]));
        assert_eq!(merged, series(&[("2024-01-01", 4)]));

        let merged = merge(series(&[("2024-01-01", 4)]), json(r#"{"2024-01-01": {"odd": 1}}"#));
        assert_eq!(merged.get("2024-01-01"), Some(&json(r#"{"odd": 1}"#)));
    }

    #[test]
    fn test_merge_into_and_merge_all() {
        let mut acc = Value::node();
        merge_into(&mut acc, json(r#"{"total": {"2024-01-01": 5}}"#));
        merge_into(&mut acc, json(r#"{"total": {"2024-01-01": 6}}"#));
        assert_eq!(acc.volume_at("2024-01-01"), 11);

        let all = merge_all(vec![
            json(r#"{"total": {"2024-01-01": 1}}"#),
            json(r#"{"total": {"2024-01-02": 2}}"#),
        ]);
        assert_eq!(all.total().unwrap().len(), 2);
        assert_eq!(merge_all(Vec::new()), Value::node());
    }
}
