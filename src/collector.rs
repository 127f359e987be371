use crate::{
    catalog::{CatalogSource, MAINTENANCE_DATABASE},
    error::ReportError,
    grouper::group_records,
    merge::{merge, merge_series},
    snapshot::{SnapshotStore, combine},
    value::{Value, VolumeSeries},
};
use std::collections::{BTreeMap, BTreeSet};

/// Result of collecting one catalog instance.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InstanceOutcome {
    pub clients: BTreeMap<String, Value>,
    /// `"<client> (<instance>)"` for every client with no data at all.
    pub nodata: Vec<String>,
}

/// Collects today's jobs and maintains snapshots, one client at a time.
pub struct Collector<'a, C: CatalogSource> {
    catalog: &'a mut C,
    store: &'a SnapshotStore,
    today: String,
}

impl<'a, C: CatalogSource> Collector<'a, C> {
    pub fn new(catalog: &'a mut C, store: &'a SnapshotStore, today: impl Into<String>) -> Self {
        Self {
            catalog,
            store,
            today: today.into(),
        }
    }

    pub fn today(&self) -> &str {
        &self.today
    }

    /// Collect every client of `instance`.
    ///
    /// `clients` overrides discovery of the instance's client databases.
    pub fn collect_instance(
        &mut self,
        instance: &str,
        clients: Option<&[String]>,
    ) -> Result<InstanceOutcome, ReportError> {
        let names = match clients {
            Some(names) => names.to_vec(),
            None => match self.catalog.client_databases(instance) {
                Ok(names) => names,
                Err(e) => {
                    tracing::error!("Database error on instance {}, listing clients: {}", instance, e);
                    Vec::new()
                }
            },
        };

        let mut outcome = InstanceOutcome::default();
        for client in names.iter().filter(|name| name.as_str() != MAINTENANCE_DATABASE) {
            match self.process_client(instance, client)? {
                Some(dataset) => {
                    outcome.clients.insert(client.clone(), dataset);
                }
                None => {
                    tracing::warn!("No data for {}, ignoring.", client);
                    outcome.nodata.push(format!("{} ({})", client, instance));
                }
            }
        }
        tracing::info!(
            "Instance {}: {} clients with data, {} without",
            instance,
            outcome.clients.len(),
            outcome.nodata.len()
        );
        Ok(outcome)
    }

    /// Collect one client and refresh its snapshots.
    ///
    /// Returns the combined dataset, or `None` when the client has neither
    /// jobs today nor any history. The per-day snapshot is written either
    /// way; the combined one only when there is data.
    pub fn process_client(&mut self, instance: &str, client: &str) -> Result<Option<Value>, ReportError> {
        let history = self.store.load_history(instance, client, &self.today)?;

        let today = match self.catalog.job_records(instance, client) {
            Ok(records) => group_records(&records, &self.today).map(|node| node.with_instance(instance)),
            Err(e) => {
                tracing::error!("Database error on instance {}, database {}: {}", instance, client, e);
                None
            }
        };
        self.store.save_today(instance, client, &self.today, today.as_ref())?;

        let Some(combined) = combine(today, history) else {
            return Ok(None);
        };
        self.store.save_combined(client, &combined)?;
        Ok(Some(combined))
    }
}

/// Clients gathered across every configured instance.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dataset {
    pub clients: BTreeMap<String, Value>,
    pub nodata: Vec<String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance's clients. A client seen on several instances is
    /// merged into a single entry.
    pub fn absorb(&mut self, outcome: InstanceOutcome) {
        for (name, client) in outcome.clients {
            let merged = match self.clients.remove(&name) {
                Some(existing) => merge(existing, client),
                None => client,
            };
            self.clients.insert(name, merged);
        }
        self.nodata.extend(outcome.nodata);
    }

    /// Daily volume of all clients together.
    pub fn total(&self) -> VolumeSeries {
        self.clients
            .values()
            .filter_map(Value::total)
            .fold(VolumeSeries::new(), |acc, series| merge_series(acc, series.clone()))
    }

    /// Every instance that contributed data.
    pub fn instances(&self) -> BTreeSet<String> {
        self.clients
            .values()
            .flat_map(|client| client.instances())
            .map(str::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::grouper::JobRecord;

    #[test]
    fn test_process_client_writes_both_snapshots() -> Result<(), ReportError> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(temp_dir.path());
        let mut catalog = InMemoryCatalog::new();
        catalog.add_jobs("main", "acme", vec![JobRecord::new("web1_etc", 12)]);

        let mut collector = Collector::new(&mut catalog, &store, "2024-01-01");
        let dataset = collector.process_client("main", "acme")?.unwrap();

        assert_eq!(dataset.volume_at("2024-01-01"), 12);
        assert_eq!(dataset.instances().collect::<Vec<_>>(), vec!["main"]);
        assert!(store.day_path("main", "acme", "2024-01-01").exists());
        assert_eq!(store.load_combined("acme")?, Some(dataset));
        Ok(())
    }

    #[test]
    fn test_maintenance_database_is_not_a_client() -> Result<(), ReportError> {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(temp_dir.path());
        let mut catalog = InMemoryCatalog::new();
        catalog.add_jobs("main", "postgres", vec![JobRecord::new("x", 1)]);
        catalog.add_jobs("main", "acme", vec![JobRecord::new("web1", 1)]);

        let outcome = Collector::new(&mut catalog, &store, "2024-01-01").collect_instance("main", None)?;
        assert_eq!(outcome.clients.keys().collect::<Vec<_>>(), vec!["acme"]);
        assert!(outcome.nodata.is_empty());
        assert!(!store.day_path("main", "postgres", "2024-01-01").exists());
        Ok(())
    }

    #[test]
    fn test_dataset_merges_clients_across_instances() {
        let eu = group_records(&[JobRecord::new("web1_etc", 10)], "2024-01-01").unwrap().with_instance("eu");
        let us = group_records(&[JobRecord::new("web2", 5)], "2024-01-01").unwrap().with_instance("us");
        let other = group_records(&[JobRecord::new("mx", 1)], "2024-01-02").unwrap().with_instance("us");

        let mut dataset = Dataset::new();
        dataset.absorb(InstanceOutcome {
            clients: BTreeMap::from([("acme".to_string(), eu)]),
            nodata: vec!["globex (eu)".to_string()],
        });
        dataset.absorb(InstanceOutcome {
            clients: BTreeMap::from([("acme".to_string(), us), ("initech".to_string(), other)]),
            nodata: Vec::new(),
        });

        let acme = &dataset.clients["acme"];
        assert_eq!(acme.volume_at("2024-01-01"), 15);
        assert_eq!(acme.hosts().count(), 2);
        assert_eq!(acme.instances().collect::<Vec<_>>(), vec!["eu", "us"]);
        assert_eq!(
            dataset.total(),
            VolumeSeries::from([("2024-01-01".to_string(), 15), ("2024-01-02".to_string(), 1)])
        );
        assert_eq!(dataset.instances(), BTreeSet::from(["eu".to_string(), "us".to_string()]));
        assert_eq!(dataset.nodata, vec!["globex (eu)".to_string()]);
    }
}
