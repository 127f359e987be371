use crate::error::ReportError;
use crate::grouper::JobRecord;
use std::collections::{BTreeMap, BTreeSet};

/// Finished full backups, successful or with warnings.
pub const JOBS_QUERY: &str =
    "SELECT name, jobbytes FROM public.job WHERE type='B' AND (jobstatus='T' OR jobstatus='W')";

pub const DATABASES_QUERY: &str = "SELECT datname FROM pg_database WHERE datistemplate = false";

/// Maintenance database of every instance, never a client.
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// Source of raw job rows, one database per client on each instance.
pub trait CatalogSource {
    fn client_databases(&mut self, instance: &str) -> Result<Vec<String>, ReportError>;
    fn job_records(&mut self, instance: &str, database: &str) -> Result<Vec<JobRecord>, ReportError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    pub databases: BTreeMap<String, Vec<String>>,
    pub jobs: BTreeMap<(String, String), Vec<JobRecord>>,
    pub unreachable: BTreeSet<String>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_jobs(&mut self, instance: &str, database: &str, jobs: Vec<JobRecord>) {
        let databases = self.databases.entry(instance.to_string()).or_default();
        if !databases.iter().any(|d| d == database) {
            databases.push(database.to_string());
        }
        self.jobs
            .entry((instance.to_string(), database.to_string()))
            .or_default()
            .extend(jobs);
    }

    /// Replace the rows of one client database, as a new day would.
    pub fn set_jobs(&mut self, instance: &str, database: &str, jobs: Vec<JobRecord>) {
        self.jobs.remove(&(instance.to_string(), database.to_string()));
        self.add_jobs(instance, database, jobs);
    }

    /// Make every query against `instance` fail.
    pub fn set_unreachable(&mut self, instance: &str) {
        self.unreachable.insert(instance.to_string());
    }

    fn check_reachable(&self, instance: &str) -> Result<(), ReportError> {
        if self.unreachable.contains(instance) {
            return Err(ReportError::Database(format!("instance {} is unreachable", instance)));
        }
        Ok(())
    }
}

impl CatalogSource for InMemoryCatalog {
    fn client_databases(&mut self, instance: &str) -> Result<Vec<String>, ReportError> {
        self.check_reachable(instance)?;
        Ok(self.databases.get(instance).cloned().unwrap_or_default())
    }

    fn job_records(&mut self, instance: &str, database: &str) -> Result<Vec<JobRecord>, ReportError> {
        self.check_reachable(instance)?;
        Ok(self
            .jobs
            .get(&(instance.to_string(), database.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(feature = "catalog")]
pub use self::postgres_catalog::PostgresCatalog;

#[cfg(feature = "catalog")]
mod postgres_catalog {
    use super::{CatalogSource, DATABASES_QUERY, JOBS_QUERY, MAINTENANCE_DATABASE};
    use crate::error::ReportError;
    use crate::grouper::JobRecord;
    use postgres::{Client, Config, NoTls};
    use std::collections::BTreeMap;

    /// Bacula catalogs served by PostgreSQL, one connection per query.
    pub struct PostgresCatalog {
        dsns: BTreeMap<String, String>,
    }

    impl PostgresCatalog {
        /// `dsns` maps each instance to a libpq key/value connection string
        /// without `dbname`.
        pub fn new(dsns: BTreeMap<String, String>) -> Self {
            Self { dsns }
        }

        fn connect(&self, instance: &str, database: &str) -> Result<Client, ReportError> {
            let dsn = self.dsns.get(instance).ok_or_else(|| {
                ReportError::Config(format!("no connection settings for instance {}", instance))
            })?;
            let mut config: Config = dsn.parse()?;
            config.dbname(database);
            Ok(config.connect(NoTls)?)
        }
    }

    impl CatalogSource for PostgresCatalog {
        fn client_databases(&mut self, instance: &str) -> Result<Vec<String>, ReportError> {
            let mut client = self.connect(instance, MAINTENANCE_DATABASE)?;
            let rows = client.query(DATABASES_QUERY, &[])?;
            let mut databases = Vec::with_capacity(rows.len());
            for row in rows {
                let name: String = row.try_get(0)?;
                databases.push(name);
            }
            Ok(databases)
        }

        fn job_records(&mut self, instance: &str, database: &str) -> Result<Vec<JobRecord>, ReportError> {
            let mut client = self.connect(instance, database)?;
            let rows = client.query(JOBS_QUERY, &[])?;
            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                let name: String = row.try_get(0)?;
                let bytes: Option<i64> = row.try_get(1)?;
                records.push(JobRecord::new(name, bytes.unwrap_or(0).max(0) as u64));
            }
            Ok(records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_catalog() -> Result<(), ReportError> {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_jobs("main", "acme", vec![JobRecord::new("web1_etc", 5)]);
        catalog.add_jobs("main", "acme", vec![JobRecord::new("web1", 1)]);
        catalog.add_jobs("main", "globex", vec![]);

        assert_eq!(catalog.client_databases("main")?, vec!["acme".to_string(), "globex".to_string()]);
        assert_eq!(catalog.job_records("main", "acme")?.len(), 2);
        assert!(catalog.job_records("main", "initech")?.is_empty());
        assert!(catalog.client_databases("other")?.is_empty());

        catalog.set_jobs("main", "acme", vec![JobRecord::new("web1_etc", 9)]);
        assert_eq!(catalog.job_records("main", "acme")?, vec![JobRecord::new("web1_etc", 9)]);
        Ok(())
    }

    #[test]
    fn test_unreachable_instance_fails() {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_jobs("main", "acme", vec![JobRecord::new("web1", 1)]);
        catalog.set_unreachable("main");
        assert!(matches!(catalog.job_records("main", "acme"), Err(ReportError::Database(_))));
        assert!(catalog.client_databases("main").is_err());
    }
}
