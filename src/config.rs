use crate::error::ReportError;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_OUTPUT: &str = "./bareport_web";

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub instances: Vec<String>,
    /// Explicit client list; when absent each catalog database is a client.
    pub clients: Option<Vec<String>>,
    pub output: PathBuf,
    /// Connection string per instance, without `dbname`.
    pub dsns: BTreeMap<String, String>,
}

impl ReportConfig {
    /// Read `BAREPORT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ReportError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let instances = lookup("BAREPORT_INSTANCES")
            .map(|value| split_list(&value))
            .unwrap_or_default();
        if instances.is_empty() {
            return Err(ReportError::Config("BAREPORT_INSTANCES lists no instance".to_string()));
        }

        let clients = lookup("BAREPORT_CLIENTS")
            .map(|value| split_list(&value))
            .filter(|names| !names.is_empty());
        let output = lookup("BAREPORT_OUTPUT")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

        let dsns = instances
            .iter()
            .filter_map(|instance| lookup(&dsn_key(instance)).map(|dsn| (instance.clone(), dsn)))
            .collect();

        Ok(Self {
            instances,
            clients,
            output,
            dsns,
        })
    }

    /// Instances listed in `instances` that have no connection settings.
    pub fn missing_dsns(&self) -> Vec<&str> {
        self.instances
            .iter()
            .filter(|instance| !self.dsns.contains_key(*instance))
            .map(String::as_str)
            .collect()
    }
}

/// `BAREPORT_DSN_<INSTANCE>` with the instance upper-cased and anything
/// but ASCII letters and digits turned into `_`.
pub fn dsn_key(instance: &str) -> String {
    let suffix: String = instance
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("BAREPORT_DSN_{}", suffix)
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_full_configuration() -> Result<(), ReportError> {
        let config = ReportConfig::from_lookup(lookup(&[
            ("BAREPORT_INSTANCES", "bacula-eu, bacula-us,"),
            ("BAREPORT_CLIENTS", "acme,globex"),
            ("BAREPORT_OUTPUT", "/var/www/bareport"),
            ("BAREPORT_DSN_BACULA_EU", "host=eu.example user=report"),
        ]))?;

        assert_eq!(config.instances, vec!["bacula-eu", "bacula-us"]);
        assert_eq!(config.clients, Some(vec!["acme".to_string(), "globex".to_string()]));
        assert_eq!(config.output, PathBuf::from("/var/www/bareport"));
        assert_eq!(config.dsns.get("bacula-eu").map(String::as_str), Some("host=eu.example user=report"));
        assert_eq!(config.missing_dsns(), vec!["bacula-us"]);
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<(), ReportError> {
        let config = ReportConfig::from_lookup(lookup(&[("BAREPORT_INSTANCES", "main"), ("BAREPORT_CLIENTS", " , ")]))?;
        assert_eq!(config.clients, None);
        assert_eq!(config.output, PathBuf::from(DEFAULT_OUTPUT));
        assert!(config.dsns.is_empty());
        Ok(())
    }

    #[test]
    fn test_instances_are_required() {
        assert!(matches!(ReportConfig::from_lookup(lookup(&[])), Err(ReportError::Config(_))));
        assert!(ReportConfig::from_lookup(lookup(&[("BAREPORT_INSTANCES", ",")])).is_err());
    }

    #[test]
    fn test_dsn_key() {
        assert_eq!(dsn_key("bacula-eu.2"), "BAREPORT_DSN_BACULA_EU_2");
    }
}
