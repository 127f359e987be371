use bareport::{
    catalog::PostgresCatalog,
    collector::{Collector, Dataset},
    config::ReportConfig,
    report::ReportWriter,
    snapshot::{DATE_FORMAT, SnapshotStore},
    ReportError,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use dotenv::dotenv;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bareport")]
#[command(about = "Daily Bacula backup volume report", long_about = None)]
struct Cli {
    /// Comma-separated catalog instances (overrides BAREPORT_INSTANCES)
    #[arg(long)]
    instances: Option<String>,
    /// Comma-separated client databases (overrides BAREPORT_CLIENTS)
    #[arg(long)]
    clients: Option<String>,
    /// Output directory for snapshots and pages (overrides BAREPORT_OUTPUT)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Collection date, YYYY-MM-DD; defaults to today
    #[arg(long)]
    date: Option<String>,
    /// Only collect and persist, do not write HTML
    #[arg(long)]
    skip_render: bool,
}

fn main() -> Result<(), ReportError> {
    dotenv().ok();
    bareport::init_tracing("bareport");
    let cli = Cli::parse();

    let config = resolve_config(&cli)?;
    let today = match &cli.date {
        Some(date) => NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|e| ReportError::Config(format!("invalid --date {}: {}", date, e)))?
            .format(DATE_FORMAT)
            .to_string(),
        None => Local::now().format(DATE_FORMAT).to_string(),
    };
    for instance in config.missing_dsns() {
        tracing::warn!("No BAREPORT_DSN setting for instance {}", instance);
    }

    tracing::info!("bareport - {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    tracing::info!("Step 1/2: collecting data for {}", today);
    let store = SnapshotStore::new(&config.output);
    let mut catalog = PostgresCatalog::new(config.dsns.clone());
    let mut collector = Collector::new(&mut catalog, &store, today);
    let mut dataset = Dataset::new();
    for instance in &config.instances {
        let outcome = collector.collect_instance(instance, config.clients.as_deref())?;
        dataset.absorb(outcome);
    }

    if cli.skip_render {
        tracing::info!("Collected {} clients, rendering skipped", dataset.clients.len());
        return Ok(());
    }

    tracing::info!("Step 2/2: rendering reports for {} clients", dataset.clients.len());
    let pages = ReportWriter::new(&config.output).render(&dataset)?;
    tracing::info!("Wrote {} pages under {}", pages, config.output.display());
    Ok(())
}

/// Command line values take precedence over the environment.
fn resolve_config(cli: &Cli) -> Result<ReportConfig, ReportError> {
    let mut overrides: HashMap<&str, String> = HashMap::new();
    if let Some(instances) = &cli.instances {
        overrides.insert("BAREPORT_INSTANCES", instances.clone());
    }
    if let Some(clients) = &cli.clients {
        overrides.insert("BAREPORT_CLIENTS", clients.clone());
    }
    if let Some(output) = &cli.output {
        overrides.insert("BAREPORT_OUTPUT", output.display().to_string());
    }
    ReportConfig::from_lookup(|key| overrides.get(key).cloned().or_else(|| std::env::var(key).ok()))
}
