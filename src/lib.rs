pub mod catalog;
pub mod collector;
pub mod config;
pub mod error;
pub mod freshness;
pub mod grouper;
pub mod merge;
pub mod report;
pub mod snapshot;
pub mod value;

pub use error::*;
pub use value::{Value, VolumeSeries};

use tracing_subscriber::EnvFilter;

/// Log to stderr, `info` and above unless `RUST_LOG` says otherwise.
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    tracing::debug!("{} logging initialized", service);
}
