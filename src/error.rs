use std::fmt;

#[derive(Debug)]
pub enum ReportError {
    Database(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Config(String),
    Other(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Database(e) => write!(f, "Database error: {}", e),
            ReportError::Io(e) => write!(f, "IO error: {}", e),
            ReportError::Serialization(e) => write!(f, "Serialization error: {}", e),
            ReportError::Config(e) => write!(f, "Configuration error: {}", e),
            ReportError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err)
    }
}

#[cfg(feature = "catalog")]
impl From<postgres::Error> for ReportError {
    fn from(err: postgres::Error) -> Self {
        ReportError::Database(err.to_string())
    }
}

impl From<String> for ReportError {
    fn from(err: String) -> Self {
        ReportError::Other(err)
    }
}

impl From<&str> for ReportError {
    fn from(err: &str) -> Self {
        ReportError::Other(err.to_string())
    }
}
