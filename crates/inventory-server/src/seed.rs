//! Inventory fixture loading.
//!
//! The in-memory store starts empty. A fixture is a YAML document listing
//! the records to load before the API starts serving:
//!
//! ```yaml
//! records:
//!   - kind: DataCenter
//!     id: dc1
//!     name: east
//!   - kind: Cluster
//!     id: c1
//!     name: prod
//!     fields:
//!       dataCenter: dc1
//! ```

use std::path::Path;

use inventory_types::ModelRecord;
use serde::Deserialize;

/// Errors that can occur when loading a fixture.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// Failed to read the fixture file.
    #[error("failed to read fixture: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The fixture is not a valid record list.
    #[error("failed to parse fixture YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for SeedError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    records: Vec<ModelRecord>,
}

/// Read the records listed in the fixture at `path`.
pub fn load(path: &Path) -> Result<Vec<ModelRecord>, SeedError> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

/// Parse a fixture document.
pub fn parse(yaml: &str) -> Result<Vec<ModelRecord>, SeedError> {
    let fixture: Fixture = serde_yml::from_str(yaml)?;
    Ok(fixture.records)
}
