//! Cassette file: a persistent collection of named records

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::mock::Exchange;
use crate::{PlaybackError, Result};

use super::record::Record;

/// A single JSON file holding named records.
///
/// The on-disk document is an object keyed by record name whose values are
/// arrays of exchange objects. Key order is not significant; exchange order
/// within a record is.
#[derive(Debug)]
pub struct Cassette {
    path: PathBuf,
    records: IndexMap<String, Vec<Exchange>>,
}

impl Cassette {
    /// Open a cassette at `path`, eagerly parsing the file when it exists.
    ///
    /// A missing file yields an empty cassette; the file is created on the
    /// first [`Cassette::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not the
    /// expected JSON shape.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text).map_err(|e| {
                PlaybackError::InvalidFormat(format!("{}: {e}", path.display()))
            })?
        } else {
            IndexMap::new()
        };

        debug!(
            "Loaded cassette {} with {} record(s)",
            path.display(),
            records.len()
        );
        Ok(Self { path, records })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record with the given name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Look up a record by name.
    ///
    /// Each call returns an independent [`Record`] with its cursor at 0, so
    /// concurrent tests replaying the same record never share a cursor.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Record> {
        self.records
            .get(name)
            .map(|exchanges| Record::with_exchanges(name, exchanges.clone()))
    }

    /// Names of all records, in file order.
    pub fn record_names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Insert or replace the record by name and rewrite the whole file.
    ///
    /// The rewrite is atomic against crashes: the document is written to a
    /// temporary sibling and renamed over the target.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the file write fails.
    pub fn save(&mut self, record: &Record) -> Result<()> {
        self.records
            .insert(record.name().to_string(), record.exchanges().to_vec());

        let json = serde_json::to_vec_pretty(&self.records)
            .map_err(|e| PlaybackError::InvalidFormat(e.to_string()))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.persist(&self.path)
            .map_err(|e| PlaybackError::Io(e.error))?;

        info!(
            "Saved record '{}' ({} exchange(s)) to {}",
            record.name(),
            record.len(),
            self.path.display()
        );
        Ok(())
    }
}
