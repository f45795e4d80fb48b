//! Store configuration, loaded from the environment with sensible defaults.

use crate::error::{Error, Result};
use crate::wal::DEFAULT_SEGMENT_SIZE;
use serde::Serialize;
use std::path::PathBuf;

const DATA_DIR_VAR: &str = "DOCVAULT_DATA_DIR";
const SEGMENT_SIZE_VAR: &str = "DOCVAULT_WAL_SEGMENT_SIZE";
const SYNC_WRITES_VAR: &str = "DOCVAULT_SYNC_WRITES";
const NAMESPACE_VAR: &str = "DOCVAULT_NAMESPACE";

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Root directory for persistent state. The WAL lives under `wal/`.
    pub data_dir: PathBuf,
    /// Segment size in bytes after which the WAL rotates.
    pub wal_segment_size: u64,
    /// Whether every commit is synced to disk before it becomes visible.
    pub sync_writes: bool,
    /// Namespace used when none is given explicitly.
    pub namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            wal_segment_size: DEFAULT_SEGMENT_SIZE,
            sync_writes: true,
            namespace: "default".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let wal_segment_size = match std::env::var(SEGMENT_SIZE_VAR) {
            Ok(v) => v
                .parse()
                .map_err(|_| Error::Invalid(format!("{} must be a byte count", SEGMENT_SIZE_VAR)))?,
            Err(_) => defaults.wal_segment_size,
        };
        let sync_writes = match std::env::var(SYNC_WRITES_VAR) {
            Ok(v) => parse_bool(&v)
                .ok_or_else(|| Error::Invalid(format!("{} must be true or false", SYNC_WRITES_VAR)))?,
            Err(_) => defaults.sync_writes,
        };
        Ok(Self {
            data_dir: std::env::var(DATA_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            wal_segment_size,
            sync_writes,
            namespace: std::env::var(NAMESPACE_VAR).unwrap_or(defaults.namespace),
        })
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn wal_dir(&self) -> PathBuf {
        self.data_dir.join("wal")
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
