//! Runtime configuration for one core instance.
//!
//! # Invariants
//! - A normalized config has a supported log level, an absolute log
//!   directory (when set), `1..=16` workers and plain file names.

use crate::document::PROJECT_DOCUMENT_NAME;
use crate::logging::{self, normalize_level, normalize_log_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STORE_FILE_NAME: &str = "dgpdata.sqlite3";
pub const DEFAULT_WORKERS: usize = 2;
pub const MAX_WORKERS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub workers: usize,
    pub document_name: String,
    pub store_name: String,
    /// Save the project document after every successful mutation.
    pub autosave: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: logging::default_log_level().to_string(),
            log_dir: None,
            workers: DEFAULT_WORKERS,
            document_name: PROJECT_DOCUMENT_NAME.to_string(),
            store_name: STORE_FILE_NAME.to_string(),
            autosave: true,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON config; absent members take their defaults.
    pub fn from_json(text: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(text).map_err(|err| format!("invalid config json: {err}"))?;
        config.normalized()
    }

    /// Reads a JSON config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("failed to read config `{}`: {err}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn without_autosave(mut self) -> Self {
        self.autosave = false;
        self
    }

    /// Validates every member and clamps the worker count.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.log_level = normalize_level(&self.log_level)?.to_string();
        if let Some(dir) = &self.log_dir {
            self.log_dir = Some(normalize_log_dir(&dir.to_string_lossy())?);
        }
        self.workers = self.workers.clamp(1, MAX_WORKERS);
        self.document_name = normalize_file_name("document_name", &self.document_name)?;
        self.store_name = normalize_file_name("store_name", &self.store_name)?;
        if self.document_name == self.store_name {
            return Err("document_name and store_name must differ".to_string());
        }
        Ok(self)
    }

    /// Starts logging when a log directory is configured.
    pub fn init_logging(&self) -> Result<(), String> {
        match &self.log_dir {
            Some(dir) => logging::init_logging(&self.log_level, &dir.to_string_lossy()),
            None => Ok(()),
        }
    }
}

fn normalize_file_name(field: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        return Err(format!("{field} must be a plain file name, got `{trimmed}`"));
    }
    Ok(trimmed.to_string())
}
