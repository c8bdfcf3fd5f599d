use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_SOURCE_URL: &str = "https://www.fdic.gov/bank-failures/download-data.csv";
const DEFAULT_DB_PATH: &str = "fdic_failed_banks.db";
const DEFAULT_TEMPLATES_DIR: &str = "templates";
const DEFAULT_OUTPUT_DIR: &str = "docs";
const DEFAULT_CONFIG_FILE: &str = "failed_banks";

/// Per-run configuration, handed to each stage explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub source_url: String,
    pub db_path: PathBuf,
    #[serde(default)]
    pub archive_path: Option<PathBuf>,
    pub templates_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Settings {
    /// Defaults, then `failed_banks.toml` (or `file`), then `FDIC_*` env vars.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file_source = match file {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        config::Config::builder()
            .set_default("source_url", DEFAULT_SOURCE_URL)?
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("templates_dir", DEFAULT_TEMPLATES_DIR)?
            .set_default("output_dir", DEFAULT_OUTPUT_DIR)?
            .add_source(file_source)
            .add_source(config::Environment::with_prefix("FDIC"))
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    /// Gzip artifact path; `<db_path>.gz` unless set explicitly.
    pub fn archive_path(&self) -> PathBuf {
        match &self.archive_path {
            Some(p) => p.clone(),
            None => {
                let mut s = self.db_path.clone().into_os_string();
                s.push(".gz");
                PathBuf::from(s)
            }
        }
    }
}
