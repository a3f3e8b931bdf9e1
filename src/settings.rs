use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Runtime settings: built-in defaults, then an optional `coc_parser.toml`,
/// then `COC_*` environment variables. CLI flags are applied on top by the
/// binary.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: PathBuf,
    /// Worker threads for `batch`; 0 lets rayon decide.
    pub jobs: usize,
    /// Documents per parallel chunk between database commits.
    pub chunk_size: usize,
    /// Spec file replacing the built-in registry.
    #[serde(default)]
    pub specs: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("database", "data/coc.sqlite")?
            .set_default("jobs", 0i64)?
            .set_default("chunk_size", 64i64)?
            .add_source(File::with_name("coc_parser").required(false))
            .add_source(Environment::with_prefix("COC"))
            .build()
            .context("Failed to read settings")?;
        settings
            .try_deserialize()
            .context("Invalid settings")
    }
}
