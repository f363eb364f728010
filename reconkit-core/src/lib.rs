//! reconkit core - two-source tabular reconciliation
//!
//! This crate implements the reconciliation pipeline following hexagonal architecture:
//!
//! - **domain**: Datasets, schemas, outcomes and error types
//! - **ports**: Trait definitions for external dependencies (TableSource)
//! - **services**: Normalizer, loader, planner, engine, export and event log
//! - **adapters**: Concrete TableSource implementations (CSV files, memory)
//! - **config**: settings.json defaults and saved profiles
//!
//! Data flows loader → normalizer → planner → engine → result set → export.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use config::Config;

// Re-export commonly used types at crate root
pub use adapters::{CsvFileSource, MemorySource};
pub use domain::result::{ConfigError, Error, LoadError, ParseError};
pub use domain::{
    AmountTotal, Category, Cell, Dataset, MatchOutcome, MissingReason, ReconSummary, ReconciliationResult,
    ResultTable, SideSchema,
};
pub use ports::TableSource;
pub use services::{
    CancellationToken, DateOrder, EntryPoint, LoadOptions, LogEvent, LoggingService,
    NumberFormat, ReconEngine, ReconRequest, ToleranceConfig,
};

/// Main context for reconkit operations
///
/// Holds the reconkit directory and the configuration loaded from it.
pub struct ReconContext {
    pub config: Config,
    reconkit_dir: PathBuf,
}

impl ReconContext {
    /// Load configuration from the reconkit directory, creating the directory if needed
    pub fn new(reconkit_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(reconkit_dir)
            .with_context(|| format!("Failed to create reconkit directory: {}", reconkit_dir.display()))?;
        let config = Config::load(reconkit_dir)?;
        Ok(Self {
            config,
            reconkit_dir: reconkit_dir.to_path_buf(),
        })
    }

    pub fn reconkit_dir(&self) -> &Path {
        &self.reconkit_dir
    }

    /// Persist profile and default changes
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.reconkit_dir)
    }

    /// Event log stored alongside the settings
    pub fn logging_service(&self, entry_point: EntryPoint, app_version: &str) -> Result<LoggingService> {
        LoggingService::new(&self.reconkit_dir, entry_point, app_version)
    }
}
