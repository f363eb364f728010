//! One-call reconciliation: validate, load both sides, run the engine

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::domain::{ReconciliationResult, SideSchema};
use crate::ports::TableSource;
use crate::services::engine::{CancellationToken, ReconEngine, ToleranceConfig};
use crate::services::load::{load, LoadOptions};

/// Everything needed to reconcile two sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconRequest {
    pub side_a: SideSchema,
    pub side_b: SideSchema,
    #[serde(default)]
    pub options_a: LoadOptions,
    #[serde(default)]
    pub options_b: LoadOptions,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl ReconRequest {
    pub fn new(side_a: SideSchema, side_b: SideSchema) -> Self {
        Self {
            side_a,
            side_b,
            options_a: LoadOptions::default(),
            options_b: LoadOptions::default(),
            tolerance: ToleranceConfig::exact(),
            workers: 1,
        }
    }

    /// Same load options on both sides
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options_a = options.clone();
        self.options_b = options;
        self
    }

    pub fn with_tolerance(mut self, tolerance: ToleranceConfig) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn engine(&self) -> ReconEngine {
        ReconEngine::new(self.tolerance).with_workers(self.workers)
    }
}

/// Validate the request, load both sources and reconcile them.
///
/// Configuration and load errors are returned before any matching begins.
pub fn reconcile(
    source_a: &dyn TableSource,
    source_b: &dyn TableSource,
    request: &ReconRequest,
) -> Result<ReconciliationResult> {
    reconcile_with_cancellation(source_a, source_b, request, CancellationToken::new())
}

pub fn reconcile_with_cancellation(
    source_a: &dyn TableSource,
    source_b: &dyn TableSource,
    request: &ReconRequest,
    token: CancellationToken,
) -> Result<ReconciliationResult> {
    request.side_a.validate()?;
    request.side_b.validate()?;

    let a = load(source_a, &request.side_a, &request.options_a)?;
    let b = load(source_b, &request.side_b, &request.options_b)?;

    request
        .engine()
        .with_cancellation(token)
        .run(Arc::new(a), Arc::new(b))
}
