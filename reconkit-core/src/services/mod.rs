//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one stage of the pipeline: normalize, load, plan, match, export.

pub mod engine;
pub mod export;
pub mod load;
pub mod logging;
pub mod normalize;
pub mod planner;
pub mod reconcile;

pub use engine::{CancellationToken, ReconEngine, ReconHandle, ToleranceConfig, ENGINE_VERSION};
pub use export::{combined_table, export_all, export_combined, export_table, write_table, ExportedFile};
pub use load::{column_total, load, preview, LoadOptions, DEFAULT_PREVIEW_ROWS};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use normalize::{normalize_amount, normalize_date, normalize_key, AmountOptions, DateOrder, NumberFormat};
pub use planner::{build_index, Bucket, KeyIndex};
pub use reconcile::{reconcile, reconcile_with_cancellation, ReconRequest};
