// Address Sorter - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod record;
pub mod format;
pub mod grouper;
pub mod engine;
pub mod aggregator;
pub mod ingest;
pub mod export;
pub mod db;

// Re-export commonly used types
pub use record::{AddressRecord, BuildingCategory, NO_SUBNAME};
pub use format::{classify_unit, detect_anomaly, UnitAnomaly, UnitFormat};
pub use grouper::{group_candidates, CommunityGroup};
pub use engine::{process_community, CommunityDecision, FlagEntry, SorterConfig};
pub use aggregator::{sort_addresses, CategoryCount, CategoryResult, RoeEntry, RoeRow};
pub use ingest::{load_csv, load_records, load_xlsx, REQUIRED_COLUMNS};
pub use export::write_workbook;
pub use db::{
    file_fingerprint, get_flagged_for_community, get_flagged_for_run, get_run, get_runs,
    insert_run, setup_database, FlaggedRow, RunSummary,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
