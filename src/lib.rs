// Rentbench - HUD Rent Benchmark Resolver - Core Library
// Exposes all modules for use in the CLI, the API server, and tests
//
// Pipeline: CSV ingestion → immutable in-memory stores → resolver.
// Ingestion runs once at startup; after that the dataset is read-only
// and any number of concurrent queries proceed without locking.

pub mod ingest;
pub mod resolver;
pub mod stores;

// Re-export commonly used types
pub use ingest::{
    load_crosswalk, load_rent_table, parse_money, CrosswalkColumnMapping, IngestReport,
    RentColumnMapping,
};
pub use resolver::{
    BenchmarkDataset, DatasetStats, RentQuote, RentSource, ResolveError, CROSSWALK_FILE, FMR_FILE,
    SAFMR_FILE,
};
pub use stores::{
    normalize_zip, CrosswalkEntry, CrosswalkTable, RentRecord, RentTable,
    DEFAULT_RATIO_THRESHOLD, MAX_BEDROOMS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
