// In-Memory Benchmark Stores
//
// Each store is:
// - Built once during ingestion, immutable afterwards
// - Exact-match lookup only (no fuzzy matching, no prefixes)
// - Owned by the dataset that queries serve against

pub mod crosswalk;
pub mod rent_table;

pub use crosswalk::{CrosswalkEntry, CrosswalkTable, DEFAULT_RATIO_THRESHOLD};
pub use rent_table::{RentRecord, RentTable, BEDROOM_SLOTS, MAX_BEDROOMS};

/// Normalize a ZIP code to its canonical 5-digit form.
///
/// HUD exports and caller input both drop leading zeros ("501" for the
/// Holtsville ZIP 00501), so every ZIP is trimmed and left-padded before
/// any table is keyed or queried. Strings already 5+ characters pass
/// through verbatim.
pub fn normalize_zip(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 5 {
        return trimmed.to_string();
    }
    format!("{:0>5}", trimmed)
}
