// 🗺️ Crosswalk Table - ZIP → majority CBSA mapping
//
// HUD's ZIP-CBSA crosswalk file is many-to-many: a ZIP split across metro
// areas appears once per metro, each row carrying the fraction of the ZIP's
// addresses that fall inside that metro (TOT_RATIO). The resolver only
// wants ONE answer per ZIP, so this table keeps the majority owner and
// drops everything else.
//
// Rule: an entry is retained only when its ratio strictly exceeds the
// threshold (default 0.5). A ZIP with no majority metro has NO entry and
// cannot fall back to FMR - better no answer than a coin-flip metro.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default minimum allocation ratio for a crosswalk entry to count as a
/// majority. Strict comparison: exactly 0.5 is not a majority.
pub const DEFAULT_RATIO_THRESHOLD: f64 = 0.5;

// ============================================================================
// CROSSWALK ENTRY
// ============================================================================

/// The chosen metro-area mapping for one ZIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    /// Normalized 5-digit ZIP.
    pub zip: String,

    /// CBSA code of the metro area holding the majority of this ZIP.
    pub cbsa: String,

    /// Fraction in (0, 1] of this ZIP covered by the metro area.
    pub allocation_ratio: f64,
}

// ============================================================================
// CROSSWALK TABLE
// ============================================================================

/// ZIP → CBSA lookup over majority-owner entries only.
#[derive(Debug, Clone)]
pub struct CrosswalkTable {
    threshold: f64,
    entries: HashMap<String, CrosswalkEntry>,
}

impl CrosswalkTable {
    /// Create an empty table with the default 0.5 majority threshold.
    pub fn new() -> Self {
        CrosswalkTable::with_threshold(DEFAULT_RATIO_THRESHOLD)
    }

    /// Create an empty table with a custom majority threshold.
    pub fn with_threshold(threshold: f64) -> Self {
        CrosswalkTable {
            threshold,
            entries: HashMap::new(),
        }
    }

    /// The minimum ratio an entry must strictly exceed to be retained.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Offer a candidate row for a ZIP.
    ///
    /// Retained only if the ratio strictly exceeds the threshold AND beats
    /// any entry already held for that ZIP. Clean data has at most one
    /// majority row per ZIP; two rows both above 0.5 would be a source
    /// anomaly, and the larger ratio wins rather than crashing.
    pub fn offer(&mut self, entry: CrosswalkEntry) {
        if entry.allocation_ratio <= self.threshold {
            return;
        }

        let beaten = self
            .entries
            .get(&entry.zip)
            .map_or(true, |existing| existing.allocation_ratio < entry.allocation_ratio);
        if beaten {
            self.entries.insert(entry.zip.clone(), entry);
        }
    }

    /// CBSA code for a ZIP, or `None` when no metro holds a majority.
    pub fn resolve(&self, zip: &str) -> Option<&str> {
        self.entries.get(zip).map(|e| e.cbsa.as_str())
    }

    /// Full entry for a ZIP (ratio included), if present.
    pub fn get(&self, zip: &str) -> Option<&CrosswalkEntry> {
        self.entries.get(zip)
    }

    /// Number of ZIPs with a majority mapping.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no ZIP has a majority mapping.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CrosswalkTable {
    fn default() -> Self {
        CrosswalkTable::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
