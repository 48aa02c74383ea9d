// 🏠 Rent Table - HUD rent benchmarks keyed by geography
//
// One table instance holds either SAFMR rows (keyed by 5-digit ZIP) or FMR
// rows (keyed by CBSA code). The key space differs, the shape doesn't, so
// both sources share this type.
//
// Problem solved:
// - "ZIP CODE" values arrive as "501", "00501", 501 → normalized before insert
// - "$1,234" currency text → parsed upstream, stored as plain f64
// - A bedroom column absent from the source row stays ABSENT (None),
//   never an implicit $0 - a $0 benchmark would be indistinguishable
//   from "no data" for callers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bedroom sizes run 0BR..=4BR in every HUD table we ingest.
pub const MAX_BEDROOMS: u8 = 4;

/// Number of bedroom slots per record (0BR through 4BR).
pub const BEDROOM_SLOTS: usize = (MAX_BEDROOMS as usize) + 1;

// ============================================================================
// RENT RECORD
// ============================================================================

/// Rent benchmarks for one geographic key (a ZIP or a CBSA code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentRecord {
    /// Normalized key: zero-padded 5-digit ZIP, or verbatim CBSA code.
    pub key: String,

    /// Monthly rent per bedroom count, index 0 = studio (0BR).
    /// `None` = the source row had no usable figure for that size.
    pub rents: [Option<f64>; BEDROOM_SLOTS],
}

impl RentRecord {
    /// Create an empty record for a key (all bedroom slots absent).
    pub fn new(key: impl Into<String>) -> Self {
        RentRecord {
            key: key.into(),
            rents: [None; BEDROOM_SLOTS],
        }
    }

    /// Set the rent for a bedroom count. Out-of-range sizes are ignored.
    pub fn set_rent(&mut self, bedrooms: u8, amount: f64) {
        if bedrooms <= MAX_BEDROOMS {
            self.rents[bedrooms as usize] = Some(amount);
        }
    }

    /// Rent for a bedroom count, or `None` if that size is absent.
    pub fn rent(&self, bedrooms: u8) -> Option<f64> {
        if bedrooms > MAX_BEDROOMS {
            return None;
        }
        self.rents[bedrooms as usize]
    }

    /// True if at least one bedroom slot carries a figure.
    pub fn has_any_rent(&self) -> bool {
        self.rents.iter().any(|r| r.is_some())
    }
}

// ============================================================================
// RENT TABLE
// ============================================================================

/// In-memory rent benchmark table: exact-match lookup, no fuzzy matching.
///
/// Built once during ingestion, then read-only. Duplicate keys fold
/// last-write-wins - HUD exports occasionally repeat a row (header
/// artifacts, revised figures appended at the bottom) and the later row
/// is the one to trust.
#[derive(Debug, Clone, Default)]
pub struct RentTable {
    records: HashMap<String, RentRecord>,
}

impl RentTable {
    /// Create an empty table.
    pub fn new() -> Self {
        RentTable {
            records: HashMap::new(),
        }
    }

    /// Insert a record, replacing any earlier record with the same key.
    pub fn insert(&mut self, record: RentRecord) {
        self.records.insert(record.key.clone(), record);
    }

    /// Full record for a key, if present.
    pub fn get(&self, key: &str) -> Option<&RentRecord> {
        self.records.get(key)
    }

    /// Rent for a key + bedroom count. Absent key or absent bedroom slot
    /// both yield `None`; the caller distinguishes them via `get`.
    pub fn rent(&self, key: &str, bedrooms: u8) -> Option<f64> {
        self.records.get(key).and_then(|r| r.rent(bedrooms))
    }

    /// Number of records in the table.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_rents(key: &str, rents: &[(u8, f64)]) -> RentRecord {
        let mut record = RentRecord::new(key);
        for &(bedrooms, amount) in rents {
            record.set_rent(bedrooms, amount);
        }
        record
    }

    #[test]
    fn test_empty_record_has_no_rents() {
        let record = RentRecord::new("90210");
        assert!(!record.has_any_rent());
        for bedrooms in 0..=MAX_BEDROOMS {
            assert_eq!(record.rent(bedrooms), None);
        }
    }

    #[test]
    fn test_zero_bedrooms_is_a_real_slot() {
        let record = record_with_rents("90210", &[(0, 1950.0)]);
        assert_eq!(record.rent(0), Some(1950.0));
        assert_eq!(record.rent(1), None);
    }

    #[test]
    fn test_out_of_range_bedrooms_ignored() {
        let mut record = RentRecord::new("90210");
        record.set_rent(9, 5000.0);
        assert!(!record.has_any_rent());
        assert_eq!(record.rent(9), None);
    }

    #[test]
    fn test_lookup_is_exact_match_only() {
        let mut table = RentTable::new();
        table.insert(record_with_rents("02901", &[(2, 2050.0)]));

        assert_eq!(table.rent("02901", 2), Some(2050.0));
        // Unpadded variant is a different string - no prefix/fuzzy matching
        assert_eq!(table.rent("2901", 2), None);
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let mut table = RentTable::new();
        table.insert(record_with_rents("60629", &[(1, 1320.0)]));
        table.insert(record_with_rents("60629", &[(1, 1350.0)]));

        assert_eq!(table.len(), 1);
        assert_eq!(table.rent("60629", 1), Some(1350.0));
    }

    #[test]
    fn test_absent_bedroom_distinct_from_absent_key() {
        let mut table = RentTable::new();
        table.insert(record_with_rents("77005", &[(2, 2080.0)]));

        // Key exists but 4BR slot is absent
        assert!(table.get("77005").is_some());
        assert_eq!(table.rent("77005", 4), None);

        // Key absent entirely
        assert!(table.get("99999").is_none());
        assert_eq!(table.rent("99999", 2), None);
    }
}
