// ⚖️ Benchmark Resolver - ZIP + bedrooms → rent with provenance
//
// The decision order is strict, and each step only runs when the prior
// step came up absent:
//   1. Validate input (bedrooms 0 is VALID - distinct from missing)
//   2. SAFMR by ZIP - most granular source, always preferred
//   3. Crosswalk ZIP → majority CBSA
//   4. FMR by CBSA - coarser fallback, result discloses which CBSA paid
//
// Every negative outcome is its own variant so the HTTP layer can report
// something actionable instead of a generic 404. Nothing here retries:
// all lookups are in-memory and deterministic, so "not found" is a
// terminal answer, never a transient one.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::ingest::{
    load_crosswalk, load_rent_table, CrosswalkColumnMapping, IngestReport, RentColumnMapping,
};
use crate::stores::{
    normalize_zip, CrosswalkTable, RentTable, DEFAULT_RATIO_THRESHOLD, MAX_BEDROOMS,
};

/// Standard file names inside a benchmark data directory.
pub const SAFMR_FILE: &str = "safmr.csv";
pub const FMR_FILE: &str = "fmr.csv";
pub const CROSSWALK_FILE: &str = "zip_cbsa_crosswalk.csv";

// ============================================================================
// RESOLUTION OUTCOME
// ============================================================================

/// Which table satisfied a rent query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentSource {
    /// Small Area FMR - ZIP-granular, the preferred source.
    #[serde(rename = "SAFMR")]
    Safmr,

    /// Metro-level FMR reached through the crosswalk fallback.
    #[serde(rename = "FMR")]
    Fmr,
}

impl RentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentSource::Safmr => "SAFMR",
            RentSource::Fmr => "FMR",
        }
    }
}

/// A successful resolution: the benchmark rent plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentQuote {
    pub source: RentSource,
    pub zip: String,
    pub bedrooms: u8,
    pub rent: f64,

    /// Present only on FMR-sourced results: the metro area whose rate
    /// was used, so callers can see the answer is ZIP-adjacent, not
    /// ZIP-exact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbsa: Option<String>,
}

/// A failed resolution. Serializes as `{ "error": "<kind>", ... }`,
/// which is exactly the wire shape the HTTP layer returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "error")]
pub enum ResolveError {
    /// Malformed caller input - a caller bug, not a data gap.
    InvalidRequest {
        zip: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        bedrooms: Option<u8>,
        detail: String,
    },

    /// ZIP known to neither table, or no metro holds a majority of it.
    NoCrosswalkMapping { zip: String, bedrooms: u8 },

    /// The crosswalk named a CBSA the FMR table has never heard of.
    NoFmrForCbsa {
        zip: String,
        bedrooms: u8,
        cbsa: String,
    },

    /// The CBSA exists in FMR but lacks the requested bedroom size.
    BedroomColumnMissing {
        zip: String,
        bedrooms: u8,
        cbsa: String,
    },
}

impl ResolveError {
    /// Variant name, matching the serialized `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::InvalidRequest { .. } => "InvalidRequest",
            ResolveError::NoCrosswalkMapping { .. } => "NoCrosswalkMapping",
            ResolveError::NoFmrForCbsa { .. } => "NoFmrForCbsa",
            ResolveError::BedroomColumnMissing { .. } => "BedroomColumnMissing",
        }
    }

    /// True for caller bugs (HTTP 400); false for legitimate
    /// data-not-available outcomes (HTTP 404).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ResolveError::InvalidRequest { .. })
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::InvalidRequest { detail, .. } => {
                write!(f, "invalid request: {detail}")
            }
            ResolveError::NoCrosswalkMapping { zip, .. } => {
                write!(f, "no majority CBSA mapping for ZIP {zip}")
            }
            ResolveError::NoFmrForCbsa { cbsa, zip, .. } => {
                write!(f, "CBSA {cbsa} (via ZIP {zip}) not present in the FMR table")
            }
            ResolveError::BedroomColumnMissing { cbsa, bedrooms, .. } => {
                write!(f, "CBSA {cbsa} has no {bedrooms}BR figure")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

// ============================================================================
// BENCHMARK DATASET
// ============================================================================

/// The three stores the resolver reads, built once and never mutated.
///
/// Queries share one instance behind an `Arc` - immutable after
/// construction, so concurrent readers need no locking. A data refresh is
/// a full rebuild of a NEW dataset followed by swapping the `Arc`, so
/// in-flight queries never observe a half-populated table.
pub struct BenchmarkDataset {
    safmr: RentTable,
    fmr: RentTable,
    crosswalk: CrosswalkTable,
    loaded_at: DateTime<Utc>,
    reports: Vec<IngestReport>,
}

/// Row counts + provenance for the health/stats surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub safmr_records: usize,
    pub fmr_records: usize,
    pub crosswalk_entries: usize,
    pub loaded_at: DateTime<Utc>,
    pub ingest_reports: Vec<IngestReport>,
}

impl BenchmarkDataset {
    /// Assemble a dataset from pre-built stores.
    pub fn new(safmr: RentTable, fmr: RentTable, crosswalk: CrosswalkTable) -> Self {
        BenchmarkDataset {
            safmr,
            fmr,
            crosswalk,
            loaded_at: Utc::now(),
            reports: Vec::new(),
        }
    }

    /// Load the three standard files from a data directory.
    ///
    /// Fatal on any unopenable file, and fatal when BOTH rent tables come
    /// up empty - serving an empty dataset as if it were authoritative
    /// would turn every query into a plausible-looking "not found".
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let (safmr, safmr_report) =
            load_rent_table(&dir.join(SAFMR_FILE), &RentColumnMapping::safmr())?;
        let (fmr, fmr_report) = load_rent_table(&dir.join(FMR_FILE), &RentColumnMapping::fmr())?;
        let (crosswalk, crosswalk_report) = load_crosswalk(
            &dir.join(CROSSWALK_FILE),
            &CrosswalkColumnMapping::hud(),
            DEFAULT_RATIO_THRESHOLD,
        )?;

        if safmr.is_empty() && fmr.is_empty() {
            bail!(
                "No rent benchmarks loaded from {} - refusing to serve an empty dataset",
                dir.display()
            );
        }

        let mut dataset = BenchmarkDataset::new(safmr, fmr, crosswalk);
        dataset.reports = vec![safmr_report, fmr_report, crosswalk_report];
        Ok(dataset)
    }

    /// Row counts and ingest counters for the operator surfaces.
    pub fn stats(&self) -> DatasetStats {
        DatasetStats {
            safmr_records: self.safmr.len(),
            fmr_records: self.fmr.len(),
            crosswalk_entries: self.crosswalk.len(),
            loaded_at: self.loaded_at,
            ingest_reports: self.reports.clone(),
        }
    }

    /// Resolve a rent benchmark for a ZIP + bedroom count.
    ///
    /// `bedrooms` is an `Option` on purpose: callers that parsed a query
    /// string must be able to say "the field was absent" (`None`,
    /// rejected) as opposed to "the field was 0" (valid studio lookup).
    pub fn resolve(&self, zip: &str, bedrooms: Option<u8>) -> Result<RentQuote, ResolveError> {
        // Validate before padding: an empty string would otherwise
        // normalize into the very real-looking ZIP "00000"
        let trimmed = zip.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::InvalidRequest {
                zip: String::new(),
                bedrooms,
                detail: "zip must be a non-empty string".to_string(),
            });
        }
        let zip = normalize_zip(trimmed);

        let bedrooms = match bedrooms {
            None => {
                return Err(ResolveError::InvalidRequest {
                    zip,
                    bedrooms: None,
                    detail: "bedrooms is required (0 is a valid value)".to_string(),
                })
            }
            Some(bedrooms) if bedrooms > MAX_BEDROOMS => {
                return Err(ResolveError::InvalidRequest {
                    zip,
                    bedrooms: Some(bedrooms),
                    detail: format!("bedrooms must be between 0 and {MAX_BEDROOMS}"),
                })
            }
            Some(bedrooms) => bedrooms,
        };

        // 1. SAFMR by ZIP - FMR must never override an existing SAFMR value
        if let Some(rent) = self.safmr.rent(&zip, bedrooms) {
            return Ok(RentQuote {
                source: RentSource::Safmr,
                zip,
                bedrooms,
                rent,
                cbsa: None,
            });
        }

        // 2. Crosswalk to the majority CBSA
        let Some(cbsa) = self.crosswalk.resolve(&zip) else {
            return Err(ResolveError::NoCrosswalkMapping { zip, bedrooms });
        };

        // 3. FMR by CBSA - distinguish "metro unknown" from "metro known
        //    but this bedroom size missing"
        let Some(record) = self.fmr.get(cbsa) else {
            return Err(ResolveError::NoFmrForCbsa {
                zip,
                bedrooms,
                cbsa: cbsa.to_string(),
            });
        };

        match record.rent(bedrooms) {
            Some(rent) => Ok(RentQuote {
                source: RentSource::Fmr,
                zip,
                bedrooms,
                rent,
                cbsa: Some(cbsa.to_string()),
            }),
            None => Err(ResolveError::BedroomColumnMissing {
                zip,
                bedrooms,
                cbsa: cbsa.to_string(),
            }),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{CrosswalkEntry, RentRecord};
    use std::sync::Arc;

    /// Small hand-built dataset:
    /// - 90210 in SAFMR (and deliberately ALSO reachable via crosswalk)
    /// - 90660 only in crosswalk → FMR 31080
    /// - 19104 crosswalks to a CBSA absent from FMR
    /// - 02860 crosswalks to 39300, which lacks a 0BR figure
    fn build_dataset() -> BenchmarkDataset {
        let mut safmr = RentTable::new();
        let mut record = RentRecord::new("90210");
        record.set_rent(0, 2350.0);
        record.set_rent(2, 3380.0);
        safmr.insert(record);

        let mut fmr = RentTable::new();
        let mut la = RentRecord::new("31080");
        la.set_rent(0, 1790.0);
        la.set_rent(1, 2030.0);
        la.set_rent(2, 2570.0);
        fmr.insert(la);
        let mut providence = RentRecord::new("39300");
        providence.set_rent(1, 1480.0);
        providence.set_rent(2, 1790.0);
        fmr.insert(providence);

        let mut crosswalk = CrosswalkTable::new();
        for (zip, cbsa, ratio) in [
            ("90210", "31080", 0.98),
            ("90660", "31080", 0.9731),
            ("19104", "37980", 0.84),
            ("02860", "39300", 0.95),
            ("02860", "14460", 0.04),
        ] {
            crosswalk.offer(CrosswalkEntry {
                zip: zip.to_string(),
                cbsa: cbsa.to_string(),
                allocation_ratio: ratio,
            });
        }

        BenchmarkDataset::new(safmr, fmr, crosswalk)
    }

    #[test]
    fn test_safmr_hit_wins_over_fmr() {
        // 90210 is in BOTH paths; the ZIP-granular value must win
        let dataset = build_dataset();
        let quote = dataset.resolve("90210", Some(2)).unwrap();

        assert_eq!(quote.source, RentSource::Safmr);
        assert_eq!(quote.rent, 3380.0);
        assert_eq!(quote.cbsa, None);
    }

    #[test]
    fn test_fmr_fallback_for_uncovered_zip() {
        let dataset = build_dataset();
        let quote = dataset.resolve("90660", Some(1)).unwrap();

        assert_eq!(quote.source, RentSource::Fmr);
        assert_eq!(quote.rent, 2030.0);
        assert_eq!(quote.cbsa.as_deref(), Some("31080"));
    }

    #[test]
    fn test_fmr_fallback_for_missing_bedroom_size() {
        // 90210 has SAFMR 0BR and 2BR but no 1BR: the per-size gap falls
        // through to the metro figure
        let dataset = build_dataset();
        let quote = dataset.resolve("90210", Some(1)).unwrap();

        assert_eq!(quote.source, RentSource::Fmr);
        assert_eq!(quote.rent, 2030.0);
    }

    #[test]
    fn test_unknown_zip_is_no_crosswalk_mapping() {
        let dataset = build_dataset();
        let err = dataset.resolve("00501", Some(2)).unwrap_err();

        assert_eq!(
            err,
            ResolveError::NoCrosswalkMapping {
                zip: "00501".to_string(),
                bedrooms: 2,
            }
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_crosswalk_to_unknown_cbsa() {
        let dataset = build_dataset();
        let err = dataset.resolve("19104", Some(2)).unwrap_err();

        assert_eq!(err.kind(), "NoFmrForCbsa");
        match err {
            ResolveError::NoFmrForCbsa { cbsa, .. } => assert_eq!(cbsa, "37980"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_cbsa_present_but_bedroom_size_missing() {
        let dataset = build_dataset();
        let err = dataset.resolve("02860", Some(0)).unwrap_err();

        assert_eq!(err.kind(), "BedroomColumnMissing");
        match err {
            ResolveError::BedroomColumnMissing { cbsa, bedrooms, .. } => {
                assert_eq!(cbsa, "39300");
                assert_eq!(bedrooms, 0);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_zero_bedrooms_is_valid() {
        let dataset = build_dataset();
        let quote = dataset.resolve("90210", Some(0)).unwrap();

        assert_eq!(quote.source, RentSource::Safmr);
        assert_eq!(quote.rent, 2350.0);
    }

    #[test]
    fn test_missing_bedrooms_is_invalid_request() {
        let dataset = build_dataset();
        let err = dataset.resolve("90210", None).unwrap_err();

        assert_eq!(err.kind(), "InvalidRequest");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_out_of_range_bedrooms_is_invalid_request() {
        let dataset = build_dataset();
        let err = dataset.resolve("90210", Some(5)).unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
    }

    #[test]
    fn test_empty_zip_is_invalid_request() {
        let dataset = build_dataset();
        let err = dataset.resolve("   ", Some(2)).unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
    }

    #[test]
    fn test_short_zip_is_normalized_before_lookup() {
        let dataset = build_dataset();
        // "2860" pads to "02860" and reaches the Providence FMR row
        let quote = dataset.resolve("2860", Some(2)).unwrap();

        assert_eq!(quote.zip, "02860");
        assert_eq!(quote.source, RentSource::Fmr);
        assert_eq!(quote.rent, 1790.0);
    }

    #[test]
    fn test_error_wire_shape() {
        let dataset = build_dataset();
        let err = dataset.resolve("00501", Some(2)).unwrap_err();
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["error"], "NoCrosswalkMapping");
        assert_eq!(json["zip"], "00501");
        assert_eq!(json["bedrooms"], 2);
    }

    #[test]
    fn test_quote_wire_shape_omits_cbsa_for_safmr() {
        let dataset = build_dataset();

        let safmr_json =
            serde_json::to_value(dataset.resolve("90210", Some(2)).unwrap()).unwrap();
        assert_eq!(safmr_json["source"], "SAFMR");
        assert!(safmr_json.get("cbsa").is_none());

        let fmr_json = serde_json::to_value(dataset.resolve("90660", Some(1)).unwrap()).unwrap();
        assert_eq!(fmr_json["source"], "FMR");
        assert_eq!(fmr_json["cbsa"], "31080");
    }

    #[test]
    fn test_fixture_dataset_loads_end_to_end() {
        let dataset = BenchmarkDataset::load_from_dir(Path::new("testdata")).unwrap();
        let stats = dataset.stats();

        assert_eq!(stats.safmr_records, 4);
        assert_eq!(stats.fmr_records, 5);
        assert_eq!(stats.crosswalk_entries, 6);
        assert_eq!(stats.ingest_reports.len(), 3);

        // SAFMR-covered ZIP with an absent 3BR cell falls through to FMR
        let quote = dataset.resolve("60629", Some(3)).unwrap();
        assert_eq!(quote.source, RentSource::Fmr);
        assert_eq!(quote.rent, 2040.0);
        assert_eq!(quote.cbsa.as_deref(), Some("16980"));
    }

    #[test]
    fn test_concurrent_resolves_match_serial_answers() {
        let dataset = Arc::new(build_dataset());

        let cases: Vec<(&str, Option<u8>)> = vec![
            ("90210", Some(2)),
            ("90660", Some(1)),
            ("00501", Some(2)),
            ("02860", Some(0)),
            ("19104", Some(4)),
        ];
        let expected: Vec<_> = cases
            .iter()
            .map(|(zip, bedrooms)| dataset.resolve(zip, *bedrooms))
            .collect();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let dataset = Arc::clone(&dataset);
            let cases = cases.clone();
            handles.push(std::thread::spawn(move || {
                (0..250)
                    .flat_map(|_| {
                        cases
                            .iter()
                            .map(|(zip, bedrooms)| dataset.resolve(zip, *bedrooms))
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            }));
        }

        for handle in handles {
            for chunk in handle.join().unwrap().chunks(cases.len()) {
                assert_eq!(chunk, expected.as_slice());
            }
        }
    }
}
