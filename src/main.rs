// Rentbench CLI - load the HUD tables, answer one query or print stats
//
// Usage:
//   rentbench query <ZIP> <BEDROOMS> [DATA_DIR]
//   rentbench stats [DATA_DIR]
//
// Exit codes: 0 = resolved, 1 = resolution error / bad usage,
// 2 = ingestion failure (tables could not be built).

use std::env;
use std::path::{Path, PathBuf};

use rentbench::BenchmarkDataset;

fn main() {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("query") if args.len() >= 4 => {
            let zip = args[2].clone();
            let bedrooms = parse_bedrooms(&args[3]);
            let dir = data_dir(args.get(4));
            run_query(&zip, bedrooms, &dir);
        }
        Some("stats") => {
            let dir = data_dir(args.get(2));
            run_stats(&dir);
        }
        _ => {
            eprintln!("Usage:");
            eprintln!("  rentbench query <ZIP> <BEDROOMS> [DATA_DIR]");
            eprintln!("  rentbench stats [DATA_DIR]");
            eprintln!();
            eprintln!("DATA_DIR defaults to $RENTBENCH_DATA, then ./testdata");
            std::process::exit(1);
        }
    }
}

/// Resolve the data directory: explicit arg > env var > bundled fixtures.
fn data_dir(arg: Option<&String>) -> PathBuf {
    if let Some(dir) = arg {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = env::var("RENTBENCH_DATA") {
        return PathBuf::from(dir);
    }
    PathBuf::from("testdata")
}

fn parse_bedrooms(raw: &str) -> u8 {
    match raw.trim().parse::<u8>() {
        Ok(bedrooms) => bedrooms,
        Err(_) => {
            eprintln!("❌ BEDROOMS must be an integer between 0 and 4, got '{raw}'");
            std::process::exit(1);
        }
    }
}

/// Build the dataset or die. Ingestion failure is fatal before any query:
/// a process that cannot load its tables must not pretend to answer.
fn load_dataset(dir: &Path) -> BenchmarkDataset {
    println!("📂 Loading benchmark tables from {}...", dir.display());

    match BenchmarkDataset::load_from_dir(dir) {
        Ok(dataset) => {
            let stats = dataset.stats();
            println!(
                "✓ Loaded {} SAFMR ZIPs, {} FMR metro areas, {} crosswalk entries",
                stats.safmr_records, stats.fmr_records, stats.crosswalk_entries
            );
            dataset
        }
        Err(e) => {
            eprintln!("❌ Ingestion failed: {e:#}");
            std::process::exit(2);
        }
    }
}

fn run_query(zip: &str, bedrooms: u8, dir: &Path) {
    let dataset = load_dataset(dir);

    println!("\n🔍 Resolving {bedrooms}BR benchmark for ZIP {zip}...\n");
    match dataset.resolve(zip, Some(bedrooms)) {
        Ok(quote) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&quote).expect("quote serializes")
            );
        }
        Err(err) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&err).expect("error serializes")
            );
            std::process::exit(1);
        }
    }
}

fn run_stats(dir: &Path) {
    let dataset = load_dataset(dir);
    let stats = dataset.stats();

    println!("\n📊 Ingest report:");
    for report in &stats.ingest_reports {
        println!(
            "   {} → {} rows kept, {} missing key, {} malformed, {} fields degraded",
            report.source_file,
            report.rows_kept,
            report.rows_skipped_missing_key,
            report.rows_malformed,
            report.fields_degraded
        );
    }
}
