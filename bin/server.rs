// Rentbench - HUD Rent Benchmark API Server
// JSON endpoints over the in-memory benchmark dataset
//
// The dataset is built ONCE before the listener binds and shared
// immutably behind an Arc, so request handlers never lock. A data
// refresh means building a new dataset and restarting the process.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use rentbench::{BenchmarkDataset, ResolveError, MAX_BEDROOMS, VERSION};

/// Shared application state
#[derive(Clone)]
struct AppState {
    dataset: Arc<BenchmarkDataset>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// Query parameters for /api/rent.
///
/// `bedrooms` stays a raw string here so the handler can tell "absent"
/// (rejected) apart from "0" (a valid studio lookup) and from junk text.
#[derive(Deserialize)]
struct RentParams {
    zip: Option<String>,
    bedrooms: Option<String>,
}

/// GET /api/health - Liveness + dataset vitals
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.dataset.stats();
    Json(json!({
        "status": "ok",
        "version": VERSION,
        "loaded_at": stats.loaded_at,
        "safmr_records": stats.safmr_records,
        "fmr_records": stats.fmr_records,
        "crosswalk_entries": stats.crosswalk_entries,
    }))
}

/// GET /api/stats - Row counts + per-file ingest counters
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dataset.stats())
}

/// GET /api/rent?zip=90210&bedrooms=2 - Resolve a rent benchmark
async fn rent_by_query(
    State(state): State<AppState>,
    Query(params): Query<RentParams>,
) -> impl IntoResponse {
    let zip = params.zip.unwrap_or_default();
    resolve_response(&state, &zip, params.bedrooms.as_deref())
}

/// GET /api/rent/:zip/:bedrooms - Path-style variant of the same lookup
async fn rent_by_path(
    State(state): State<AppState>,
    Path((zip, bedrooms)): Path<(String, String)>,
) -> impl IntoResponse {
    // Decode URL-encoded ZIP (e.g. "90210%20" from sloppy clients)
    let decoded_zip = urlencoding::decode(&zip)
        .unwrap_or_else(|_| zip.clone().into())
        .into_owned();

    resolve_response(&state, &decoded_zip, Some(bedrooms.as_str()))
}

/// Run one resolution and map the outcome to a JSON response.
///
/// Status mapping: 200 for a quote, 400 for a caller bug, 404 for the
/// three legitimate data-not-available outcomes. The 404s are expected
/// traffic, not system errors - nothing is logged for them.
fn resolve_response(
    state: &AppState,
    zip: &str,
    bedrooms_raw: Option<&str>,
) -> axum::response::Response {
    let bedrooms = match bedrooms_raw {
        None => None,
        Some(raw) => match raw.trim().parse::<u8>() {
            Ok(bedrooms) => Some(bedrooms),
            Err(_) => {
                let err = ResolveError::InvalidRequest {
                    zip: zip.to_string(),
                    bedrooms: None,
                    detail: format!(
                        "bedrooms must be an integer between 0 and {MAX_BEDROOMS}, got '{raw}'"
                    ),
                };
                return (StatusCode::BAD_REQUEST, Json(err)).into_response();
            }
        },
    };

    match state.dataset.resolve(zip, bedrooms) {
        Ok(quote) => (StatusCode::OK, Json(quote)).into_response(),
        Err(err) => {
            let status = if err.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::NOT_FOUND
            };
            (status, Json(err)).into_response()
        }
    }
}

/// GET / - Tiny index so a browser hit shows what this is
async fn serve_index() -> impl IntoResponse {
    Html(concat!(
        "<h1>Rentbench API</h1>",
        "<ul>",
        "<li><code>GET /api/rent?zip=90210&bedrooms=2</code></li>",
        "<li><code>GET /api/rent/:zip/:bedrooms</code></li>",
        "<li><code>GET /api/health</code></li>",
        "<li><code>GET /api/stats</code></li>",
        "</ul>",
    ))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🏠 Rentbench - HUD Rent Benchmark API");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let data_dir = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RENTBENCH_DATA").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("testdata"));

    // Build the dataset BEFORE binding the listener: readiness implies
    // the tables are fully populated
    println!("📂 Loading benchmark tables from {}...", data_dir.display());
    let dataset = match BenchmarkDataset::load_from_dir(&data_dir) {
        Ok(dataset) => dataset,
        Err(e) => {
            eprintln!("❌ Ingestion failed: {e:#}");
            eprintln!("   Expected safmr.csv, fmr.csv, zip_cbsa_crosswalk.csv in {}", data_dir.display());
            std::process::exit(2);
        }
    };

    let stats = dataset.stats();
    println!(
        "✓ Loaded {} SAFMR ZIPs, {} FMR metro areas, {} crosswalk entries",
        stats.safmr_records, stats.fmr_records, stats.crosswalk_entries
    );

    // Create shared state
    let state = AppState {
        dataset: Arc::new(dataset),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/rent", get(rent_by_query))
        .route("/rent/:zip/:bedrooms", get(rent_by_path))
        .with_state(state);

    // Build main router
    let app = Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   Try: http://localhost:3000/api/rent?zip=90210&bedrooms=2");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

// ============================================================================
// TESTS
// ============================================================================
