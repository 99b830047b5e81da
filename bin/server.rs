// Address Sorter - Review Server
// REST API over the run history store, plus server-side processing

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use address_sorter::{
    file_fingerprint, get_flagged_for_community, get_flagged_for_run, get_run, get_runs,
    insert_run, load_records, setup_database, sort_addresses, write_workbook, FlaggedRow,
    RunSummary, SorterConfig,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: SorterConfig,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

/// POST /api/process request body
#[derive(Deserialize)]
struct ProcessRequest {
    /// Server-side path of the input file
    input: String,

    /// Optional output path; derived from the input when omitted
    output: Option<String>,
}

#[derive(Serialize)]
struct ProcessResponse {
    run: RunSummary,
    output: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/runs - List recorded runs, newest first
async fn list_runs(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_runs(&conn) {
        Ok(runs) => (StatusCode::OK, Json(ApiResponse::ok(runs))).into_response(),
        Err(e) => {
            eprintln!("Error listing runs: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::ok(Vec::<RunSummary>::new())),
            )
                .into_response()
        }
    }
}

/// GET /api/runs/:id - One run's summary
async fn get_run_summary(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_run(&conn, &run_id) {
        Ok(Some(run)) => (StatusCode::OK, Json(ApiResponse::ok(run))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("Run not found: {}", run_id))),
        )
            .into_response(),
        Err(e) => {
            eprintln!("Error getting run {}: {}", run_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /api/runs/:id/flagged - Flagged addresses for a run
async fn get_run_flagged(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_flagged_for_run(&conn, &run_id) {
        Ok(rows) => (StatusCode::OK, Json(ApiResponse::ok(rows))).into_response(),
        Err(e) => {
            eprintln!("Error getting flagged for run {}: {}", run_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::ok(Vec::<FlaggedRow>::new())),
            )
                .into_response()
        }
    }
}

/// GET /api/runs/:id/flagged/:subname - Flagged addresses for one community
async fn get_community_flagged(
    State(state): State<AppState>,
    Path((run_id, subname)): Path<(String, String)>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    // Community names contain spaces; decode the URL-encoded parameter
    let decoded_subname = urlencoding::decode(&subname)
        .unwrap_or_else(|_| subname.clone().into())
        .into_owned();

    match get_flagged_for_community(&conn, &run_id, &decoded_subname) {
        Ok(rows) => (StatusCode::OK, Json(ApiResponse::ok(rows))).into_response(),
        Err(e) => {
            eprintln!(
                "Error getting flagged for {} / {}: {}",
                run_id, decoded_subname, e
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::ok(Vec::<FlaggedRow>::new())),
            )
                .into_response()
        }
    }
}

/// POST /api/process - Run the sorter on a server-side file and record
/// the run
async fn process_file(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> impl IntoResponse {
    let input = std::path::PathBuf::from(&request.input);
    let output = request
        .output
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| {
            let stem = input
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("output");
            input.with_file_name(format!("{}_sorted.xlsx", stem))
        });

    let outcome = (|| -> anyhow::Result<ProcessResponse> {
        let records = load_records(&input)?;
        let result = sort_addresses(&records, &state.config);
        write_workbook(&result, &output)?;

        let hash = file_fingerprint(&input)?;
        let run = RunSummary::from_result(&request.input, &hash, &result);

        let conn = state.db.lock().unwrap();
        insert_run(&conn, &run, &result.flagged)?;

        Ok(ProcessResponse {
            run,
            output: output.to_string_lossy().to_string(),
        })
    })();

    match outcome {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::ok(response))).into_response(),
        Err(e) => {
            eprintln!("Error processing {}: {}", request.input, e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::err(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET / - Minimal index page
async fn serve_index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Address Sorter</title></head>
<body>
<h1>Address Sorter - Review Server</h1>
<ul>
  <li><a href="/api/health">GET /api/health</a></li>
  <li><a href="/api/runs">GET /api/runs</a></li>
  <li>GET /api/runs/:id</li>
  <li>GET /api/runs/:id/flagged</li>
  <li>GET /api/runs/:id/flagged/:subname</li>
  <li>POST /api/process {"input": "path/to/file.csv"}</li>
</ul>
</body>
</html>
"#;

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")
        .expect("Failed to configure logging")
        .start()
        .expect("Failed to start logging");

    println!("🌐 Address Sorter - Review Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Open (or create) the run database
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "address_runs.db".to_string());

    let conn = Connection::open(&db_path).expect("Failed to open database");
    setup_database(&conn).expect("Failed to initialize database");
    println!("✓ Database ready: {}", db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: SorterConfig::default(),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/runs", get(list_runs))
        .route("/runs/:id", get(get_run_summary))
        .route("/runs/:id/flagged", get(get_run_flagged))
        .route("/runs/:id/flagged/:subname", get(get_community_flagged))
        .route("/process", post(process_file))
        .with_state(state.clone());

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
    println!("   API: http://localhost:3000/api/runs");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
