use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use folio::persist::IndexPaths;
use folio::search::Correction;
use folio::{EngineConfig, Error, IndexStats, QueryMode, SearchEngine, Suggester, Suggestion, VocabularySuggester};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const SUGGESTIONS_PER_TERM: usize = 3;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_page")]
    pub page: usize,
    pub size: Option<usize>,
}
fn default_page() -> usize { 1 }

#[derive(Deserialize)]
pub struct SuggestParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub mode: QueryMode,
    pub total_hits: usize,
    pub page: usize,
    pub page_size: usize,
    pub weak_match: bool,
    pub corrections: Vec<Correction>,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub page_number: u32,
    pub match_count: u32,
    pub authority: f64,
    pub snippet: String,
}

#[derive(Serialize)]
pub struct PageResponse {
    pub page_number: u32,
    pub text: String,
}

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    pub engine: Arc<RwLock<SearchEngine>>,
    pub admin_token: Option<String>,
}

type ApiError = (StatusCode, String);

fn api_error(err: Error) -> ApiError {
    let status = match &err {
        Error::Parse(_) | Error::InvalidPageSize { .. } => StatusCode::BAD_REQUEST,
        Error::InvalidPage { .. } => StatusCode::NOT_FOUND,
        Error::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub fn build_app(index_dir: String) -> Result<Router> {
    build_app_with_config(index_dir, None)
}

/// Load the saved index and mount the routes. A `config` replaces the one stored with the index.
pub fn build_app_with_config(index_dir: String, config: Option<EngineConfig>) -> Result<Router> {
    let index_paths = IndexPaths::new(&index_dir);
    let mut engine = SearchEngine::load(&index_paths)?;
    if let Some(config) = config {
        engine.set_config(config);
    }
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState {
        index_paths_root: PathBuf::from(&index_dir),
        engine: Arc::new(RwLock::new(engine)),
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/suggest", get(suggest_handler))
        .route("/page/:number", get(page_handler))
        .route("/stats", get(stats_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let engine = state.engine.read();
    let size = params.size.unwrap_or(engine.config().default_page_size);
    let results = engine.search(&params.q, params.page, size).map_err(api_error)?;

    let corrections = if results.weak_match {
        let index = engine.index().map_err(api_error)?;
        let suggester = VocabularySuggester::new(index);
        engine.suggest_corrections(&params.q, &suggester, SUGGESTIONS_PER_TERM).map_err(api_error)?
    } else {
        Vec::new()
    };

    let separator = &engine.config().snippet_separator;
    let hits = results
        .hits
        .into_iter()
        .map(|hit| SearchHit {
            rank: hit.rank,
            page_number: hit.page_number,
            match_count: hit.match_count,
            authority: hit.authority,
            snippet: hit.snippet.render("<em>", "</em>", separator),
        })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: results.query,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        mode: results.mode,
        total_hits: results.total_hits,
        page: results.page,
        page_size: results.page_size,
        weak_match: results.weak_match,
        corrections,
        results: hits,
    }))
}

pub async fn suggest_handler(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let engine = state.engine.read();
    let index = engine.index().map_err(api_error)?;
    let limit = params.limit.max(1).min(100);
    Ok(Json(VocabularySuggester::new(index).complete(&params.q, limit)))
}

pub async fn page_handler(State(state): State<AppState>, Path(number): Path<u32>) -> Result<Json<PageResponse>, ApiError> {
    let engine = state.engine.read();
    let page = engine.page(number).map_err(api_error)?;
    Ok(Json(PageResponse { page_number: page.number(), text: page.text.clone() }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<IndexStats>, ApiError> {
    let engine = state.engine.read();
    engine.stats().map(Json).map_err(api_error)
}

/// Swap in the index currently on disk; queries in flight finish on the old one.
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<IndexStats>, ApiError> {
    authorize(&state, &headers)?;
    let fresh = SearchEngine::load(&IndexPaths::new(&state.index_paths_root)).map_err(api_error)?;
    let stats = fresh.stats().map_err(api_error)?;
    *state.engine.write() = fresh;
    tracing::info!(pages = stats.pages, terms = stats.terms, "index reloaded");
    Ok(Json(stats))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
