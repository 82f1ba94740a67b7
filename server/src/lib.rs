use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::{Mutex, RwLock};
use search_core::keywords::classify;
use search_core::persist::GlobalStatsRow;
use search_core::{
    BatchSummary, Engine, EngineConfig, IndexError, IndexStats, JsonPaperSource, KeywordExtractor, KeywordOptions,
    PaperId, PaperMetadata, ScoredKeyword, SearchHit, SearchOptions, SledStore, StoreError, TermStore, TextInput,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_score: f64,
    #[serde(default)]
    pub metadata: bool,
    #[serde(default)]
    pub explain: bool,
}
fn default_limit() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub corpus: IndexStats,
    pub persisted: Option<GlobalStatsRow>,
}

#[derive(Deserialize)]
pub struct KeywordsRequest {
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub options: KeywordOptions,
}

#[derive(Serialize)]
pub struct KeywordsResponse {
    pub category: &'static str,
    pub keywords: Vec<ScoredKeyword>,
}

#[derive(Deserialize)]
pub struct AddDocumentRequest {
    pub key: String,
    /// Raw text or an array of tokens.
    pub text: serde_json::Value,
    #[serde(default)]
    pub external_id: Option<PaperId>,
    #[serde(default)]
    pub metadata: PaperMetadata,
}

#[derive(Serialize, Deserialize)]
pub struct AddDocumentResponse {
    pub key: String,
    pub length: u32,
    pub terms_written: usize,
}

#[derive(Deserialize)]
pub struct RemoveParams {
    #[serde(default)]
    pub purge: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<Engine>>,
    pub tagger: Arc<Mutex<KeywordExtractor>>,
    pub store: Arc<SledStore>,
    pub source: Arc<JsonPaperSource>,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Open the term-score database and load the in-memory corpus from the paper source.
    pub fn open(source_path: PathBuf, db_path: PathBuf, config: EngineConfig) -> Result<Self> {
        let source = JsonPaperSource::new(&source_path);
        let store = SledStore::open(&db_path)?;
        let mut engine = Engine::new(config);
        let loaded = engine.load_from_source(&source)?;
        tracing::info!(loaded, source = %source_path.display(), db = %db_path.display(), "corpus ready");
        let tagger = engine.keyword_extractor();
        Ok(Self {
            engine: Arc::new(RwLock::new(engine)),
            tagger: Arc::new(Mutex::new(tagger)),
            store: Arc::new(store),
            source: Arc::new(source),
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
        })
    }
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(err: IndexError) -> ApiError {
    let status = match &err {
        IndexError::InvalidInput(_) | IndexError::UnresolvedPaperId { .. } => StatusCode::BAD_REQUEST,
        IndexError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
        IndexError::Persist { source: StoreError::Cancelled | StoreError::TimedOut, .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

pub fn build_app(state: AppState) -> Router {
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

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/keywords", post(keywords_handler))
        .route("/index/document", post(add_document))
        .route("/index/document/:key", delete(remove_document))
        .route("/index/reindex", post(reindex))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let opts = SearchOptions {
        limit: params.limit.clamp(1, 100),
        min_score: params.min_score,
        include_metadata: params.metadata,
        explain: params.explain,
    };
    let results = state
        .engine
        .read()
        .search_with_source(&params.q, &opts, state.source.as_ref())
        .map_err(api_error)?;
    Ok(Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits: results.len(),
        results,
    }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let corpus = state.engine.read().stats();
    let persisted = state.store.global_stats().map_err(|e| api_error(e.into()))?;
    Ok(Json(StatsResponse { corpus, persisted }))
}

pub async fn keywords_handler(
    State(state): State<AppState>,
    Json(req): Json<KeywordsRequest>,
) -> Json<KeywordsResponse> {
    let keywords = state.tagger.lock().extract_with_title(req.title.as_deref(), &req.text, &req.options);
    let names: Vec<&str> = keywords.iter().map(|k| k.keyword.as_str()).collect();
    let category = classify(&names);
    Json(KeywordsResponse { category, keywords })
}

// --- Admin endpoints ---
async fn add_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddDocumentRequest>,
) -> Result<Json<AddDocumentResponse>, ApiError> {
    authorize(&state, &headers)?;
    let input = TextInput::from_json(&req.text).map_err(api_error)?;
    let mut engine = state.engine.write();
    let opts = engine.config().write_options();
    let terms_written = engine
        .add_and_persist(state.store.as_ref(), req.key.clone(), &input, req.metadata, req.external_id, &opts)
        .map_err(api_error)?;
    let length = engine.document(&req.key).map(|d| d.length).unwrap_or_default();
    Ok(Json(AddDocumentResponse { key: req.key, length, terms_written }))
}

async fn remove_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(params): Query<RemoveParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let mut engine = state.engine.write();
    let purged = if params.purge {
        Some(engine.remove_and_purge(state.store.as_ref(), &key).map_err(api_error)?)
    } else {
        engine.remove_document(&key).map_err(api_error)?;
        None
    };
    Ok(Json(serde_json::json!({ "key": key, "purged_rows": purged })))
}

async fn reindex(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<BatchSummary>, ApiError> {
    authorize(&state, &headers)?;
    let task_state = state.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let mut engine = task_state.engine.write();
        engine.reindex_all(task_state.source.as_ref(), task_state.store.as_ref(), None)
    })
    .await
    .map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": e.to_string() })))
    })?
    .map_err(api_error)?;
    Ok(Json(summary))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let unauthorized = |msg: &str| (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": msg })));
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(unauthorized("ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(unauthorized("invalid admin token"))
    }
}
