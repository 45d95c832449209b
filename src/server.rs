//! JSON HTTP API.
//!
//! Every `/api` route acts on one tenant, named by the `X-Client-Code`
//! header. The tenant database is opened for the request and closed before
//! the response is sent.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`, `POST` | `/api/search` | Greedy multi-code coverage (`codes` query or form field) |
//! | `GET`  | `/api/search_by_code?code=` | Documents carrying a matching code |
//! | `GET`  | `/api/suggest?term=` | Code autocompletion |
//! | `GET`  | `/api/search_in_pdf?term=` | Search inside the stored PDF files |
//! | `GET`  | `/api/fulltext?query=&limit=` | Search cached text and document numbers |
//! | `GET`  | `/api/stats` | Tenant statistics |
//! | `GET`  | `/api/documents?page=&per_page=&tipo=` | Paginated document list |
//! | `GET`, `PUT`, `DELETE` | `/api/documents/{id}` | Single document |
//! | `POST` | `/api/documents/{id}/file` | Replace the stored file (multipart `file`) |
//! | `POST` | `/api/upload` | Store a document (multipart) |
//! | `POST` | `/api/extract_codes` | Codes a pattern finds in an uploaded file, not stored |
//! | `POST` | `/api/check_codes` | Which listed codes occur in an uploaded file, not stored |
//! | `POST` | `/api/codes/{id}/validate` | Mark a code as validated |
//! | `POST` | `/api/reindex?force=&batch=` | Re-extract cached PDF text |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "no codes provided" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `payload_too_large` (413), `internal` (500).
//!
//! Multipart routes take text fields plus one part named `file`. Bodies
//! larger than `[server].max_upload_bytes` are rejected.
//!
//! `/api/search` is the one route that tolerates a missing or unknown tenant:
//! it answers with an empty coverage result instead of 401.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Form, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use kino_core::extract::{CodeCheck, CodePattern, ExtractError};
use kino_core::models::{
    CodeHit, Document, DocumentPage, DocumentUpdate, ListQuery, SearchStats,
};
use kino_core::search::{
    fulltext_search, greedy_search, search_by_code, search_in_pdf_content, search_stats,
    suggest_codes, FulltextResponse, GreedySearchResult, PdfContentHit,
};
use kino_core::text::parse_code_list;

use crate::config::Config;
use crate::documents::{self, DocumentError};
use crate::extract::{check_codes_in_bytes, extract_codes_from_bytes, FileTextExtractor};
use crate::ingest::{
    reindex_documents, replace_document_file, upload_bytes, FileReplacement, ReindexReport,
    UploadOutcome, UploadRequest,
};
use crate::sqlite_store::SqliteStore;
use crate::tenant::{open_tenant, Tenant, TenantError};

/// Header naming the tenant a request acts on.
pub const TENANT_HEADER: &str = "x-client-code";

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Build the router; exposed so tests can serve it on an ephemeral port.
pub fn router(config: Config) -> Router {
    let max_upload_bytes = config.server.max_upload_bytes;
    let state = AppState {
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/search", get(handle_search_get).post(handle_search_post))
        .route("/api/search_by_code", get(handle_search_by_code))
        .route("/api/suggest", get(handle_suggest))
        .route("/api/search_in_pdf", get(handle_search_in_pdf))
        .route("/api/fulltext", get(handle_fulltext))
        .route("/api/stats", get(handle_stats))
        .route("/api/documents", get(handle_list_documents))
        .route(
            "/api/documents/{id}",
            get(handle_get_document)
                .put(handle_update_document)
                .delete(handle_delete_document),
        )
        .route("/api/documents/{id}/file", post(handle_replace_file))
        .route("/api/upload", post(handle_upload))
        .route("/api/extract_codes", post(handle_extract_codes))
        .route("/api/check_codes", post(handle_check_codes))
        .route("/api/codes/{id}/validate", post(handle_validate_code))
        .route("/api/reindex", post(handle_reindex))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(config.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        bind = %bind_addr,
        tenants = %config.tenants.root.display(),
        "kino server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map library errors onto HTTP statuses by their concrete type.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<DocumentError>() {
            return match e {
                DocumentError::NotFound(_) | DocumentError::CodeNotFound(_) => {
                    not_found(e.to_string())
                }
                DocumentError::Invalid(_) => bad_request(e.to_string()),
            };
        }
        if let Some(e) = err.downcast_ref::<TenantError>() {
            return match e {
                TenantError::NotFound(_) | TenantError::InvalidCode(_) => {
                    unauthorized(e.to_string())
                }
                TenantError::AlreadyExists(_) => bad_request(e.to_string()),
            };
        }
        if let Some(e) = err.downcast_ref::<ExtractError>() {
            if !matches!(e, ExtractError::Io { .. }) {
                return bad_request(e.to_string());
            }
        }
        tracing::error!(error = %format!("{:#}", err), "request failed");
        internal(format!("{:#}", err))
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        anyhow::Error::from(err).into()
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "bad_request"
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.body_text(),
        }
    }
}

// ============ Tenant resolution ============

fn tenant_code(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Open the request's tenant or answer 401.
async fn require_tenant(state: &AppState, headers: &HeaderMap) -> Result<Tenant, AppError> {
    let code = tenant_code(headers)
        .ok_or_else(|| unauthorized(format!("missing {} header", TENANT_HEADER)))?;
    Ok(open_tenant(&state.config, &code).await?)
}

/// Like [`require_tenant`], but an absent or unknown tenant is `None`.
async fn optional_tenant(state: &AppState, headers: &HeaderMap) -> Result<Option<Tenant>, AppError> {
    let Some(code) = tenant_code(headers) else {
        return Ok(None);
    };
    match open_tenant(&state.config, &code).await {
        Ok(tenant) => Ok(Some(tenant)),
        Err(err) if err.downcast_ref::<TenantError>().is_some() => {
            tracing::debug!(tenant = %code, error = %err, "search without a resolvable tenant");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /api/search ============

#[derive(Deserialize)]
struct CodesParams {
    #[serde(default)]
    codes: String,
}

async fn handle_search_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CodesParams>,
) -> Result<Json<GreedySearchResult>, AppError> {
    run_greedy(&state, &headers, &params.codes).await
}

async fn handle_search_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(params): Form<CodesParams>,
) -> Result<Json<GreedySearchResult>, AppError> {
    run_greedy(&state, &headers, &params.codes).await
}

async fn run_greedy(
    state: &AppState,
    headers: &HeaderMap,
    raw_codes: &str,
) -> Result<Json<GreedySearchResult>, AppError> {
    let codes = parse_code_list(raw_codes);
    if codes.is_empty() {
        return Err(bad_request("no codes provided"));
    }

    let tenant = optional_tenant(state, headers).await?;
    let store: Option<&SqliteStore> = tenant.as_ref().map(|t| &t.store);
    let result = greedy_search(store, &codes, &state.config.search).await;
    if let Some(tenant) = tenant {
        tenant.close().await;
    }
    Ok(Json(result?))
}

// ============ GET /api/search_by_code ============

#[derive(Deserialize)]
struct CodeParams {
    #[serde(default)]
    code: String,
}

#[derive(Serialize)]
struct CodeHitsResponse {
    documents: Vec<CodeHit>,
}

async fn handle_search_by_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CodeParams>,
) -> Result<Json<CodeHitsResponse>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let hits = search_by_code(&tenant.store, &params.code).await;
    tenant.close().await;
    Ok(Json(CodeHitsResponse { documents: hits? }))
}

// ============ GET /api/suggest ============

#[derive(Deserialize)]
struct TermParams {
    #[serde(default)]
    term: String,
}

async fn handle_suggest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TermParams>,
) -> Result<Json<Vec<String>>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let codes = suggest_codes(&tenant.store, &params.term, state.config.search.suggest_limit).await;
    tenant.close().await;
    Ok(Json(codes?))
}

// ============ GET /api/search_in_pdf ============

#[derive(Serialize)]
struct PdfSearchResponse {
    term: String,
    count: usize,
    results: Vec<PdfContentHit>,
}

async fn handle_search_in_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TermParams>,
) -> Result<Json<PdfSearchResponse>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let hits = search_in_pdf_content(
        Some(&tenant.store),
        &FileTextExtractor,
        &tenant.paths.uploads_dir,
        &params.term,
        &state.config.search,
    )
    .await;
    tenant.close().await;
    let results = hits?;
    Ok(Json(PdfSearchResponse {
        term: params.term.trim().to_string(),
        count: results.len(),
        results,
    }))
}

// ============ GET /api/fulltext ============

#[derive(Deserialize)]
struct FulltextParams {
    #[serde(default)]
    query: String,
    limit: Option<i64>,
}

async fn handle_fulltext(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<FulltextParams>,
) -> Result<Json<FulltextResponse>, AppError> {
    let min_len = state.config.search.pdf_min_term_len;
    if params.query.trim().chars().count() < min_len {
        return Err(bad_request(format!(
            "query must be at least {} characters",
            min_len
        )));
    }

    let tenant = require_tenant(&state, &headers).await?;
    let response = fulltext_search(
        &tenant.store,
        &params.query,
        params.limit,
        &state.config.search,
    )
    .await;
    tenant.close().await;
    Ok(Json(response?))
}

// ============ GET /api/stats ============

async fn handle_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SearchStats>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let stats = search_stats(&tenant.store).await;
    tenant.close().await;
    Ok(Json(stats?))
}

// ============ /api/documents ============

#[derive(Deserialize)]
struct ListParams {
    page: Option<i64>,
    per_page: Option<i64>,
    tipo: Option<String>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<DocumentPage>, AppError> {
    let defaults = ListQuery::default();
    let query = ListQuery {
        page: params.page.unwrap_or(defaults.page),
        per_page: params.per_page.unwrap_or(defaults.per_page),
        doc_type: params.tipo,
    };

    let tenant = require_tenant(&state, &headers).await?;
    let page = documents::list_documents(&tenant.store, &query).await;
    tenant.close().await;
    Ok(Json(page?))
}

async fn handle_get_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Document>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let doc = documents::get_document(&tenant.store, id).await;
    tenant.close().await;
    Ok(Json(doc?))
}

#[derive(Deserialize)]
struct UpdateBody {
    tipo: String,
    numero: String,
    fecha: String,
    #[serde(default)]
    proveedor: Option<String>,
    /// Newline or comma separated.
    #[serde(default)]
    codes: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn handle_update_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<SuccessResponse>, AppError> {
    let update = DocumentUpdate {
        doc_type: body.tipo,
        number: body.numero,
        date: body.fecha,
        supplier: body.proveedor,
        codes: parse_code_list(&body.codes),
    };

    let tenant = require_tenant(&state, &headers).await?;
    let result = documents::update_document(&tenant.store, id, &update).await;
    tenant.close().await;
    result?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let result = documents::delete_document(&tenant.store, &tenant.paths.uploads_dir, id).await;
    tenant.close().await;
    result?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============ Multipart uploads ============

/// Text fields of a multipart body plus its `file` part.
struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<(String, Vec<u8>)>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm {
            fields: HashMap::new(),
            file: None,
        };
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was chosen.
                if !(file_name.is_empty() && bytes.is_empty()) {
                    form.file = Some((file_name, bytes.to_vec()));
                }
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn number(&self, name: &str) -> Result<Option<usize>, AppError> {
        self.optional(name)
            .map(|v| {
                v.parse()
                    .map_err(|_| bad_request(format!("{name} must be a non-negative integer")))
            })
            .transpose()
    }

    fn take_file(&mut self) -> Result<(String, Vec<u8>), AppError> {
        self.file
            .take()
            .ok_or_else(|| bad_request("file is required"))
    }
}

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadOutcome>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let outcome = upload_form(&state, &tenant, multipart).await;
    tenant.close().await;
    Ok(Json(outcome?))
}

async fn upload_form(
    state: &AppState,
    tenant: &Tenant,
    multipart: Multipart,
) -> Result<UploadOutcome, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let (file_name, bytes) = form.take_file()?;
    let request = UploadRequest {
        file: file_name.into(),
        doc_type: form.text("tipo"),
        number: form.text("numero"),
        date: form.text("fecha"),
        supplier: form.optional("proveedor"),
        codes: parse_code_list(&form.text("codes")),
    };
    Ok(upload_bytes(
        &tenant.store,
        &tenant.paths.uploads_dir,
        &FileTextExtractor,
        &state.config.extraction,
        &request,
        &bytes,
    )
    .await?)
}

async fn handle_replace_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<FileReplacement>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let result = replace_file_form(&state, &tenant, id, multipart).await;
    tenant.close().await;
    Ok(Json(result?))
}

async fn replace_file_form(
    state: &AppState,
    tenant: &Tenant,
    id: i64,
    multipart: Multipart,
) -> Result<FileReplacement, AppError> {
    let (file_name, bytes) = UploadForm::read(multipart).await?.take_file()?;
    Ok(replace_document_file(
        &tenant.store,
        &tenant.paths.uploads_dir,
        &FileTextExtractor,
        &state.config.extraction,
        id,
        std::path::Path::new(&file_name),
        &bytes,
    )
    .await?)
}

#[derive(Serialize)]
struct ExtractCodesResponse {
    text: String,
    codes: Vec<String>,
    count: usize,
}

async fn handle_extract_codes(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ExtractCodesResponse>, AppError> {
    require_tenant(&state, &headers).await?.close().await;

    let mut form = UploadForm::read(multipart).await?;
    let (file_name, bytes) = form.take_file()?;
    let defaults = &state.config.extraction.pattern;
    let pattern = CodePattern {
        prefix: form.fields.get("prefix").cloned().unwrap_or_else(|| defaults.prefix.clone()),
        terminator: form
            .fields
            .get("terminator")
            .cloned()
            .unwrap_or_else(|| defaults.terminator.clone()),
        min_length: form.number("min_length")?.unwrap_or(defaults.min_length),
        max_length: form.number("max_length")?.unwrap_or(defaults.max_length),
    };

    let found = extract_codes_from_bytes(&file_name, &bytes, &pattern)?;
    Ok(Json(ExtractCodesResponse {
        count: found.codes.len(),
        text: found.text,
        codes: found.codes,
    }))
}

async fn handle_check_codes(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<CodeCheck>, AppError> {
    require_tenant(&state, &headers).await?.close().await;

    let mut form = UploadForm::read(multipart).await?;
    let codes = parse_code_list(&form.text("codes"));
    if codes.is_empty() {
        return Err(bad_request("no codes provided"));
    }
    let (file_name, bytes) = form.take_file()?;
    Ok(Json(check_codes_in_bytes(&file_name, &bytes, &codes)?))
}

// ============ POST /api/codes/{id}/validate ============

#[derive(Deserialize)]
struct ValidateBody {
    validated: bool,
}

async fn handle_validate_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ValidateBody>,
) -> Result<Json<SuccessResponse>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let result = documents::set_code_validated(&tenant.store, id, body.validated).await;
    tenant.close().await;
    result?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============ POST /api/reindex ============

#[derive(Deserialize)]
struct ReindexParams {
    #[serde(default)]
    force: bool,
    batch: Option<usize>,
}

async fn handle_reindex(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReindexParams>,
) -> Result<Json<ReindexReport>, AppError> {
    let tenant = require_tenant(&state, &headers).await?;
    let report = reindex_documents(
        &tenant.store,
        &tenant.paths.uploads_dir,
        &FileTextExtractor,
        &state.config.extraction,
        params.force,
        params.batch,
    )
    .await;
    tenant.close().await;
    Ok(Json(report?))
}
