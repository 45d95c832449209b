//! Storage abstraction for KINO-TRACE.
//!
//! The [`Store`] trait covers one tenant's document/code store. The
//! search engine only ever reads through it; ingestion and the CRUD
//! operations write through it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    CandidateDocument, CodeHit, Document, DocumentPage, DocumentSummary, DocumentUpdate,
    ExtractionPayload, ListQuery, NewDocument, SearchStats, StoredFile,
};

/// Abstract per-tenant storage backend.
///
/// Every listing that feeds the search engine is ordered by document date
/// descending, ties broken by id descending.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_document`](Store::insert_document) | Insert a document and its codes |
/// | [`update_document`](Store::update_document) | Update metadata, replacing codes |
/// | [`set_extraction`](Store::set_extraction) | Replace the cached extraction payload |
/// | [`replace_file`](Store::replace_file) | Point a document at a new stored file |
/// | [`delete_document`](Store::delete_document) | Delete a document (codes cascade) |
/// | [`set_code_validated`](Store::set_code_validated) | Toggle a code's validated flag |
/// | [`get_document`](Store::get_document) | Full record with codes |
/// | [`list_documents`](Store::list_documents) | Paged listing |
/// | [`cached_text_candidates`](Store::cached_text_candidates) | Documents with a cached payload |
/// | [`find_by_code`](Store::find_by_code) | Substring lookup over stored codes |
/// | [`suggest_codes`](Store::suggest_codes) | Prefix lookup over distinct codes |
/// | [`pdf_documents`](Store::pdf_documents) | Documents whose file is a PDF |
/// | [`fulltext_candidates`](Store::fulltext_candidates) | Payload or number containing a query |
/// | [`stats`](Store::stats) | Dashboard aggregates |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a document and its codes atomically. Returns the new id.
    async fn insert_document(&self, doc: &NewDocument) -> Result<i64>;

    /// Returns `false` when no document has this id.
    async fn update_document(&self, id: i64, update: &DocumentUpdate) -> Result<bool>;

    async fn set_extraction(&self, id: i64, payload: &ExtractionPayload) -> Result<()>;

    /// Swap a document's file path, hash and cached payload. Returns the
    /// previous file path, or `None` when no document has this id.
    async fn replace_file(&self, id: i64, file: &StoredFile) -> Result<Option<String>>;

    /// Delete a document, returning its summary so the caller can remove
    /// the stored file.
    async fn delete_document(&self, id: i64) -> Result<Option<DocumentSummary>>;

    /// Returns `false` when no code has this id.
    async fn set_code_validated(&self, code_id: i64, validated: bool) -> Result<bool>;

    async fn get_document(&self, id: i64) -> Result<Option<Document>>;

    async fn list_documents(&self, query: &ListQuery) -> Result<DocumentPage>;

    /// Up to `limit` documents whose cached payload is present and
    /// non-empty, with their full code lists.
    async fn cached_text_candidates(&self, limit: i64) -> Result<Vec<CandidateDocument>>;

    /// One row per (document, code) pair whose code contains `term`
    /// case-insensitively.
    async fn find_by_code(&self, term: &str) -> Result<Vec<CodeHit>>;

    /// Distinct codes starting with `term` (case-sensitive), ascending.
    async fn suggest_codes(&self, term: &str, limit: i64) -> Result<Vec<String>>;

    /// Documents whose stored path ends in `.pdf`, optionally limited.
    async fn pdf_documents(&self, limit: Option<i64>) -> Result<Vec<CandidateDocument>>;

    /// Documents whose raw payload or number contains `query`
    /// case-insensitively.
    async fn fulltext_candidates(&self, query: &str, limit: i64) -> Result<Vec<CandidateDocument>>;

    async fn stats(&self) -> Result<SearchStats>;
}
