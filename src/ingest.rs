//! Document ingestion: upload and re-index.
//!
//! Upload copies a file into the tenant's upload tree, hashes it, caches
//! the extracted text and auto-detected codes, and records the document
//! with its user-supplied codes. A document's file can later be replaced
//! the same way. Re-index refreshes the cached text of PDF
//! documents whose cache is missing or too short.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use kino_core::extract::{extract_codes_from_pdf, TextExtractor};
use kino_core::models::{
    resolve_upload_path, CandidateDocument, ExtractionPayload, NewDocument, StoredFile,
};
use kino_core::store::Store;
use kino_core::text::{clean_codes, dedup, parse_code_list};

use crate::config::{Config, ExtractionConfig};
use crate::documents::DocumentError;
use crate::extract::{content_type_for, FileTextExtractor};
use crate::tenant::{open_tenant, sanitize_code};

/// A file to ingest plus its metadata.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Source file. [`upload_bytes`] only looks at its extension.
    pub file: PathBuf,
    pub doc_type: String,
    pub number: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub supplier: Option<String>,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub document_id: i64,
    /// Path relative to the upload root.
    pub file_path: String,
    pub codes_count: usize,
    /// Whether text was extracted and cached.
    pub extracted: bool,
    pub auto_codes: Vec<String>,
}

/// Result of swapping a document's stored file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReplacement {
    pub document_id: i64,
    pub file_path: String,
    pub extracted: bool,
    pub auto_codes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReindexReport {
    pub indexed: usize,
    pub errors: Vec<String>,
    /// PDF documents still lacking usable cached text after this batch.
    pub pending: usize,
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Trimmed, checked upload metadata.
struct UploadMeta {
    doc_type: String,
    number: String,
    date: String,
    supplier: Option<String>,
    codes: Vec<String>,
}

fn validate(request: &UploadRequest) -> Result<UploadMeta> {
    let doc_type = sanitize_code(&request.doc_type);
    let number = request.number.trim();
    let date = request.date.trim();
    if doc_type.is_empty() || number.is_empty() || date.is_empty() {
        return Err(DocumentError::Invalid("tipo, numero and fecha are required".into()).into());
    }
    if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(DocumentError::Invalid(format!(
            "invalid fecha (expected YYYY-MM-DD): {date}"
        ))
        .into());
    }
    Ok(UploadMeta {
        doc_type,
        number: number.to_string(),
        date: date.to_string(),
        supplier: request
            .supplier
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        codes: dedup(clean_codes(&request.codes)),
    })
}

/// Write `bytes` under `<uploads_dir>/<doc_type>/` with a fresh unique
/// name that keeps the original extension. Returns the relative path and
/// the absolute target.
fn store_file(
    uploads_dir: &Path,
    doc_type: &str,
    original: &Path,
    bytes: &[u8],
) -> Result<(String, PathBuf)> {
    let ext = original
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let file_name = match &ext {
        Some(ext) => format!("{}_{}.{}", doc_type, uuid::Uuid::new_v4().simple(), ext),
        None => format!("{}_{}", doc_type, uuid::Uuid::new_v4().simple()),
    };
    let target_dir = uploads_dir.join(doc_type);
    std::fs::create_dir_all(&target_dir)?;
    let target = target_dir.join(&file_name);
    std::fs::write(&target, bytes)
        .with_context(|| format!("Failed to store {}", target.display()))?;
    Ok((format!("{doc_type}/{file_name}"), target))
}

fn remove_orphan(target: &Path) {
    if let Err(e) = std::fs::remove_file(target) {
        tracing::warn!(file = %target.display(), error = %e, "failed to remove orphaned upload");
    }
}

/// Cached payload for a freshly stored file, when its type is extractable.
/// Failures are logged and yield `None`.
fn extract_payload(
    extractor: &dyn TextExtractor,
    settings: &ExtractionConfig,
    target: &Path,
    original: &Path,
) -> Option<ExtractionPayload> {
    content_type_for(target)?;
    match extract_codes_from_pdf(extractor, target, &settings.pattern) {
        Ok(found) => Some(ExtractionPayload::from_text(
            &found.text,
            found.codes,
            settings.upload_text_limit,
        )),
        Err(e) => {
            tracing::warn!(file = %original.display(), error = %e, "text extraction failed");
            None
        }
    }
}

/// Store a new document for the tenant whose uploads live in `uploads_dir`,
/// reading the file from `request.file`.
///
/// Extraction failures are logged and the document is kept without a
/// cached payload. If the database insert fails the copied file is removed.
pub async fn upload_document<S: Store + ?Sized>(
    store: &S,
    uploads_dir: &Path,
    extractor: &dyn TextExtractor,
    settings: &ExtractionConfig,
    request: &UploadRequest,
) -> Result<UploadOutcome> {
    let meta = validate(request)?;
    let bytes = std::fs::read(&request.file)
        .with_context(|| format!("Failed to read {}", request.file.display()))?;
    ingest(store, uploads_dir, extractor, settings, meta, &request.file, &bytes).await
}

/// Like [`upload_document`], for content already in memory (an HTTP upload).
pub async fn upload_bytes<S: Store + ?Sized>(
    store: &S,
    uploads_dir: &Path,
    extractor: &dyn TextExtractor,
    settings: &ExtractionConfig,
    request: &UploadRequest,
    bytes: &[u8],
) -> Result<UploadOutcome> {
    let meta = validate(request)?;
    ingest(store, uploads_dir, extractor, settings, meta, &request.file, bytes).await
}

async fn ingest<S: Store + ?Sized>(
    store: &S,
    uploads_dir: &Path,
    extractor: &dyn TextExtractor,
    settings: &ExtractionConfig,
    meta: UploadMeta,
    original: &Path,
    bytes: &[u8],
) -> Result<UploadOutcome> {
    let (relative, target) = store_file(uploads_dir, &meta.doc_type, original, bytes)?;
    let extraction = extract_payload(extractor, settings, &target, original);

    let doc = NewDocument {
        doc_type: meta.doc_type,
        number: meta.number,
        date: meta.date,
        supplier: meta.supplier,
        file_path: relative.clone(),
        file_hash: Some(sha256_hex(bytes)),
        extraction: extraction.clone(),
        codes: meta.codes,
    };

    let document_id = match store.insert_document(&doc).await {
        Ok(id) => id,
        Err(e) => {
            remove_orphan(&target);
            return Err(e);
        }
    };

    tracing::info!(
        document_id,
        file = %relative,
        codes = doc.codes.len(),
        extracted = extraction.is_some(),
        "document uploaded"
    );

    Ok(UploadOutcome {
        document_id,
        file_path: relative,
        codes_count: doc.codes.len(),
        extracted: extraction.is_some(),
        auto_codes: extraction.map(|p| p.auto_codes).unwrap_or_default(),
    })
}

/// Replace the file behind document `id` with `bytes`.
///
/// The new file is stored and extracted like an upload, the record is
/// pointed at it, and the previous file is removed. The cached payload is
/// replaced, or cleared when nothing could be extracted.
#[allow(clippy::too_many_arguments)]
pub async fn replace_document_file<S: Store + ?Sized>(
    store: &S,
    uploads_dir: &Path,
    extractor: &dyn TextExtractor,
    settings: &ExtractionConfig,
    id: i64,
    original: &Path,
    bytes: &[u8],
) -> Result<FileReplacement> {
    let doc = store
        .get_document(id)
        .await?
        .ok_or(DocumentError::NotFound(id))?;
    let doc_type = sanitize_code(&doc.summary.doc_type);
    if doc_type.is_empty() {
        return Err(DocumentError::Invalid(format!("document {id} has no tipo")).into());
    }

    let (relative, target) = store_file(uploads_dir, &doc_type, original, bytes)?;
    let extraction = extract_payload(extractor, settings, &target, original);
    let file = StoredFile {
        file_path: relative.clone(),
        file_hash: Some(sha256_hex(bytes)),
        extraction: extraction.clone(),
    };

    let previous = match store.replace_file(id, &file).await {
        Ok(Some(previous)) => previous,
        Ok(None) => {
            remove_orphan(&target);
            return Err(DocumentError::NotFound(id).into());
        }
        Err(e) => {
            remove_orphan(&target);
            return Err(e);
        }
    };

    match resolve_upload_path(uploads_dir, &previous) {
        Some(path) if path.is_file() => {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(document_id = id, path = %path.display(), error = %e, "could not remove replaced file");
            }
        }
        _ => tracing::warn!(document_id = id, file = %previous, "replaced file missing"),
    }

    tracing::info!(
        document_id = id,
        file = %relative,
        extracted = extraction.is_some(),
        "document file replaced"
    );

    Ok(FileReplacement {
        document_id: id,
        file_path: relative,
        extracted: extraction.is_some(),
        auto_codes: extraction.map(|p| p.auto_codes).unwrap_or_default(),
    })
}

/// Whether a document still needs its text cached.
///
/// Documents marked with a missing-file error are only retried when forced.
fn needs_reindex(doc: &CandidateDocument, min_text_len: usize) -> bool {
    match doc.payload.as_deref().and_then(ExtractionPayload::parse) {
        None => true,
        Some(p) if p.is_error() => false,
        Some(p) => p.text.chars().count() < min_text_len,
    }
}

fn has_short_text(doc: &CandidateDocument, min_text_len: usize) -> bool {
    ExtractionPayload::cached_text(doc.payload.as_deref())
        .map_or(true, |t| t.chars().count() < min_text_len)
}

/// Find the file behind a stored path, trying the layouts older uploads
/// used. Returns the file, or every location tried.
fn locate_file(uploads_dir: &Path, doc: &CandidateDocument) -> Result<PathBuf, Vec<String>> {
    let stored = doc.summary.file_path.as_str();
    let doc_type = doc.summary.doc_type.as_str();
    let basename = Path::new(stored)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let candidates = [
        stored.to_string(),
        format!("{doc_type}/{basename}"),
        format!("{doc_type}/{stored}"),
    ];
    let mut tried = Vec::new();
    for relative in &candidates {
        tried.push(uploads_dir.join(relative).display().to_string());
        if let Some(path) = resolve_upload_path(uploads_dir, relative) {
            if path.is_file() {
                return Ok(path);
            }
        }
    }

    // Files may carry an extra prefix in front of the stored name.
    if let Some(type_dir) = resolve_upload_path(uploads_dir, doc_type) {
        tried.push(format!("{}/*{}", type_dir.display(), basename));
        if !basename.is_empty() {
            let found = WalkDir::new(&type_dir)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .find(|e| {
                    e.file_type().is_file() && e.file_name().to_string_lossy().ends_with(&basename)
                });
            if let Some(entry) = found {
                return Ok(entry.into_path());
            }
        }
    }
    Err(tried)
}

/// Re-extract text for up to `batch` PDF documents.
///
/// Without `force`, only documents with missing or short cached text are
/// processed. A file that cannot be found gets an error marker so later
/// passes skip it.
pub async fn reindex_documents<S: Store + ?Sized>(
    store: &S,
    uploads_dir: &Path,
    extractor: &dyn TextExtractor,
    settings: &ExtractionConfig,
    force: bool,
    batch: Option<usize>,
) -> Result<ReindexReport> {
    let batch = batch
        .unwrap_or(settings.reindex_batch_default)
        .clamp(1, settings.reindex_batch_max.max(1));

    let selected: Vec<CandidateDocument> = store
        .pdf_documents(None)
        .await?
        .into_iter()
        .filter(|doc| force || needs_reindex(doc, settings.reindex_min_text_len))
        .take(batch)
        .collect();

    let mut report = ReindexReport::default();
    for doc in &selected {
        let id = doc.summary.id;
        let path = match locate_file(uploads_dir, doc) {
            Ok(path) => path,
            Err(tried) => {
                tracing::warn!(document_id = id, "file not found for re-index");
                report
                    .errors
                    .push(format!("#{id}: file not found, tried {}", tried.join(", ")));
                let marker = ExtractionPayload::missing_file(tried, chrono::Utc::now().timestamp());
                store.set_extraction(id, &marker).await?;
                continue;
            }
        };

        match extract_codes_from_pdf(extractor, &path, &settings.pattern) {
            Ok(found) => {
                let mut payload =
                    ExtractionPayload::from_text(&found.text, found.codes, settings.reindex_text_limit);
                payload.indexed_at = Some(timestamp());
                store.set_extraction(id, &payload).await?;
                report.indexed += 1;
            }
            Err(e) => {
                tracing::warn!(document_id = id, error = %e, "re-index extraction failed");
                report.errors.push(format!("#{id}: {e}"));
            }
        }
    }

    report.pending = store
        .pdf_documents(None)
        .await?
        .iter()
        .filter(|doc| has_short_text(doc, settings.reindex_min_text_len))
        .count();

    tracing::info!(
        indexed = report.indexed,
        errors = report.errors.len(),
        pending = report.pending,
        "re-index pass finished"
    );
    Ok(report)
}

/// `kino upload`.
#[allow(clippy::too_many_arguments)]
pub async fn run_upload(
    config: &Config,
    tenant_code: &str,
    file: PathBuf,
    doc_type: String,
    number: String,
    date: String,
    supplier: Option<String>,
    codes: Option<String>,
) -> Result<()> {
    let tenant = open_tenant(config, tenant_code).await?;
    let request = UploadRequest {
        file,
        doc_type,
        number,
        date,
        supplier,
        codes: codes.as_deref().map(parse_code_list).unwrap_or_default(),
    };
    let result = upload_document(
        &tenant.store,
        &tenant.paths.uploads_dir,
        &FileTextExtractor,
        &config.extraction,
        &request,
    )
    .await;
    tenant.close().await;
    let outcome = result?;

    println!("Document {} stored as {}", outcome.document_id, outcome.file_path);
    println!("  codes: {}", outcome.codes_count);
    if outcome.extracted {
        println!("  text extracted, auto codes: {}", outcome.auto_codes.len());
    } else {
        println!("  no text extracted");
    }
    Ok(())
}

/// `kino reindex`.
pub async fn run_reindex(
    config: &Config,
    tenant_code: &str,
    force: bool,
    batch: Option<usize>,
) -> Result<()> {
    let tenant = open_tenant(config, tenant_code).await?;
    let result = reindex_documents(
        &tenant.store,
        &tenant.paths.uploads_dir,
        &FileTextExtractor,
        &config.extraction,
        force,
        batch,
    )
    .await;
    tenant.close().await;
    let report = result?;

    println!("Re-index {}", tenant_code);
    println!("  indexed: {}", report.indexed);
    println!("  errors:  {}", report.errors.len());
    for error in &report.errors {
        println!("    {}", error);
    }
    println!("  pending: {}", report.pending);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kino_core::extract::ExtractError;
    use kino_core::store::memory::InMemoryStore;
    use tempfile::TempDir;

    /// Reads every file as plain text, whatever its extension.
    struct PlainText;

    impl TextExtractor for PlainText {
        fn extract(&self, path: &Path) -> Result<String, ExtractError> {
            std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    fn request(file: PathBuf, codes: &[&str]) -> UploadRequest {
        UploadRequest {
            file,
            doc_type: "Manifiestos".into(),
            number: " M-001 ".into(),
            date: "2024-05-01".into(),
            supplier: Some("  ".into()),
            codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn settings() -> ExtractionConfig {
        let mut settings = ExtractionConfig::default();
        settings.pattern.prefix = "Ref:".into();
        settings
    }

    #[tokio::test]
    async fn upload_copies_hashes_and_caches_text() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("scan.PDF");
        std::fs::write(&source, "Ref: AB1234/ Ref: CD5678/").unwrap();
        let uploads = tmp.path().join("uploads");
        let store = InMemoryStore::new();

        let outcome = upload_document(
            &store,
            &uploads,
            &PlainText,
            &settings(),
            &request(source, &[" X1 ", "X1", "", "Y2"]),
        )
        .await
        .unwrap();

        assert!(outcome.file_path.starts_with("manifiestos/manifiestos_"));
        assert!(outcome.file_path.ends_with(".pdf"));
        assert!(uploads.join(&outcome.file_path).is_file());
        assert_eq!(outcome.codes_count, 2);
        assert!(outcome.extracted);
        assert_eq!(outcome.auto_codes, vec!["AB1234", "CD5678"]);

        let doc = store.get_document(outcome.document_id).await.unwrap().unwrap();
        assert_eq!(doc.summary.number, "M-001");
        assert_eq!(doc.summary.supplier, None);
        assert_eq!(doc.file_hash.as_deref().map(str::len), Some(64));
        assert_eq!(doc.extraction.unwrap().text, "Ref: AB1234/ Ref: CD5678/");
    }

    #[tokio::test]
    async fn upload_rejects_bad_date() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.pdf");
        std::fs::write(&source, "x").unwrap();
        let mut req = request(source, &[]);
        req.date = "01/05/2024".into();

        let err = upload_document(&InMemoryStore::new(), tmp.path(), &PlainText, &settings(), &req)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fecha"));
    }

    #[tokio::test]
    async fn upload_keeps_document_when_extraction_fails() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("blank.txt");
        std::fs::write(&source, "   ").unwrap();
        let store = InMemoryStore::new();

        let outcome = upload_document(&store, tmp.path(), &PlainText, &settings(), &request(source, &["Z9"]))
            .await
            .unwrap();
        assert!(!outcome.extracted);
        let doc = store.get_document(outcome.document_id).await.unwrap().unwrap();
        assert!(doc.extraction.is_none());
        assert_eq!(doc.codes.len(), 1);
    }

    #[tokio::test]
    async fn upload_bytes_uses_name_only_for_extension() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let mut req = request(PathBuf::from("Scan.TXT"), &["A1"]);
        req.doc_type = "facturas".into();

        let outcome = upload_bytes(&store, tmp.path(), &PlainText, &settings(), &req, b"Ref: QQ1234/")
            .await
            .unwrap();
        assert!(outcome.file_path.starts_with("facturas/facturas_"));
        assert!(outcome.file_path.ends_with(".txt"));
        assert_eq!(outcome.auto_codes, vec!["QQ1234"]);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join(&outcome.file_path)).unwrap(),
            "Ref: QQ1234/"
        );

        req.number = "  ".into();
        let err = upload_bytes(&store, tmp.path(), &PlainText, &settings(), &req, b"x")
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<DocumentError>(), Some(DocumentError::Invalid(_))));
    }

    #[tokio::test]
    async fn replacing_file_swaps_path_and_cache() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("first.txt");
        std::fs::write(&source, "Ref: AA1111/").unwrap();
        let uploads = tmp.path().join("uploads");
        let store = InMemoryStore::new();
        let first = upload_document(&store, &uploads, &PlainText, &settings(), &request(source, &["X1"]))
            .await
            .unwrap();

        let replaced = replace_document_file(
            &store,
            &uploads,
            &PlainText,
            &settings(),
            first.document_id,
            Path::new("second.txt"),
            b"Ref: BB2222/",
        )
        .await
        .unwrap();

        assert_ne!(replaced.file_path, first.file_path);
        assert!(!uploads.join(&first.file_path).exists());
        assert!(uploads.join(&replaced.file_path).is_file());
        assert_eq!(replaced.auto_codes, vec!["BB2222"]);

        let doc = store.get_document(first.document_id).await.unwrap().unwrap();
        assert_eq!(doc.summary.file_path, replaced.file_path);
        assert_eq!(doc.extraction.unwrap().text, "Ref: BB2222/");
        let codes: Vec<&str> = doc.codes.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["X1"]);

        // No extractable text clears the old cache.
        let blank = replace_document_file(
            &store,
            &uploads,
            &PlainText,
            &settings(),
            first.document_id,
            Path::new("scan.jpg"),
            b"\xff\xd8",
        )
        .await
        .unwrap();
        assert!(!blank.extracted);
        let doc = store.get_document(first.document_id).await.unwrap().unwrap();
        assert!(doc.extraction.is_none());
        assert!(!uploads.join(&replaced.file_path).exists());
    }

    #[tokio::test]
    async fn replacing_file_of_unknown_document_stores_nothing() {
        let tmp = TempDir::new().unwrap();
        let err = replace_document_file(
            &InMemoryStore::new(),
            tmp.path(),
            &PlainText,
            &settings(),
            42,
            Path::new("a.txt"),
            b"x",
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocumentError>(),
            Some(DocumentError::NotFound(42))
        ));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    fn long_text(code: &str) -> String {
        format!("Ref: {code}/ {}", "lorem ipsum ".repeat(20))
    }

    #[tokio::test]
    async fn reindex_fills_missing_text_and_marks_missing_files() {
        let tmp = TempDir::new().unwrap();
        let uploads = tmp.path().to_path_buf();
        std::fs::create_dir_all(uploads.join("facturas")).unwrap();
        // Stored without the type directory and with an extra prefix on disk.
        std::fs::write(uploads.join("facturas/legacy_f1.pdf"), long_text("QW1234")).unwrap();

        let store = InMemoryStore::new();
        let found = store
            .insert_document(&NewDocument {
                doc_type: "facturas".into(),
                number: "F1".into(),
                date: "2024-01-01".into(),
                supplier: None,
                file_path: "f1.pdf".into(),
                file_hash: None,
                extraction: None,
                codes: vec![],
            })
            .await
            .unwrap();
        let missing = store
            .insert_document(&NewDocument {
                doc_type: "facturas".into(),
                number: "F2".into(),
                date: "2024-01-02".into(),
                supplier: None,
                file_path: "facturas/gone.pdf".into(),
                file_hash: None,
                extraction: None,
                codes: vec![],
            })
            .await
            .unwrap();

        let report = reindex_documents(&store, &uploads, &PlainText, &settings(), false, None)
            .await
            .unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.pending, 1);

        let doc = store.get_document(found).await.unwrap().unwrap();
        let payload = doc.extraction.unwrap();
        assert_eq!(payload.auto_codes, vec!["QW1234"]);
        assert!(payload.indexed_at.is_some());

        let marker = store.get_document(missing).await.unwrap().unwrap().extraction.unwrap();
        assert!(marker.is_error());
        assert!(marker.paths_tried.len() >= 3);

        // The marked document is not retried without force.
        let again = reindex_documents(&store, &uploads, &PlainText, &settings(), false, None)
            .await
            .unwrap();
        assert_eq!(again.indexed, 0);
        assert!(again.errors.is_empty());
    }

    #[test]
    fn needs_reindex_rules() {
        let doc = |payload: Option<&str>| CandidateDocument {
            summary: kino_core::models::DocumentSummary {
                id: 1,
                doc_type: "facturas".into(),
                number: "F".into(),
                date: "2024-01-01".into(),
                supplier: None,
                file_path: "facturas/f.pdf".into(),
            },
            codes: vec![],
            payload: payload.map(str::to_string),
        };
        assert!(needs_reindex(&doc(None), 100));
        assert!(needs_reindex(&doc(Some("[]")), 100));
        assert!(needs_reindex(&doc(Some(r#"{"text":"short"}"#)), 100));
        assert!(!needs_reindex(&doc(Some(r#"{"error":"file not found"}"#)), 100));
        assert!(!needs_reindex(&doc(Some(r#"{"text":"long enough"}"#)), 5));
    }
}
