//! Core data models used throughout KINO-TRACE.
//!
//! Field names are English in Rust; serde renames keep the JSON shape
//! (`tipo`, `numero`, `fecha`, ...) that existing clients consume.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

/// Metadata columns shared by every document-shaped result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: i64,
    #[serde(rename = "tipo")]
    pub doc_type: String,
    #[serde(rename = "numero")]
    pub number: String,
    /// Calendar date, `YYYY-MM-DD`.
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "proveedor")]
    pub supplier: Option<String>,
    /// Path relative to the tenant's upload root.
    #[serde(rename = "ruta_archivo")]
    pub file_path: String,
}

impl DocumentSummary {
    /// Whether the stored file is a PDF (extension compared case-insensitively).
    pub fn is_pdf(&self) -> bool {
        self.file_path.to_ascii_lowercase().ends_with(".pdf")
    }

    /// Resolve the stored file under `uploads_root`.
    ///
    /// Returns `None` for absolute paths or paths that climb out of the
    /// upload root.
    pub fn stored_file(&self, uploads_root: &Path) -> Option<PathBuf> {
        resolve_upload_path(uploads_root, &self.file_path)
    }
}

/// Join a stored relative path onto an upload root, refusing escapes.
pub fn resolve_upload_path(uploads_root: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if relative.is_empty() {
        return None;
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return None,
        }
    }
    Some(uploads_root.join(rel))
}

/// Cached extraction payload stored alongside a document.
///
/// Persisted as a JSON object in `documentos.datos_extraidos`. Besides the
/// extracted `text` and the `auto_codes` detected at ingestion, a re-index
/// pass may record `indexed_at`, or an `error` marker when the source file
/// could not be found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auto_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths_tried: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExtractionPayload {
    /// Build a payload from freshly extracted text, keeping at most
    /// `max_chars` characters.
    pub fn from_text(text: &str, auto_codes: Vec<String>, max_chars: usize) -> Self {
        Self {
            text: crate::text::truncate_chars(text, max_chars).to_string(),
            auto_codes,
            ..Self::default()
        }
    }

    /// Marker stored when a re-index pass cannot locate the source file.
    pub fn missing_file(paths_tried: Vec<String>, timestamp: i64) -> Self {
        Self {
            error: Some("file not found".to_string()),
            paths_tried,
            timestamp: Some(timestamp),
            ..Self::default()
        }
    }

    /// Parse a stored payload. Anything that is not a JSON object of the
    /// expected shape yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<serde_json::Value>(raw).ok()? {
            value @ serde_json::Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    /// The searchable text of a stored payload, or `None` when the payload
    /// is absent, not an object or carries no text.
    ///
    /// Only the `text` key is read, so odd sibling fields in legacy rows do
    /// not hide otherwise usable text.
    pub fn cached_text(raw: Option<&str>) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(raw?).ok()?;
        value
            .get("text")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One identifying token attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub id: i64,
    #[serde(rename = "documento_id")]
    pub document_id: i64,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "cantidad")]
    pub quantity: Option<i64>,
    #[serde(rename = "valor_unitario")]
    pub unit_value: Option<f64>,
    #[serde(rename = "validado")]
    pub validated: bool,
    #[serde(rename = "alerta")]
    pub alert: Option<String>,
}

/// Full document record as returned by `get`.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    #[serde(rename = "hash_archivo")]
    pub file_hash: Option<String>,
    #[serde(rename = "fecha_creacion")]
    pub created_at: Option<String>,
    #[serde(rename = "estado")]
    pub status: Option<String>,
    #[serde(rename = "notas")]
    pub notes: Option<String>,
    /// Decoded cache payload; `None` when missing or malformed.
    #[serde(rename = "datos_extraidos")]
    pub extraction: Option<ExtractionPayload>,
    pub codes: Vec<Code>,
}

/// Input for inserting a document and its codes.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub doc_type: String,
    pub number: String,
    pub date: String,
    pub supplier: Option<String>,
    pub file_path: String,
    pub file_hash: Option<String>,
    pub extraction: Option<ExtractionPayload>,
    pub codes: Vec<String>,
}

/// A newly stored file replacing a document's previous one.
///
/// `extraction` replaces the cached payload; `None` clears it.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_path: String,
    pub file_hash: Option<String>,
    pub extraction: Option<ExtractionPayload>,
}

/// Metadata update; the code list replaces the existing one.
#[derive(Debug, Clone)]
pub struct DocumentUpdate {
    pub doc_type: String,
    pub number: String,
    pub date: String,
    pub supplier: Option<String>,
    pub codes: Vec<String>,
}

/// A document as seen by the text-scanning searches: metadata, its full
/// code list and the raw cached payload.
#[derive(Debug, Clone)]
pub struct CandidateDocument {
    pub summary: DocumentSummary,
    pub codes: Vec<String>,
    pub payload: Option<String>,
}

/// One (document, matching code) row from a code lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeHit {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    #[serde(rename = "codigo_encontrado")]
    pub matched_code: String,
}

/// A document row in a listing, with its codes.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListing {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: i64,
    pub per_page: i64,
    pub doc_type: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
            doc_type: None,
        }
    }
}

/// Largest page size a listing will return.
pub const MAX_PER_PAGE: i64 = 500;

impl ListQuery {
    /// Clamp page to at least 1 and page size to `1..=MAX_PER_PAGE`.
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
            doc_type: self.doc_type.clone().filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page.max(1))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentPage {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub last_page: i64,
    pub data: Vec<DocumentListing>,
}

impl DocumentPage {
    pub fn new(total: i64, query: &ListQuery, data: Vec<DocumentListing>) -> Self {
        let per_page = query.per_page.max(1);
        Self {
            total,
            page: query.page.max(1),
            per_page,
            last_page: total / per_page + i64::from(total % per_page != 0),
            data,
        }
    }
}

/// Lightweight row for the dashboard's recent-documents list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentDocument {
    pub id: i64,
    #[serde(rename = "tipo")]
    pub doc_type: String,
    #[serde(rename = "numero")]
    pub number: String,
    #[serde(rename = "fecha")]
    pub date: String,
}

/// Aggregate counts shown on the search dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchStats {
    pub total_documents: i64,
    pub total_codes: i64,
    pub unique_codes: i64,
    pub validated_codes: i64,
    pub documents_by_type: BTreeMap<String, i64>,
    pub recent_documents: Vec<RecentDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_with_null_text_parses_as_empty() {
        let p = ExtractionPayload::parse(r#"{"text": null, "auto_codes": null}"#).unwrap();
        assert!(p.text.is_empty());
        assert!(p.auto_codes.is_empty());
    }

    #[test]
    fn cached_text_rejects_malformed_and_empty() {
        assert_eq!(ExtractionPayload::cached_text(None), None);
        assert_eq!(ExtractionPayload::cached_text(Some("{not json")), None);
        assert_eq!(ExtractionPayload::cached_text(Some("[]")), None);
        assert_eq!(ExtractionPayload::cached_text(Some(r#"{"text": ""}"#)), None);
        assert_eq!(
            ExtractionPayload::cached_text(Some(r#"{"auto_codes": ["A"]}"#)),
            None
        );
        assert_eq!(
            ExtractionPayload::cached_text(Some(r#"{"text": "hello"}"#)).as_deref(),
            Some("hello")
        );
        assert_eq!(ExtractionPayload::cached_text(Some(r#"{"text": 7}"#)), None);
    }

    #[test]
    fn cached_text_ignores_unexpected_sibling_fields() {
        let raw = r#"{"text": "hello", "timestamp": "yesterday", "auto_codes": "A1"}"#;
        assert_eq!(ExtractionPayload::parse(raw), None);
        assert_eq!(
            ExtractionPayload::cached_text(Some(raw)).as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn from_text_truncates_on_char_boundary() {
        let p = ExtractionPayload::from_text("añoñoño", vec![], 3);
        assert_eq!(p.text, "año");
    }

    #[test]
    fn missing_file_marker_serializes_error_fields() {
        let p = ExtractionPayload::missing_file(vec!["a.pdf".into()], 42);
        let json = p.to_json().unwrap();
        assert!(json.contains("\"error\":\"file not found\""));
        assert!(json.contains("\"paths_tried\":[\"a.pdf\"]"));
        assert!(ExtractionPayload::parse(&json).unwrap().is_error());
    }

    #[test]
    fn upload_path_rejects_escapes() {
        let root = Path::new("/data/acme/uploads");
        assert_eq!(
            resolve_upload_path(root, "facturas/f_1.pdf"),
            Some(PathBuf::from("/data/acme/uploads/facturas/f_1.pdf"))
        );
        assert_eq!(resolve_upload_path(root, "../other/x.pdf"), None);
        assert_eq!(resolve_upload_path(root, "/etc/passwd"), None);
        assert_eq!(resolve_upload_path(root, ""), None);
    }

    #[test]
    fn page_math() {
        let q = ListQuery {
            page: 2,
            per_page: 10,
            doc_type: None,
        };
        assert_eq!(q.offset(), 10);
        let page = DocumentPage::new(21, &q, vec![]);
        assert_eq!(page.last_page, 3);
        assert_eq!(DocumentPage::new(0, &q, vec![]).last_page, 0);
    }

    #[test]
    fn page_math_saturates_on_huge_input() {
        let q = ListQuery {
            page: i64::MAX,
            per_page: i64::MAX,
            doc_type: None,
        }
        .normalized();
        assert_eq!(q.per_page, MAX_PER_PAGE);
        assert_eq!(q.offset(), i64::MAX);

        let page = DocumentPage::new(i64::MAX, &q, vec![]);
        assert_eq!(page.page, i64::MAX);
        assert_eq!(page.last_page, i64::MAX / MAX_PER_PAGE + 1);
    }
}
