//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Documents and codes live in `Vec`s behind a single `std::sync::RwLock`.
//! Case-insensitive matching uses full Unicode case folding, where the
//! SQLite store's `LIKE` only folds ASCII.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{
    CandidateDocument, Code, CodeHit, Document, DocumentListing, DocumentPage, DocumentSummary,
    DocumentUpdate, ExtractionPayload, ListQuery, NewDocument, RecentDocument, SearchStats,
    StoredFile,
};
use crate::text::{clean_codes, find_ignore_case};

use super::Store;

#[derive(Debug, Clone)]
struct StoredDoc {
    summary: DocumentSummary,
    file_hash: Option<String>,
    created_at: String,
    payload: Option<String>,
}

#[derive(Default)]
struct Inner {
    docs: Vec<StoredDoc>,
    codes: Vec<Code>,
    next_doc_id: i64,
    next_code_id: i64,
}

impl Inner {
    fn codes_of(&self, doc_id: i64) -> Vec<String> {
        self.codes
            .iter()
            .filter(|c| c.document_id == doc_id)
            .map(|c| c.code.clone())
            .collect()
    }

    fn candidate(&self, doc: &StoredDoc) -> CandidateDocument {
        CandidateDocument {
            summary: doc.summary.clone(),
            codes: self.codes_of(doc.summary.id),
            payload: doc.payload.clone(),
        }
    }

    /// Documents ordered by date desc, then id desc.
    fn ordered(&self) -> Vec<&StoredDoc> {
        let mut docs: Vec<&StoredDoc> = self.docs.iter().collect();
        docs.sort_by(|a, b| {
            b.summary
                .date
                .cmp(&a.summary.date)
                .then(b.summary.id.cmp(&a.summary.id))
        });
        docs
    }

    fn push_codes(&mut self, doc_id: i64, codes: &[String]) {
        for code in clean_codes(codes) {
            self.next_code_id += 1;
            self.codes.push(Code {
                id: self.next_code_id,
                document_id: doc_id,
                code,
                description: None,
                quantity: None,
                unit_value: None,
                validated: false,
                alert: None,
            });
        }
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a document's raw cached payload, bypassing serialization.
    /// Lets tests plant malformed or legacy cache blobs.
    pub fn set_raw_payload(&self, id: i64, raw: Option<&str>) -> Result<()> {
        let mut inner = self.write()?;
        let doc = inner
            .docs
            .iter_mut()
            .find(|d| d.summary.id == id)
            .ok_or_else(|| anyhow!("document {id} not found"))?;
        doc.payload = raw.map(str::to_string);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_document(&self, doc: &NewDocument) -> Result<i64> {
        let payload = doc.extraction.as_ref().map(|p| p.to_json()).transpose()?;
        let mut inner = self.write()?;
        inner.next_doc_id += 1;
        let id = inner.next_doc_id;
        inner.docs.push(StoredDoc {
            summary: DocumentSummary {
                id,
                doc_type: doc.doc_type.clone(),
                number: doc.number.clone(),
                date: doc.date.clone(),
                supplier: doc.supplier.clone(),
                file_path: doc.file_path.clone(),
            },
            file_hash: doc.file_hash.clone(),
            created_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            payload,
        });
        inner.push_codes(id, &doc.codes);
        Ok(id)
    }

    async fn update_document(&self, id: i64, update: &DocumentUpdate) -> Result<bool> {
        let mut inner = self.write()?;
        let Some(doc) = inner.docs.iter_mut().find(|d| d.summary.id == id) else {
            return Ok(false);
        };
        doc.summary.doc_type = update.doc_type.clone();
        doc.summary.number = update.number.clone();
        doc.summary.date = update.date.clone();
        doc.summary.supplier = update.supplier.clone();
        inner.codes.retain(|c| c.document_id != id);
        inner.push_codes(id, &update.codes);
        Ok(true)
    }

    async fn set_extraction(&self, id: i64, payload: &ExtractionPayload) -> Result<()> {
        self.set_raw_payload(id, Some(&payload.to_json()?))
    }

    async fn replace_file(&self, id: i64, file: &StoredFile) -> Result<Option<String>> {
        let payload = file.extraction.as_ref().map(|p| p.to_json()).transpose()?;
        let mut inner = self.write()?;
        let Some(doc) = inner.docs.iter_mut().find(|d| d.summary.id == id) else {
            return Ok(None);
        };
        doc.file_hash = file.file_hash.clone();
        doc.payload = payload;
        Ok(Some(std::mem::replace(
            &mut doc.summary.file_path,
            file.file_path.clone(),
        )))
    }

    async fn delete_document(&self, id: i64) -> Result<Option<DocumentSummary>> {
        let mut inner = self.write()?;
        let Some(pos) = inner.docs.iter().position(|d| d.summary.id == id) else {
            return Ok(None);
        };
        let removed = inner.docs.remove(pos);
        inner.codes.retain(|c| c.document_id != id);
        Ok(Some(removed.summary))
    }

    async fn set_code_validated(&self, code_id: i64, validated: bool) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.codes.iter_mut().find(|c| c.id == code_id) {
            Some(code) => {
                code.validated = validated;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let inner = self.read()?;
        Ok(inner.docs.iter().find(|d| d.summary.id == id).map(|d| Document {
            summary: d.summary.clone(),
            file_hash: d.file_hash.clone(),
            created_at: Some(d.created_at.clone()),
            status: Some("pendiente".to_string()),
            notes: None,
            extraction: d.payload.as_deref().and_then(ExtractionPayload::parse),
            codes: inner
                .codes
                .iter()
                .filter(|c| c.document_id == id)
                .cloned()
                .collect(),
        }))
    }

    async fn list_documents(&self, query: &ListQuery) -> Result<DocumentPage> {
        let query = query.normalized();
        let inner = self.read()?;
        let matching: Vec<&StoredDoc> = inner
            .ordered()
            .into_iter()
            .filter(|d| query.doc_type.as_deref().map_or(true, |t| d.summary.doc_type == t))
            .collect();
        let data = matching
            .iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .map(|d| DocumentListing {
                summary: d.summary.clone(),
                codes: inner.codes_of(d.summary.id),
            })
            .collect();
        Ok(DocumentPage::new(matching.len() as i64, &query, data))
    }

    async fn cached_text_candidates(&self, limit: i64) -> Result<Vec<CandidateDocument>> {
        let inner = self.read()?;
        Ok(inner
            .ordered()
            .into_iter()
            .filter(|d| d.payload.as_deref().is_some_and(|p| !p.is_empty()))
            .take(limit.max(0) as usize)
            .map(|d| inner.candidate(d))
            .collect())
    }

    async fn find_by_code(&self, term: &str) -> Result<Vec<CodeHit>> {
        let inner = self.read()?;
        let mut hits = Vec::new();
        for doc in inner.ordered() {
            let mut seen = HashSet::new();
            for code in inner.codes.iter().filter(|c| c.document_id == doc.summary.id) {
                if find_ignore_case(&code.code, term).is_some() && seen.insert(code.code.as_str()) {
                    hits.push(CodeHit {
                        summary: doc.summary.clone(),
                        matched_code: code.code.clone(),
                    });
                }
            }
        }
        Ok(hits)
    }

    async fn suggest_codes(&self, term: &str, limit: i64) -> Result<Vec<String>> {
        let inner = self.read()?;
        let distinct: BTreeSet<&str> = inner
            .codes
            .iter()
            .map(|c| c.code.as_str())
            .filter(|c| c.starts_with(term))
            .collect();
        Ok(distinct
            .into_iter()
            .take(limit.max(0) as usize)
            .map(str::to_string)
            .collect())
    }

    async fn pdf_documents(&self, limit: Option<i64>) -> Result<Vec<CandidateDocument>> {
        let inner = self.read()?;
        let limit = limit.map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(inner
            .ordered()
            .into_iter()
            .filter(|d| d.summary.is_pdf())
            .take(limit)
            .map(|d| inner.candidate(d))
            .collect())
    }

    async fn fulltext_candidates(&self, query: &str, limit: i64) -> Result<Vec<CandidateDocument>> {
        let inner = self.read()?;
        Ok(inner
            .ordered()
            .into_iter()
            .filter(|d| {
                d.payload
                    .as_deref()
                    .is_some_and(|p| find_ignore_case(p, query).is_some())
                    || find_ignore_case(&d.summary.number, query).is_some()
            })
            .take(limit.max(0) as usize)
            .map(|d| inner.candidate(d))
            .collect())
    }

    async fn stats(&self) -> Result<SearchStats> {
        let inner = self.read()?;
        let mut documents_by_type = BTreeMap::new();
        for doc in &inner.docs {
            *documents_by_type
                .entry(doc.summary.doc_type.clone())
                .or_insert(0) += 1;
        }
        let unique: BTreeSet<&str> = inner.codes.iter().map(|c| c.code.as_str()).collect();
        Ok(SearchStats {
            total_documents: inner.docs.len() as i64,
            total_codes: inner.codes.len() as i64,
            unique_codes: unique.len() as i64,
            validated_codes: inner.codes.iter().filter(|c| c.validated).count() as i64,
            documents_by_type,
            recent_documents: inner
                .ordered()
                .into_iter()
                .take(5)
                .map(|d| RecentDocument {
                    id: d.summary.id,
                    doc_type: d.summary.doc_type.clone(),
                    number: d.summary.number.clone(),
                    date: d.summary.date.clone(),
                })
                .collect(),
        })
    }
}
