//! Document CRUD over a tenant store.
//!
//! Thin wrappers around [`Store`] that validate input, turn missing rows
//! into [`DocumentError`]s and keep the upload tree in step with the
//! database.

use std::path::Path;

use anyhow::Result;

use kino_core::models::{Document, DocumentPage, DocumentSummary, DocumentUpdate, ListQuery};
use kino_core::store::Store;
use kino_core::text::{clean_codes, dedup};

use crate::tenant::sanitize_code;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(i64),
    #[error("code not found: {0}")]
    CodeNotFound(i64),
    #[error("invalid document: {0}")]
    Invalid(String),
}

pub async fn list_documents<S: Store + ?Sized>(store: &S, query: &ListQuery) -> Result<DocumentPage> {
    store.list_documents(query).await
}

pub async fn get_document<S: Store + ?Sized>(store: &S, id: i64) -> Result<Document> {
    match store.get_document(id).await? {
        Some(doc) => Ok(doc),
        None => Err(DocumentError::NotFound(id).into()),
    }
}

/// Update metadata and replace the code list.
pub async fn update_document<S: Store + ?Sized>(
    store: &S,
    id: i64,
    update: &DocumentUpdate,
) -> Result<()> {
    let doc_type = sanitize_code(&update.doc_type);
    let number = update.number.trim();
    let date = update.date.trim();
    if doc_type.is_empty() || number.is_empty() || date.is_empty() {
        return Err(DocumentError::Invalid("tipo, numero and fecha are required".into()).into());
    }
    if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(DocumentError::Invalid(format!("fecha must be YYYY-MM-DD, got {date}")).into());
    }

    let normalized = DocumentUpdate {
        doc_type,
        number: number.to_string(),
        date: date.to_string(),
        supplier: update
            .supplier
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        codes: dedup(clean_codes(&update.codes)),
    };
    if !store.update_document(id, &normalized).await? {
        return Err(DocumentError::NotFound(id).into());
    }
    tracing::info!(document_id = id, codes = normalized.codes.len(), "document updated");
    Ok(())
}

/// Delete a document and, best effort, its stored file.
pub async fn delete_document<S: Store + ?Sized>(
    store: &S,
    uploads_dir: &Path,
    id: i64,
) -> Result<DocumentSummary> {
    let summary = store
        .delete_document(id)
        .await?
        .ok_or(DocumentError::NotFound(id))?;

    match summary.stored_file(uploads_dir) {
        Some(path) if path.is_file() => {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(document_id = id, path = %path.display(), error = %e, "could not remove stored file");
            }
        }
        _ => tracing::warn!(document_id = id, file = %summary.file_path, "stored file missing"),
    }
    tracing::info!(document_id = id, "document deleted");
    Ok(summary)
}

pub async fn set_code_validated<S: Store + ?Sized>(
    store: &S,
    code_id: i64,
    validated: bool,
) -> Result<()> {
    if !store.set_code_validated(code_id, validated).await? {
        return Err(DocumentError::CodeNotFound(code_id).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kino_core::models::NewDocument;
    use kino_core::store::memory::InMemoryStore;
    use tempfile::TempDir;

    async fn seeded(store: &InMemoryStore, file_path: &str) -> i64 {
        store
            .insert_document(&NewDocument {
                doc_type: "facturas".into(),
                number: "F-1".into(),
                date: "2024-01-01".into(),
                supplier: None,
                file_path: file_path.into(),
                file_hash: None,
                extraction: None,
                codes: vec!["A1".into()],
            })
            .await
            .unwrap()
    }

    fn not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<DocumentError>(), Some(DocumentError::NotFound(_)))
    }

    #[tokio::test]
    async fn delete_removes_record_and_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("facturas")).unwrap();
        std::fs::write(tmp.path().join("facturas/f.pdf"), "x").unwrap();
        let store = InMemoryStore::new();
        let id = seeded(&store, "facturas/f.pdf").await;

        let summary = delete_document(&store, tmp.path(), id).await.unwrap();
        assert_eq!(summary.id, id);
        assert!(!tmp.path().join("facturas/f.pdf").exists());

        let err = delete_document(&store, tmp.path(), id).await.unwrap_err();
        assert!(not_found(&err));
    }

    #[tokio::test]
    async fn delete_tolerates_missing_file() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let id = seeded(&store, "facturas/gone.pdf").await;
        delete_document(&store, tmp.path(), id).await.unwrap();
        assert!(store.get_document(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_validates_and_normalizes() {
        let store = InMemoryStore::new();
        let id = seeded(&store, "facturas/f.pdf").await;

        let mut update = DocumentUpdate {
            doc_type: "Declaraciones".into(),
            number: " D-9 ".into(),
            date: "2024-13-40".into(),
            supplier: None,
            codes: vec!["B2".into(), "B2".into(), " ".into()],
        };
        let err = update_document(&store, id, &update).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DocumentError>(), Some(DocumentError::Invalid(_))));

        update.date = "2024-12-31".into();
        update_document(&store, id, &update).await.unwrap();
        let doc = get_document(&store, id).await.unwrap();
        assert_eq!(doc.summary.doc_type, "declaraciones");
        assert_eq!(doc.summary.number, "D-9");
        assert_eq!(doc.codes.len(), 1);

        assert!(not_found(&update_document(&store, 404, &update).await.unwrap_err()));
        assert!(not_found(&get_document(&store, 404).await.unwrap_err()));
    }

    #[tokio::test]
    async fn validating_unknown_code_fails() {
        let store = InMemoryStore::new();
        let err = set_code_validated(&store, 7, true).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DocumentError>(),
            Some(DocumentError::CodeNotFound(7))
        ));
    }
}
