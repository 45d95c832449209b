//! SQLite-backed [`Store`] implementation.
//!
//! One instance per open tenant database. Listings feeding the search
//! engine are ordered `fecha DESC, id DESC`. Code lists are fetched in a
//! second query keyed by document id, preserving insertion order.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use kino_core::models::{
    CandidateDocument, Code, CodeHit, Document, DocumentListing, DocumentPage, DocumentSummary,
    DocumentUpdate, ExtractionPayload, ListQuery, NewDocument, RecentDocument, SearchStats,
    StoredFile,
};
use kino_core::store::Store;
use kino_core::text::clean_codes;

const SUMMARY_COLUMNS: &str = "d.id, d.tipo, d.numero, d.fecha, d.proveedor, d.ruta_archivo";

/// Ids per `IN (...)` list when loading code lists.
const ID_BATCH: usize = 500;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Code lists for the given documents, keyed by document id.
    async fn codes_for(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<String>>> {
        let mut out: HashMap<i64, Vec<String>> = HashMap::new();
        for batch in ids.chunks(ID_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "SELECT documento_id, codigo FROM codigos WHERE documento_id IN ({placeholders}) ORDER BY id"
            );
            let mut query = sqlx::query(&sql);
            for id in batch {
                query = query.bind(*id);
            }
            for row in query.fetch_all(&self.pool).await? {
                out.entry(row.get("documento_id"))
                    .or_default()
                    .push(row.get("codigo"));
            }
        }
        Ok(out)
    }

    /// Attach code lists to candidate rows selected with `SUMMARY_COLUMNS`
    /// plus `datos_extraidos`.
    async fn candidates(&self, rows: Vec<SqliteRow>) -> Result<Vec<CandidateDocument>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.get("id")).collect();
        let mut codes = self.codes_for(&ids).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let summary = summary_from_row(row);
                CandidateDocument {
                    codes: codes.remove(&summary.id).unwrap_or_default(),
                    payload: row.get("datos_extraidos"),
                    summary,
                }
            })
            .collect())
    }
}

fn summary_from_row(row: &SqliteRow) -> DocumentSummary {
    DocumentSummary {
        id: row.get("id"),
        doc_type: row.get("tipo"),
        number: row.get("numero"),
        date: row.get("fecha"),
        supplier: row.get("proveedor"),
        file_path: row.get("ruta_archivo"),
    }
}

fn code_from_row(row: &SqliteRow) -> Code {
    Code {
        id: row.get("id"),
        document_id: row.get("documento_id"),
        code: row.get("codigo"),
        description: row.get("descripcion"),
        quantity: row.get("cantidad"),
        unit_value: row.get("valor_unitario"),
        validated: row.get::<Option<i64>, _>("validado").unwrap_or(0) != 0,
        alert: row.get("alerta"),
    }
}

/// `%term%` with LIKE wildcards in `term` escaped (use with `ESCAPE '\'`).
fn like_contains(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

async fn insert_codes(
    tx: &mut Transaction<'_, Sqlite>,
    document_id: i64,
    codes: &[String],
) -> Result<()> {
    for code in clean_codes(codes) {
        sqlx::query("INSERT INTO codigos (documento_id, codigo) VALUES (?, ?)")
            .bind(document_id)
            .bind(&code)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: &NewDocument) -> Result<i64> {
        let payload = doc.extraction.as_ref().map(|p| p.to_json()).transpose()?;
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO documentos (tipo, numero, fecha, proveedor, ruta_archivo,
                                    hash_archivo, datos_extraidos)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.doc_type)
        .bind(&doc.number)
        .bind(&doc.date)
        .bind(&doc.supplier)
        .bind(&doc.file_path)
        .bind(&doc.file_hash)
        .bind(&payload)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_codes(&mut tx, id, &doc.codes).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_document(&self, id: i64, update: &DocumentUpdate) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE documentos SET tipo = ?, numero = ?, fecha = ?, proveedor = ? WHERE id = ?",
        )
        .bind(&update.doc_type)
        .bind(&update.number)
        .bind(&update.date)
        .bind(&update.supplier)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if affected == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM codigos WHERE documento_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_codes(&mut tx, id, &update.codes).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn set_extraction(&self, id: i64, payload: &ExtractionPayload) -> Result<()> {
        sqlx::query("UPDATE documentos SET datos_extraidos = ? WHERE id = ?")
            .bind(payload.to_json()?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_file(&self, id: i64, file: &StoredFile) -> Result<Option<String>> {
        let payload = file.extraction.as_ref().map(|p| p.to_json()).transpose()?;
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT ruta_archivo FROM documentos WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if previous.is_none() {
            return Ok(None);
        }

        sqlx::query(
            "UPDATE documentos SET ruta_archivo = ?, hash_archivo = ?, datos_extraidos = ? WHERE id = ?",
        )
        .bind(&file.file_path)
        .bind(&file.file_hash)
        .bind(&payload)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn delete_document(&self, id: i64) -> Result<Option<DocumentSummary>> {
        let row = sqlx::query(&format!("SELECT {SUMMARY_COLUMNS} FROM documentos d WHERE d.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM documentos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(summary_from_row(&row)))
    }

    async fn set_code_validated(&self, code_id: i64, validated: bool) -> Result<bool> {
        let affected = sqlx::query("UPDATE codigos SET validado = ? WHERE id = ?")
            .bind(validated as i64)
            .bind(code_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {SUMMARY_COLUMNS}, d.hash_archivo, d.fecha_creacion, d.estado, d.notas, d.datos_extraidos \
             FROM documentos d WHERE d.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let codes = sqlx::query(
            "SELECT id, documento_id, codigo, descripcion, cantidad, valor_unitario, validado, alerta \
             FROM codigos WHERE documento_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(code_from_row)
        .collect();

        let raw: Option<String> = row.get("datos_extraidos");
        Ok(Some(Document {
            summary: summary_from_row(&row),
            file_hash: row.get("hash_archivo"),
            created_at: row.get("fecha_creacion"),
            status: row.get("estado"),
            notes: row.get("notas"),
            extraction: raw.as_deref().and_then(ExtractionPayload::parse),
            codes,
        }))
    }

    async fn list_documents(&self, query: &ListQuery) -> Result<DocumentPage> {
        let query = query.normalized();

        let (total, rows) = match &query.doc_type {
            Some(doc_type) => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documentos WHERE tipo = ?")
                    .bind(doc_type)
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query(&format!(
                    "SELECT {SUMMARY_COLUMNS} FROM documentos d WHERE d.tipo = ? \
                     ORDER BY d.fecha DESC, d.id DESC LIMIT ? OFFSET ?"
                ))
                .bind(doc_type)
                .bind(query.per_page)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documentos")
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query(&format!(
                    "SELECT {SUMMARY_COLUMNS} FROM documentos d \
                     ORDER BY d.fecha DESC, d.id DESC LIMIT ? OFFSET ?"
                ))
                .bind(query.per_page)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
        };

        let ids: Vec<i64> = rows.iter().map(|r| r.get("id")).collect();
        let mut codes = self.codes_for(&ids).await?;
        let data = rows
            .iter()
            .map(|row| {
                let summary = summary_from_row(row);
                DocumentListing {
                    codes: codes.remove(&summary.id).unwrap_or_default(),
                    summary,
                }
            })
            .collect();
        Ok(DocumentPage::new(total, &query, data))
    }

    async fn cached_text_candidates(&self, limit: i64) -> Result<Vec<CandidateDocument>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUMMARY_COLUMNS}, d.datos_extraidos FROM documentos d \
             WHERE d.datos_extraidos IS NOT NULL AND d.datos_extraidos != '' \
             ORDER BY d.fecha DESC, d.id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        self.candidates(rows).await
    }

    async fn find_by_code(&self, term: &str) -> Result<Vec<CodeHit>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUMMARY_COLUMNS}, c.codigo FROM codigos c \
             JOIN documentos d ON d.id = c.documento_id \
             WHERE c.codigo LIKE ? ESCAPE '\\' \
             GROUP BY d.id, c.codigo \
             ORDER BY d.fecha DESC, d.id DESC, MIN(c.id)"
        ))
        .bind(like_contains(term))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CodeHit {
                summary: summary_from_row(row),
                matched_code: row.get("codigo"),
            })
            .collect())
    }

    async fn suggest_codes(&self, term: &str, limit: i64) -> Result<Vec<String>> {
        // `=` on the prefix keeps the comparison case-sensitive, unlike LIKE.
        let codes = sqlx::query_scalar(
            "SELECT DISTINCT codigo FROM codigos \
             WHERE substr(codigo, 1, length(?)) = ? \
             ORDER BY codigo ASC LIMIT ?",
        )
        .bind(term)
        .bind(term)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    async fn pdf_documents(&self, limit: Option<i64>) -> Result<Vec<CandidateDocument>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUMMARY_COLUMNS}, d.datos_extraidos FROM documentos d \
             WHERE lower(d.ruta_archivo) LIKE '%.pdf' \
             ORDER BY d.fecha DESC, d.id DESC LIMIT ?"
        ))
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        self.candidates(rows).await
    }

    async fn fulltext_candidates(&self, query: &str, limit: i64) -> Result<Vec<CandidateDocument>> {
        let pattern = like_contains(query);
        let rows = sqlx::query(&format!(
            "SELECT {SUMMARY_COLUMNS}, d.datos_extraidos FROM documentos d \
             WHERE d.datos_extraidos LIKE ? ESCAPE '\\' OR d.numero LIKE ? ESCAPE '\\' \
             ORDER BY d.fecha DESC, d.id DESC LIMIT ?"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        self.candidates(rows).await
    }

    async fn stats(&self) -> Result<SearchStats> {
        let total_documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documentos")
            .fetch_one(&self.pool)
            .await?;
        let total_codes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM codigos")
            .fetch_one(&self.pool)
            .await?;
        let unique_codes: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT codigo) FROM codigos")
            .fetch_one(&self.pool)
            .await?;
        let validated_codes: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM codigos WHERE validado = 1")
                .fetch_one(&self.pool)
                .await?;

        let documents_by_type = sqlx::query("SELECT tipo, COUNT(*) AS n FROM documentos GROUP BY tipo")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| (row.get("tipo"), row.get("n")))
            .collect();

        let recent_documents = sqlx::query(
            "SELECT id, tipo, numero, fecha FROM documentos ORDER BY fecha DESC, id DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| RecentDocument {
            id: row.get("id"),
            doc_type: row.get("tipo"),
            number: row.get("numero"),
            date: row.get("fecha"),
        })
        .collect();

        Ok(SearchStats {
            total_documents,
            total_codes,
            unique_codes,
            validated_codes,
            documents_by_type,
            recent_documents,
        })
    }
}
