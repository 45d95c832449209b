//! Search engine over one tenant's documents.
//!
//! Five entry points, all read-only:
//!
//! - [`greedy_search`]: multi-code coverage over cached document text.
//!   Every candidate document is tested against every requested code, in
//!   scan order (date descending). A code can be claimed by several
//!   documents; documents are never re-ranked.
//! - [`search_by_code`]: substring lookup over stored codes, one row per
//!   (document, code) pair.
//! - [`suggest_codes`]: distinct codes by prefix, for autocompletion.
//! - [`search_in_pdf_content`]: re-extracts PDF text from disk and ranks
//!   documents by occurrence count.
//! - [`fulltext_search`]: the same ranking over cached text only.
//!
//! The store handle is passed in explicitly. `None` means no tenant could
//! be resolved and yields a "nothing found" result rather than an error.
//! Storage failures propagate to the caller.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::extract::TextExtractor;
use crate::models::{CodeHit, DocumentSummary, ExtractionPayload, SearchStats};
use crate::store::Store;
use crate::text::{clean_codes, context_snippet, count_ignore_case, dedup, dedup_upper, find_ignore_case};

/// Tunable limits for the search entry points.
///
/// Deserializes from the `[search]` config section; missing keys take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Most recent documents scanned by [`greedy_search`].
    pub greedy_candidate_limit: i64,
    /// PDF documents loaded by [`search_in_pdf_content`].
    pub pdf_scan_limit: i64,
    /// Minimum term length, in characters, for the content searches.
    pub pdf_min_term_len: usize,
    pub pdf_context_chars: usize,
    pub fulltext_context_chars: usize,
    pub fulltext_default_limit: i64,
    pub fulltext_max_limit: i64,
    pub suggest_limit: i64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            greedy_candidate_limit: 200,
            pdf_scan_limit: 100,
            pdf_min_term_len: 3,
            pdf_context_chars: 80,
            fulltext_context_chars: 60,
            fulltext_default_limit: 50,
            fulltext_max_limit: 100,
            suggest_limit: 10,
        }
    }
}

/// A document whose cached text contains at least one requested code.
#[derive(Debug, Clone, Serialize)]
pub struct CoveringDocument {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    /// Every code attached to the document, independent of the search.
    pub codes: Vec<String>,
    /// Requested codes found in this document's text, in request order.
    pub matched_codes: Vec<String>,
    /// Matched code -> the exact characters observed at its first occurrence.
    pub code_snippets: BTreeMap<String, String>,
}

/// Result of [`greedy_search`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct GreedySearchResult {
    pub documents: Vec<CoveringDocument>,
    /// Upper-cased union of codes found anywhere, first-seen order.
    pub covered: Vec<String>,
    /// Upper-cased requested codes found nowhere.
    pub not_found: Vec<String>,
    pub total_searched: usize,
    pub total_covered: usize,
    /// Candidates excluded because their cached payload was malformed or
    /// held no text.
    pub skipped: usize,
}

/// Match every requested code against the cached text of the tenant's most
/// recent documents.
///
/// Codes are trimmed and blank entries dropped. An empty request returns
/// an empty result without touching the store.
pub async fn greedy_search<S, C>(
    store: Option<&S>,
    codes: &[C],
    params: &SearchParams,
) -> Result<GreedySearchResult>
where
    S: Store + ?Sized,
    C: AsRef<str>,
{
    let codes = clean_codes(codes);
    if codes.is_empty() {
        return Ok(GreedySearchResult::default());
    }
    let requested = dedup_upper(&codes);

    let Some(store) = store else {
        return Ok(GreedySearchResult {
            total_searched: codes.len(),
            not_found: requested,
            ..GreedySearchResult::default()
        });
    };

    let candidates = store
        .cached_text_candidates(params.greedy_candidate_limit)
        .await?;

    let mut documents = Vec::new();
    let mut covered = Vec::new();
    let mut skipped = 0;

    for candidate in candidates {
        let Some(text) = ExtractionPayload::cached_text(candidate.payload.as_deref()) else {
            tracing::debug!(
                document_id = candidate.summary.id,
                "skipping document without usable cached text"
            );
            skipped += 1;
            continue;
        };

        let mut matched_codes = Vec::new();
        let mut code_snippets = BTreeMap::new();
        for code in &codes {
            if code_snippets.contains_key(code) {
                continue;
            }
            if let Some(range) = find_ignore_case(&text, code) {
                matched_codes.push(code.clone());
                covered.push(code.to_uppercase());
                code_snippets.insert(code.clone(), text[range].to_string());
            }
        }

        if !matched_codes.is_empty() {
            documents.push(CoveringDocument {
                summary: candidate.summary,
                codes: candidate.codes,
                matched_codes,
                code_snippets,
            });
        }
    }

    let covered = dedup(covered);
    let not_found: Vec<String> = requested
        .into_iter()
        .filter(|code| !covered.contains(code))
        .collect();

    tracing::debug!(
        requested = codes.len(),
        documents = documents.len(),
        covered = covered.len(),
        skipped,
        "greedy search finished"
    );

    Ok(GreedySearchResult {
        documents,
        total_searched: codes.len(),
        total_covered: covered.len(),
        covered,
        not_found,
        skipped,
    })
}

/// Look up stored codes containing `term` (case-insensitive).
///
/// A document with several matching codes appears once per distinct code.
pub async fn search_by_code<S: Store + ?Sized>(store: &S, term: &str) -> Result<Vec<CodeHit>> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    store.find_by_code(term).await
}

/// Distinct stored codes starting with `term`, alphabetically.
pub async fn suggest_codes<S: Store + ?Sized>(
    store: &S,
    term: &str,
    limit: i64,
) -> Result<Vec<String>> {
    let term = term.trim();
    if term.is_empty() || limit < 1 {
        return Ok(Vec::new());
    }
    store.suggest_codes(term, limit).await
}

/// One PDF whose extracted text contains the search term.
#[derive(Debug, Clone, Serialize)]
pub struct PdfContentHit {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    /// Context around the first occurrence.
    pub snippet: String,
    pub occurrences: usize,
    pub search_term: String,
}

/// Search the text of the tenant's PDF files, re-extracting from disk.
///
/// Files that are missing or fail to extract are skipped with a warning.
/// Results are ordered by occurrence count, most first.
pub async fn search_in_pdf_content<S: Store + ?Sized>(
    store: Option<&S>,
    extractor: &dyn TextExtractor,
    uploads_root: &Path,
    term: &str,
    params: &SearchParams,
) -> Result<Vec<PdfContentHit>> {
    let term = term.trim();
    if term.chars().count() < params.pdf_min_term_len {
        return Ok(Vec::new());
    }
    let Some(store) = store else {
        return Ok(Vec::new());
    };

    let mut hits = Vec::new();
    for doc in store.pdf_documents(Some(params.pdf_scan_limit)).await? {
        let Some(path) = doc.summary.stored_file(uploads_root) else {
            tracing::warn!(
                document_id = doc.summary.id,
                path = %doc.summary.file_path,
                "stored path escapes the upload root"
            );
            continue;
        };
        let text = match extractor.extract(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(document_id = doc.summary.id, error = %e, "skipping unreadable PDF");
                continue;
            }
        };
        if let Some(range) = find_ignore_case(&text, term) {
            hits.push(PdfContentHit {
                snippet: context_snippet(&text, range, params.pdf_context_chars),
                occurrences: count_ignore_case(&text, term),
                search_term: term.to_string(),
                summary: doc.summary,
            });
        }
    }

    hits.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    Ok(hits)
}

/// One document matched by [`fulltext_search`].
#[derive(Debug, Clone, Serialize)]
pub struct FulltextHit {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    /// Empty when only the document number matched.
    pub snippet: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FulltextResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<FulltextHit>,
}

/// Search cached document text and numbers without touching the files.
///
/// `limit` defaults to `fulltext_default_limit` and is clamped to
/// `1..=fulltext_max_limit`.
pub async fn fulltext_search<S: Store + ?Sized>(
    store: &S,
    query: &str,
    limit: Option<i64>,
    params: &SearchParams,
) -> Result<FulltextResponse> {
    let query = query.trim();
    if query.chars().count() < params.pdf_min_term_len {
        return Ok(FulltextResponse {
            query: query.to_string(),
            count: 0,
            results: Vec::new(),
        });
    }
    let limit = limit
        .unwrap_or(params.fulltext_default_limit)
        .clamp(1, params.fulltext_max_limit.max(1));

    let mut results: Vec<FulltextHit> = store
        .fulltext_candidates(query, limit)
        .await?
        .into_iter()
        .map(|doc| {
            let text = ExtractionPayload::cached_text(doc.payload.as_deref()).unwrap_or_default();
            let (snippet, occurrences) = match find_ignore_case(&text, query) {
                Some(range) => (
                    context_snippet(&text, range, params.fulltext_context_chars),
                    count_ignore_case(&text, query),
                ),
                None => (String::new(), 0),
            };
            FulltextHit {
                summary: doc.summary,
                snippet,
                occurrences,
            }
        })
        .collect();
    results.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));

    Ok(FulltextResponse {
        query: query.to_string(),
        count: results.len(),
        results,
    })
}

/// Dashboard aggregates for the tenant.
pub async fn search_stats<S: Store + ?Sized>(store: &S) -> Result<SearchStats> {
    store.stats().await
}
