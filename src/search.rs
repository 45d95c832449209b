//! CLI front-ends for the search engine in [`kino_core::search`].
//!
//! Each command opens the tenant, runs one search and prints a plain-text
//! report to stdout.

use anyhow::Result;

use kino_core::search::{
    fulltext_search, greedy_search, search_by_code, search_in_pdf_content, suggest_codes,
    GreedySearchResult,
};
use kino_core::text::parse_code_list;

use crate::config::Config;
use crate::extract::FileTextExtractor;
use crate::tenant::open_tenant;

/// Split CLI arguments into codes; each argument may itself hold a
/// comma or newline separated list.
pub fn codes_from_args(args: &[String]) -> Vec<String> {
    args.iter().flat_map(|a| parse_code_list(a)).collect()
}

/// `kino search`: greedy multi-code coverage.
pub async fn run_search(config: &Config, tenant_code: &str, args: &[String]) -> Result<()> {
    let codes = codes_from_args(args);
    if codes.is_empty() {
        anyhow::bail!("no codes provided");
    }
    let tenant = open_tenant(config, tenant_code).await?;
    let result = greedy_search(Some(&tenant.store), &codes, &config.search).await;
    tenant.close().await;
    print_coverage(&result?);
    Ok(())
}

fn print_coverage(result: &GreedySearchResult) {
    if result.documents.is_empty() {
        println!("No documents cover the requested codes.");
    }
    for (i, doc) in result.documents.iter().enumerate() {
        println!(
            "{}. [{}] {} ({})",
            i + 1,
            doc.summary.doc_type,
            doc.summary.number,
            doc.summary.date
        );
        if let Some(supplier) = &doc.summary.supplier {
            println!("    supplier: {}", supplier);
        }
        println!("    file: {}", doc.summary.file_path);
        println!("    matched: {}", doc.matched_codes.join(", "));
        println!("    id: {}", doc.summary.id);
        println!();
    }
    println!(
        "Covered {} of {}: {}",
        result.total_covered,
        result.total_searched,
        result.covered.join(", ")
    );
    if !result.not_found.is_empty() {
        println!("Not found: {}", result.not_found.join(", "));
    }
    if result.skipped > 0 {
        println!("Skipped {} documents with unreadable cached text.", result.skipped);
    }
}

/// `kino find`: code substring lookup.
pub async fn run_find(config: &Config, tenant_code: &str, term: &str) -> Result<()> {
    let tenant = open_tenant(config, tenant_code).await?;
    let hits = search_by_code(&tenant.store, term).await;
    tenant.close().await;
    let hits = hits?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for hit in &hits {
        println!(
            "{}  {:<12} {:<16} {}  (document {})",
            hit.summary.date, hit.summary.doc_type, hit.summary.number, hit.matched_code, hit.summary.id
        );
    }
    Ok(())
}

/// `kino suggest`: code autocompletion.
pub async fn run_suggest(config: &Config, tenant_code: &str, term: &str) -> Result<()> {
    let tenant = open_tenant(config, tenant_code).await?;
    let codes = suggest_codes(&tenant.store, term, config.search.suggest_limit).await;
    tenant.close().await;
    for code in codes? {
        println!("{}", code);
    }
    Ok(())
}

/// `kino pdf-search`: search the stored PDF files themselves.
pub async fn run_pdf_search(config: &Config, tenant_code: &str, term: &str) -> Result<()> {
    let tenant = open_tenant(config, tenant_code).await?;
    let hits = search_in_pdf_content(
        Some(&tenant.store),
        &FileTextExtractor,
        &tenant.paths.uploads_dir,
        term,
        &config.search,
    )
    .await;
    tenant.close().await;
    let hits = hits?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{}x] {} {} ({})",
            i + 1,
            hit.occurrences,
            hit.summary.doc_type,
            hit.summary.number,
            hit.summary.date
        );
        println!("    excerpt: \"{}\"", hit.snippet);
        println!("    id: {}", hit.summary.id);
        println!();
    }
    Ok(())
}

/// `kino fulltext`: search cached text and document numbers.
pub async fn run_fulltext(
    config: &Config,
    tenant_code: &str,
    query: &str,
    limit: Option<i64>,
) -> Result<()> {
    let tenant = open_tenant(config, tenant_code).await?;
    let response = fulltext_search(&tenant.store, query, limit, &config.search).await;
    tenant.close().await;
    let response = response?;

    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in response.results.iter().enumerate() {
        println!(
            "{}. [{}x] {} {} ({})",
            i + 1,
            hit.occurrences,
            hit.summary.doc_type,
            hit.summary.number,
            hit.summary.date
        );
        if !hit.snippet.is_empty() {
            println!("    excerpt: \"{}\"", hit.snippet);
        }
        println!("    id: {}", hit.summary.id);
        println!();
    }
    Ok(())
}
