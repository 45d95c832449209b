//! Tenant statistics.
//!
//! Used by `kino stats` to summarize what a tenant holds: document and code
//! counts, validation progress, and the most recent uploads.

use anyhow::Result;

use kino_core::search::search_stats;

use crate::config::Config;
use crate::tenant::open_tenant;

/// Run the stats command: query the tenant store and print a summary.
pub async fn run_stats(config: &Config, tenant_code: &str) -> Result<()> {
    let tenant = open_tenant(config, tenant_code).await?;
    let stats = search_stats(&tenant.store).await;
    let db_size = std::fs::metadata(&tenant.paths.db_path)
        .map(|m| m.len())
        .unwrap_or(0);
    let db_path = tenant.paths.db_path.clone();
    tenant.close().await;
    let stats = stats?;

    println!("Tenant {} - Stats", tenant_code);
    println!("================================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", stats.total_documents);
    println!("  Codes:       {}", stats.total_codes);
    println!("  Unique:      {}", stats.unique_codes);
    println!(
        "  Validated:   {} / {} ({}%)",
        stats.validated_codes,
        stats.total_codes,
        if stats.total_codes > 0 {
            (stats.validated_codes * 100) / stats.total_codes
        } else {
            0
        }
    );

    if !stats.documents_by_type.is_empty() {
        println!();
        println!("  By type:");
        println!("  {:<24} {:>6}", "TYPE", "DOCS");
        println!("  {}", "-".repeat(31));
        for (doc_type, count) in &stats.documents_by_type {
            println!("  {:<24} {:>6}", doc_type, count);
        }
    }

    if !stats.recent_documents.is_empty() {
        println!();
        println!("  Recent:");
        for doc in &stats.recent_documents {
            println!(
                "  {:>6}  {}  {:<14} {}",
                doc.id, doc.date, doc.doc_type, doc.number
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes_scale() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
