//! Library-level tests against a real tenant database.

use kino_core::models::{DocumentUpdate, ExtractionPayload, ListQuery, NewDocument, StoredFile};
use kino_core::search::{fulltext_search, greedy_search, search_by_code, SearchParams};
use kino_core::store::Store;
use kino_trace::config::Config;
use kino_trace::documents;
use kino_trace::extract::FileTextExtractor;
use kino_trace::ingest::{upload_bytes, UploadRequest};
use kino_trace::tenant::{create_tenant, open_tenant, Tenant, TenantError};
use tempfile::TempDir;

async fn new_tenant(tmp: &TempDir) -> Tenant {
    let config = Config::with_root(tmp.path().join("clients"));
    create_tenant(&config, "acme").await.unwrap()
}

fn doc(number: &str, date: &str, text: Option<&str>, codes: &[&str]) -> NewDocument {
    NewDocument {
        doc_type: "manifiestos".into(),
        number: number.into(),
        date: date.into(),
        supplier: None,
        file_path: format!("manifiestos/{number}.pdf"),
        file_hash: None,
        extraction: text.map(|t| ExtractionPayload::from_text(t, Vec::new(), 10_000)),
        codes: codes.iter().map(|c| c.to_string()).collect(),
    }
}

#[tokio::test]
async fn greedy_search_worked_example() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;
    let store = &tenant.store;

    store
        .insert_document(&doc("A", "2024-01-01", Some("Invoice ref ABC-100 shipped"), &[]))
        .await
        .unwrap();
    store
        .insert_document(&doc(
            "B",
            "2024-02-01",
            Some("Contains XYZ-200 and ABC-100 again"),
            &[],
        ))
        .await
        .unwrap();
    // Codes column matches but there is no cached text
    store
        .insert_document(&doc("C", "2024-03-01", None, &["ABC-100"]))
        .await
        .unwrap();

    let result = greedy_search(
        Some(store),
        &["ABC-100", "XYZ-200", "QQQ-999"],
        &SearchParams::default(),
    )
    .await
    .unwrap();

    let numbers: Vec<&str> = result
        .documents
        .iter()
        .map(|d| d.summary.number.as_str())
        .collect();
    assert_eq!(numbers, vec!["B", "A"]);
    assert_eq!(result.documents[0].matched_codes, vec!["ABC-100", "XYZ-200"]);
    assert_eq!(result.documents[1].matched_codes, vec!["ABC-100"]);
    assert_eq!(result.covered, vec!["ABC-100", "XYZ-200"]);
    assert_eq!(result.not_found, vec!["QQQ-999"]);
    assert_eq!(result.total_searched, 3);
    assert_eq!(result.total_covered, 2);

    tenant.close().await;
}

#[tokio::test]
async fn reopened_tenant_keeps_documents() {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_root(tmp.path().join("clients"));
    let tenant = create_tenant(&config, "acme").await.unwrap();
    tenant
        .store
        .insert_document(&doc("A", "2024-01-01", Some("text"), &["X1"]))
        .await
        .unwrap();
    tenant.close().await;

    let tenant = open_tenant(&config, "ACME").await.unwrap();
    assert_eq!(tenant.store.stats().await.unwrap().total_documents, 1);
    tenant.close().await;

    let err = open_tenant(&config, "other").await.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<TenantError>(),
        Some(TenantError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_cascades_to_codes() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;

    let id = tenant
        .store
        .insert_document(&doc("A", "2024-01-01", None, &["X1", "X2"]))
        .await
        .unwrap();
    documents::delete_document(&tenant.store, &tenant.paths.uploads_dir, id)
        .await
        .unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM codigos")
        .fetch_one(tenant.store.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert!(tenant.store.get_document(id).await.unwrap().is_none());

    tenant.close().await;
}

#[tokio::test]
async fn update_replaces_code_list() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;

    let id = tenant
        .store
        .insert_document(&doc("A", "2024-01-01", None, &["X1", "X2"]))
        .await
        .unwrap();
    let update = DocumentUpdate {
        doc_type: "facturas".into(),
        number: "F-9".into(),
        date: "2024-06-30".into(),
        supplier: Some("Acme Ltd".into()),
        codes: vec!["Y1".into()],
    };
    documents::update_document(&tenant.store, id, &update)
        .await
        .unwrap();

    let doc = documents::get_document(&tenant.store, id).await.unwrap();
    assert_eq!(doc.summary.doc_type, "facturas");
    assert_eq!(doc.summary.supplier.as_deref(), Some("Acme Ltd"));
    let codes: Vec<&str> = doc.codes.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["Y1"]);

    tenant.close().await;
}

#[tokio::test]
async fn code_lookups_respect_case_and_wildcards() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;
    let store = &tenant.store;

    store
        .insert_document(&doc("A", "2024-01-01", None, &["ABC-1", "A_1", "AX1"]))
        .await
        .unwrap();
    store
        .insert_document(&doc("B", "2024-01-02", None, &["abc-2"]))
        .await
        .unwrap();

    assert_eq!(store.suggest_codes("AB", 10).await.unwrap(), vec!["ABC-1"]);
    assert_eq!(store.suggest_codes("ab", 10).await.unwrap(), vec!["abc-2"]);

    let hits = store.find_by_code("A_1").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].matched_code, "A_1");

    tenant.close().await;
}

#[tokio::test]
async fn repeated_code_is_reported_once_per_document() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;

    tenant
        .store
        .insert_document(&doc("A", "2024-01-01", None, &["A1", "A1", "A10"]))
        .await
        .unwrap();

    let hits = search_by_code(&tenant.store, "A1")
        .await
        .unwrap();
    let codes: Vec<&str> = hits.iter().map(|h| h.matched_code.as_str()).collect();
    assert_eq!(codes, vec!["A1", "A10"]);

    tenant.close().await;
}

#[tokio::test]
async fn replace_file_swaps_path_hash_and_payload() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;
    let store = &tenant.store;

    let id = store
        .insert_document(&doc("A", "2024-01-01", Some("old words"), &["X1"]))
        .await
        .unwrap();
    let file = StoredFile {
        file_path: "manifiestos/A-v2.pdf".into(),
        file_hash: Some("f00d".into()),
        extraction: Some(ExtractionPayload::from_text("new words", Vec::new(), 10_000)),
    };
    let previous = store.replace_file(id, &file).await.unwrap();
    assert_eq!(previous.as_deref(), Some("manifiestos/A.pdf"));

    let stored = documents::get_document(store, id).await.unwrap();
    assert_eq!(stored.summary.file_path, "manifiestos/A-v2.pdf");
    assert_eq!(stored.file_hash.as_deref(), Some("f00d"));
    assert_eq!(stored.extraction.unwrap().text, "new words");
    assert_eq!(stored.codes.len(), 1);

    assert!(store.replace_file(id + 100, &file).await.unwrap().is_none());

    tenant.close().await;
}

#[tokio::test]
async fn listing_pages_and_filters() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;

    for (i, date) in ["2024-01-01", "2024-01-03", "2024-01-02"].iter().enumerate() {
        tenant
            .store
            .insert_document(&doc(&format!("M-{i}"), date, None, &[]))
            .await
            .unwrap();
    }
    let mut invoice = doc("F-1", "2024-01-05", None, &[]);
    invoice.doc_type = "facturas".into();
    tenant.store.insert_document(&invoice).await.unwrap();

    let page = documents::list_documents(
        &tenant.store,
        &ListQuery {
            page: 1,
            per_page: 2,
            doc_type: Some("manifiestos".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.last_page, 2);
    let numbers: Vec<&str> = page.data.iter().map(|d| d.summary.number.as_str()).collect();
    assert_eq!(numbers, vec!["M-1", "M-2"]);

    let far = documents::list_documents(
        &tenant.store,
        &ListQuery {
            page: i64::MAX,
            per_page: 50,
            doc_type: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(far.total, 4);
    assert_eq!(far.last_page, 1);
    assert!(far.data.is_empty());

    tenant.close().await;
}

#[tokio::test]
async fn fulltext_matches_numbers_and_text() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;

    tenant
        .store
        .insert_document(&doc("ZETA-7", "2024-01-01", None, &[]))
        .await
        .unwrap();
    tenant
        .store
        .insert_document(&doc("B", "2024-01-02", Some("zeta zeta zeta"), &[]))
        .await
        .unwrap();

    let response = fulltext_search(&tenant.store, "Zeta", None, &SearchParams::default())
        .await
        .unwrap();
    assert_eq!(response.count, 2);
    assert_eq!(response.results[0].summary.number, "B");
    assert_eq!(response.results[0].occurrences, 3);
    assert_eq!(response.results[1].summary.number, "ZETA-7");
    assert_eq!(response.results[1].occurrences, 0);
    assert!(response.results[1].snippet.is_empty());

    tenant.close().await;
}

#[tokio::test]
async fn validating_codes_feeds_stats() {
    let tmp = TempDir::new().unwrap();
    let tenant = new_tenant(&tmp).await;

    let id = tenant
        .store
        .insert_document(&doc("A", "2024-01-01", None, &["X1", "X2"]))
        .await
        .unwrap();
    let code_id = documents::get_document(&tenant.store, id).await.unwrap().codes[0].id;
    documents::set_code_validated(&tenant.store, code_id, true)
        .await
        .unwrap();

    let stats = tenant.store.stats().await.unwrap();
    assert_eq!(stats.total_codes, 2);
    assert_eq!(stats.validated_codes, 1);
    assert_eq!(stats.documents_by_type.get("manifiestos"), Some(&1));
    assert_eq!(stats.recent_documents.len(), 1);

    tenant.close().await;
}

#[tokio::test]
async fn failed_insert_leaves_no_stored_file() {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_root(tmp.path().join("clients"));
    let tenant = create_tenant(&config, "acme").await.unwrap();
    tenant.store.pool().close().await;

    let request = UploadRequest {
        file: "scan.txt".into(),
        doc_type: "facturas".into(),
        number: "F-1".into(),
        date: "2024-01-01".into(),
        supplier: None,
        codes: vec!["A1".into()],
    };
    let result = upload_bytes(
        &tenant.store,
        &tenant.paths.uploads_dir,
        &FileTextExtractor,
        &config.extraction,
        &request,
        b"Invoice text",
    )
    .await;
    assert!(result.is_err());

    let stored = std::fs::read_dir(tenant.paths.uploads_dir.join("facturas"))
        .unwrap()
        .count();
    assert_eq!(stored, 0);
}
