//! # Kino Trace
//!
//! Multi-tenant document manager for customs paperwork: manifests,
//! declarations and invoices, each tagged with the product codes it covers.
//!
//! Every tenant owns a directory with its own SQLite database and upload
//! tree. Uploaded PDFs are text-extracted once and the text is cached in the
//! database, so the main question ("which documents cover these codes?")
//! is answered without touching the files.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────────┐
//! │   Upload    │──▶│   Extract    │──▶│ <tenant>/<t>.db │
//! │  PDF + meta │   │ text + codes│   │ documentos      │
//! └─────────────┘   └─────────────┘   │ codigos         │
//!                                     └───────┬─────────┘
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!                 ┌──────────┐          ┌──────────┐
//!                 │   CLI    │          │   HTTP   │
//!                 │  (kino)  │          │  (axum)  │
//!                 └──────────┘          └──────────┘
//! ```
//!
//! The search engine, data model and [`Store`](kino_core::store::Store)
//! trait live in the `kino-core` crate; this crate provides the SQLite
//! store, tenant layout, ingestion and the two front-ends.
//!
//! ## Quick Start
//!
//! ```bash
//! kino tenant create acme
//! kino upload --tenant acme --file m.pdf --tipo manifiestos --numero M-1 --fecha 2024-05-01
//! kino search --tenant acme ABC-100 XYZ-200
//! kino serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`tenant`] | Tenant layout, provisioning and lookup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` |
//! | [`extract`] | PDF and plain-text extraction |
//! | [`ingest`] | Upload and re-index |
//! | [`documents`] | Document CRUD |
//! | [`search`] | Search commands |
//! | [`stats`] | Tenant statistics |
//! | [`server`] | JSON HTTP API |

pub mod config;
pub mod db;
pub mod documents;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod tenant;
