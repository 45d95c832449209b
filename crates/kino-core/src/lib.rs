//! # KINO-TRACE Core
//!
//! Storage-agnostic logic for KINO-TRACE: document and code models, the
//! [`store::Store`] abstraction, code-pattern extraction, and the search
//! engine (greedy multi-code coverage, code lookup, suggestions, PDF
//! content search and cached full-text search).
//!
//! This crate contains no tokio, sqlx or HTTP dependencies. The
//! application crate provides the SQLite store, PDF text extraction and
//! the CLI/HTTP frontends.

pub mod extract;
pub mod models;
pub mod search;
pub mod store;
pub mod text;
