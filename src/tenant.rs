//! Tenant provisioning and lookup.
//!
//! Every tenant owns a directory under `[tenants].root`:
//!
//! ```text
//! <root>/<code>/
//!   <code>.db
//!   uploads/
//!     manifiestos/
//!     declaraciones/
//!     facturas/
//! ```

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Upload sub-directories created for every new tenant.
pub const UPLOAD_DIRS: [&str; 3] = ["manifiestos", "declaraciones", "facturas"];

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("invalid tenant code: {0:?}")]
    InvalidCode(String),
    #[error("tenant not found: {0}")]
    NotFound(String),
    #[error("tenant already exists: {0}")]
    AlreadyExists(String),
}

/// Lower-case `code` and keep only `[a-z0-9_]`.
pub fn sanitize_code(code: &str) -> String {
    code.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

#[derive(Debug, Clone)]
pub struct TenantPaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub uploads_dir: PathBuf,
}

impl TenantPaths {
    pub fn new(config: &Config, code: &str) -> Result<Self, TenantError> {
        let sanitized = sanitize_code(code);
        if sanitized.is_empty() {
            return Err(TenantError::InvalidCode(code.to_string()));
        }
        let root = config.tenants.root.join(&sanitized);
        Ok(Self {
            db_path: root.join(format!("{sanitized}.db")),
            uploads_dir: root.join("uploads"),
            root,
        })
    }
}

/// An open tenant: its sanitized code, paths and store.
pub struct Tenant {
    pub code: String,
    pub paths: TenantPaths,
    pub store: SqliteStore,
}

impl Tenant {
    pub async fn close(self) {
        self.store.pool().close().await;
    }
}

/// Provision a new tenant: directory layout, database and schema.
pub async fn create_tenant(config: &Config, code: &str) -> Result<Tenant> {
    let paths = TenantPaths::new(config, code)?;
    let code = sanitize_code(code);
    if paths.root.exists() {
        return Err(TenantError::AlreadyExists(code).into());
    }

    for dir in UPLOAD_DIRS {
        std::fs::create_dir_all(paths.uploads_dir.join(dir))?;
    }
    let pool = db::connect(&paths.db_path, true).await?;
    migrate::run_migrations(&pool).await?;

    tracing::info!(tenant = %code, root = %paths.root.display(), "tenant created");
    Ok(Tenant {
        code,
        paths,
        store: SqliteStore::new(pool),
    })
}

/// Open an existing tenant.
pub async fn open_tenant(config: &Config, code: &str) -> Result<Tenant> {
    let paths = TenantPaths::new(config, code)?;
    let code = sanitize_code(code);
    if !paths.db_path.is_file() {
        return Err(TenantError::NotFound(code).into());
    }
    let pool = db::connect(&paths.db_path, false).await?;
    Ok(Tenant {
        code,
        paths,
        store: SqliteStore::new(pool),
    })
}

/// `kino tenant create`.
pub async fn run_create_tenant(config: &Config, code: &str) -> Result<()> {
    let tenant = create_tenant(config, code).await?;
    println!("Tenant {} created", tenant.code);
    println!("  database: {}", tenant.paths.db_path.display());
    println!("  uploads:  {}", tenant.paths.uploads_dir.display());
    tenant.close().await;
    Ok(())
}
