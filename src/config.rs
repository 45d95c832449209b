//! TOML configuration.
//!
//! ```toml
//! [tenants]
//! root = "./clients"
//!
//! [search]
//! greedy_candidate_limit = 200
//!
//! [extraction]
//! upload_text_limit = 10000
//!
//! [extraction.pattern]
//! prefix = "Ref:"
//! terminator = "/"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! max_upload_bytes = 33554432
//! ```
//!
//! Only `[tenants]` is required; every other section falls back to its
//! defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use kino_core::extract::CodePattern;
use kino_core::search::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub tenants: TenantsConfig,
    #[serde(default)]
    pub search: SearchParams,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TenantsConfig {
    /// Directory holding one sub-directory per tenant.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Characters of extracted text cached at upload time.
    #[serde(default = "default_upload_text_limit")]
    pub upload_text_limit: usize,
    /// Characters cached by a re-index pass.
    #[serde(default = "default_reindex_text_limit")]
    pub reindex_text_limit: usize,
    /// Cached text shorter than this is considered pending re-index.
    #[serde(default = "default_reindex_min_text_len")]
    pub reindex_min_text_len: usize,
    /// Documents per re-index pass when the caller gives no batch size.
    #[serde(default = "default_reindex_batch_default")]
    pub reindex_batch_default: usize,
    #[serde(default = "default_reindex_batch_max")]
    pub reindex_batch_max: usize,
    #[serde(default)]
    pub pattern: CodePattern,
}

fn default_upload_text_limit() -> usize {
    10_000
}
fn default_reindex_text_limit() -> usize {
    50_000
}
fn default_reindex_min_text_len() -> usize {
    100
}
fn default_reindex_batch_default() -> usize {
    10
}
fn default_reindex_batch_max() -> usize {
    20
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            upload_text_limit: default_upload_text_limit(),
            reindex_text_limit: default_reindex_text_limit(),
            reindex_min_text_len: default_reindex_min_text_len(),
            reindex_batch_default: default_reindex_batch_default(),
            reindex_batch_max: default_reindex_batch_max(),
            pattern: CodePattern::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest request body accepted, in bytes. Bounds file uploads.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Config {
    /// Defaults with tenants under `./clients`, used when no config file
    /// exists.
    pub fn minimal() -> Self {
        Self::with_root(PathBuf::from("./clients"))
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self {
            tenants: TenantsConfig { root },
            search: SearchParams::default(),
            extraction: ExtractionConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        for (name, value) in [
            ("search.greedy_candidate_limit", s.greedy_candidate_limit),
            ("search.pdf_scan_limit", s.pdf_scan_limit),
            ("search.fulltext_default_limit", s.fulltext_default_limit),
            ("search.fulltext_max_limit", s.fulltext_max_limit),
            ("search.suggest_limit", s.suggest_limit),
        ] {
            if value < 1 {
                anyhow::bail!("{} must be >= 1", name);
            }
        }
        if s.pdf_min_term_len == 0 {
            anyhow::bail!("search.pdf_min_term_len must be >= 1");
        }

        let e = &self.extraction;
        if e.upload_text_limit == 0 || e.reindex_text_limit == 0 {
            anyhow::bail!("extraction text limits must be >= 1");
        }
        if e.reindex_batch_max == 0 || e.reindex_batch_default == 0 {
            anyhow::bail!("extraction re-index batch sizes must be >= 1");
        }
        if e.pattern.min_length == 0 || e.pattern.min_length > e.pattern.max_length {
            anyhow::bail!(
                "extraction.pattern.min_length must be in 1..=max_length ({})",
                e.pattern.max_length
            );
        }
        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("server.max_upload_bytes must be >= 1");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_tenants_section_is_required() {
        let config: Config = toml::from_str("[tenants]\nroot = \"/srv/clients\"\n").unwrap();
        assert_eq!(config.tenants.root, PathBuf::from("/srv/clients"));
        assert_eq!(config.search, SearchParams::default());
        assert_eq!(config.extraction.upload_text_limit, 10_000);
        assert_eq!(config.extraction.pattern.terminator, "/");
        assert_eq!(config.server.max_upload_bytes, 32 * 1024 * 1024);
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tenants]
            root = "c"

            [search]
            pdf_min_term_len = 4

            [extraction.pattern]
            prefix = "Ref:"
            "#,
        )
        .unwrap();
        assert_eq!(config.search.pdf_min_term_len, 4);
        assert_eq!(config.search.greedy_candidate_limit, 200);
        assert_eq!(config.extraction.pattern.prefix, "Ref:");
        assert_eq!(config.extraction.pattern.max_length, 50);
    }

    #[test]
    fn validation_rejects_bad_limits() {
        let mut config = Config::minimal();
        config.search.fulltext_max_limit = 0;
        assert!(config.validate().is_err());

        let mut config = Config::minimal();
        config.extraction.pattern.min_length = 60;
        assert!(config.validate().is_err());

        let mut config = Config::minimal();
        config.server.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }
}
