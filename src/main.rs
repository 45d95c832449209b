//! # Kino CLI (`kino`)
//!
//! ## Usage
//!
//! ```bash
//! kino --config ./config/kino.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kino tenant create <code>` | Provision a tenant directory and database |
//! | `kino upload` | Store a document with its codes |
//! | `kino search <codes...>` | Which documents cover these codes? |
//! | `kino find <term>` | Documents carrying a matching code |
//! | `kino suggest <prefix>` | Code autocompletion |
//! | `kino pdf-search <term>` | Search inside the stored PDF files |
//! | `kino fulltext <query>` | Search cached text and document numbers |
//! | `kino stats` | Tenant statistics |
//! | `kino reindex` | Re-extract cached PDF text |
//! | `kino extract-codes <pdf>` | Preview the codes a pattern finds in a file |
//! | `kino check-codes <pdf> --codes` | Which listed codes occur in a file? |
//! | `kino serve` | Start the JSON HTTP API |
//!
//! Diagnostics go to stderr through `tracing`; set `KINO_LOG` (e.g.
//! `KINO_LOG=debug`) to change the level.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kino_trace::{config, extract, ingest, search, server, stats, tenant};

/// Kino Trace: multi-tenant document manager with multi-code search.
#[derive(Parser)]
#[command(name = "kino", version, about = "Kino Trace: multi-tenant document manager with multi-code search")]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kino.toml`. `tenant create` and
    /// `extract-codes` fall back to built-in defaults when it is missing;
    /// `check-codes` never reads it.
    #[arg(long, global = true, default_value = "./config/kino.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tenants.
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },

    /// Store a document and its codes.
    ///
    /// The file is copied into the tenant's upload tree. PDFs (and plain
    /// text files) are text-extracted so they can be found by code search.
    Upload {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        file: PathBuf,
        /// Document type: manifiestos, declaraciones, facturas, ...
        #[arg(long)]
        tipo: String,
        #[arg(long)]
        numero: String,
        /// Document date, YYYY-MM-DD.
        #[arg(long)]
        fecha: String,
        #[arg(long)]
        proveedor: Option<String>,
        /// Comma or newline separated codes.
        #[arg(long)]
        codes: Option<String>,
    },

    /// Find the documents covering a list of codes.
    Search {
        #[arg(long)]
        tenant: String,
        /// Codes; each argument may also be a comma separated list.
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Look up documents by code substring.
    Find {
        #[arg(long)]
        tenant: String,
        term: String,
    },

    /// Suggest codes starting with a prefix.
    Suggest {
        #[arg(long)]
        tenant: String,
        prefix: String,
    },

    /// Search the text of the stored PDF files.
    PdfSearch {
        #[arg(long)]
        tenant: String,
        term: String,
    },

    /// Search cached document text and numbers.
    Fulltext {
        #[arg(long)]
        tenant: String,
        query: String,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show tenant statistics.
    Stats {
        #[arg(long)]
        tenant: String,
    },

    /// Re-extract text for PDFs whose cache is missing or short.
    Reindex {
        #[arg(long)]
        tenant: String,
        /// Re-extract every PDF, including previously failed ones.
        #[arg(long)]
        force: bool,
        #[arg(long)]
        batch: Option<usize>,
    },

    /// Print the codes found in a file without storing anything.
    ExtractCodes {
        file: PathBuf,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        terminator: Option<String>,
    },

    /// Report which of a list of codes occur in a file, without storing it.
    CheckCodes {
        file: PathBuf,
        /// Comma or newline separated codes.
        #[arg(long)]
        codes: String,
    },

    /// Start the JSON HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum TenantAction {
    /// Create the tenant directory, upload folders and database.
    Create { code: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("KINO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that work without a config file
    match &cli.command {
        Commands::Tenant {
            action: TenantAction::Create { code },
        } => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
            tenant::run_create_tenant(&cfg, code).await?;
            return Ok(());
        }
        Commands::ExtractCodes {
            file,
            prefix,
            terminator,
        } => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
            extract::run_extract_codes(&cfg, file, prefix.clone(), terminator.clone())?;
            return Ok(());
        }
        Commands::CheckCodes { file, codes } => {
            extract::run_check_codes(file, codes)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Upload {
            tenant,
            file,
            tipo,
            numero,
            fecha,
            proveedor,
            codes,
        } => {
            ingest::run_upload(&cfg, &tenant, file, tipo, numero, fecha, proveedor, codes).await?;
        }
        Commands::Search { tenant, codes } => {
            search::run_search(&cfg, &tenant, &codes).await?;
        }
        Commands::Find { tenant, term } => {
            search::run_find(&cfg, &tenant, &term).await?;
        }
        Commands::Suggest { tenant, prefix } => {
            search::run_suggest(&cfg, &tenant, &prefix).await?;
        }
        Commands::PdfSearch { tenant, term } => {
            search::run_pdf_search(&cfg, &tenant, &term).await?;
        }
        Commands::Fulltext {
            tenant,
            query,
            limit,
        } => {
            search::run_fulltext(&cfg, &tenant, &query, limit).await?;
        }
        Commands::Stats { tenant } => {
            stats::run_stats(&cfg, &tenant).await?;
        }
        Commands::Reindex {
            tenant,
            force,
            batch,
        } => {
            ingest::run_reindex(&cfg, &tenant, force, batch).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Tenant { .. } | Commands::ExtractCodes { .. } | Commands::CheckCodes { .. } => {
            unreachable!()
        }
    }

    Ok(())
}
