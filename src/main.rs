//! Los Libros Highlights
//!
//! Command-line access to a highlight store.
//!
//! # Usage
//!
//! ```bash
//! los-libros-highlights render --content chapter-1.json
//! los-libros-highlights export --section chapter-1 --output highlights.json
//! los-libros-highlights import highlights.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use los_libros_highlights::highlights::{export_highlights, import_highlights};
use los_libros_highlights::store::{import_into, AnnotationStore, SqliteStore};
use los_libros_highlights::tree::{load_section, render_html};
use los_libros_highlights::{Config, Section};

/// Persistent highlights for re-rendered reader content
#[derive(Parser, Debug)]
#[command(name = "los-libros-highlights", version, about, long_about = None)]
struct Cli {
    /// Database URL (overrides DATABASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a section as HTML with its stored highlights applied
    Render {
        /// Section content JSON
        #[arg(long, value_name = "FILE")]
        content: PathBuf,
    },
    /// Write a section's highlights as JSON
    Export {
        #[arg(long)]
        section: String,

        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import exported highlights, skipping malformed records and known ids
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "los_libros_highlights=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });
    let database_url = cli.database.unwrap_or(config.database.url.clone());

    let store = SqliteStore::connect(&database_url)
        .await
        .with_context(|| format!("Failed to open highlight store at {}", database_url))?;

    match cli.command {
        Command::Render { content } => {
            let json = std::fs::read_to_string(&content)
                .with_context(|| format!("Failed to read {}", content.display()))?;
            let (section_id, tree) = load_section(&json)?;

            let highlights = store.highlights_for_section(&section_id).await?;
            let mut section = Section::new(section_id, tree)
                .with_stale_after(config.session.max_unresolved_attempts);
            let report = section.reconcile(&highlights);
            if !report.unresolved.is_empty() {
                tracing::warn!(
                    section_id = %section.id(),
                    unresolved = ?report.unresolved,
                    "Some highlights no longer resolve"
                );
            }

            let tree = section.tree();
            println!("{}", render_html(tree, tree.root(), &config.render));
        }
        Command::Export { section, output } => {
            let highlights = store.highlights_for_section(&section).await?;
            let json = export_highlights(&highlights)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!("Exported {} highlights to {}", highlights.len(), path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let report = import_highlights(&json)?;
            let summary = import_into(&store, &report.highlights).await?;
            tracing::info!(
                inserted = summary.inserted,
                skipped = summary.skipped,
                dropped = report.dropped,
                "Import finished"
            );
        }
    }

    Ok(())
}
