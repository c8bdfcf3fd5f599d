mod archive;
mod db;
mod error;
mod fetch;
mod parse;
mod pipeline;
mod render;
mod settings;
mod site;
mod slug;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use settings::Settings;

#[derive(Parser)]
#[command(name = "failed_banks", about = "FDIC failed bank list: SQLite store and static site")]
struct Cli {
    /// Settings file (default: failed_banks.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// CSV source URL
    #[arg(long, global = true)]
    url: Option<String>,
    /// SQLite store path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Gzip artifact path (default: <db>.gz)
    #[arg(long, global = true)]
    archive: Option<PathBuf>,
    /// Template directory
    #[arg(long, global = true)]
    templates: Option<PathBuf>,
    /// Output directory for the rendered site
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the CSV, rebuild the store and search index, gzip the store
    Ingest,
    /// Render the static site from the store
    Render,
    /// Ingest then render
    Run,
    /// Show store statistics
    Stats {
        /// Number of states to list
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },
    /// Full-text search over name, city, state, cert and acquirer
    Search {
        query: String,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut s = Settings::load(self.config.as_deref())?;
        if let Some(url) = &self.url {
            s.source_url = url.clone();
        }
        if let Some(db) = &self.db {
            s.db_path = db.clone();
        }
        if let Some(archive) = &self.archive {
            s.archive_path = Some(archive.clone());
        }
        if let Some(templates) = &self.templates {
            s.templates_dir = templates.clone();
        }
        if let Some(out) = &self.out {
            s.output_dir = out.clone();
        }
        Ok(s)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = cli.settings()?;
    tracing::debug!(?settings, "Settings loaded");

    let result = match cli.command {
        Commands::Ingest => ingest(&settings),
        Commands::Render => render(&settings),
        Commands::Run => ingest(&settings).and_then(|_| render(&settings)),
        Commands::Stats { top } => {
            let conn = db::connect_read_only(&settings.db_path)?;
            let s = db::get_stats(&conn, top)?;
            println!("Rows:      {}", s.rows);
            println!("Indexed:   {}", s.indexed);
            println!("States:    {}", s.states);
            if !s.top_states.is_empty() {
                println!("\n--- Most failures ---");
                for (state, count) in &s.top_states {
                    println!("  {:<4} {:>5}", state, count);
                }
            }
            Ok(())
        }
        Commands::Search { query, limit, json } => {
            let conn = db::connect_read_only(&settings.db_path)?;
            let hits = db::search(&conn, &query, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
                return Ok(());
            }
            if hits.is_empty() {
                println!("No matches for '{}'.", query);
                return Ok(());
            }

            println!(
                "{:<32} | {:<18} | {:<2} | {:>6} | {:<24} | {:<10}",
                "Bank", "City", "St", "Cert", "Acquired by", "Closed"
            );
            println!("{}", "-".repeat(108));
            for h in &hits {
                let r = &h.record;
                println!(
                    "{:<32} | {:<18} | {:<2} | {:>6} | {:<24} | {:<10}",
                    truncate(&r.name, 32),
                    truncate(&r.city, 18),
                    r.state,
                    r.cert,
                    truncate(&r.acquiring_institution, 24),
                    r.closing_date
                );
            }
            println!("\n{} matches", hits.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn ingest(settings: &Settings) -> anyhow::Result<()> {
    let s = pipeline::ingest(settings)?;
    println!(
        "Stored {} rows ({} indexed) in {:?}; gzip copy at {:?} ({} bytes in)",
        s.rows,
        s.indexed,
        settings.db_path,
        settings.archive_path(),
        s.archive_bytes
    );
    Ok(())
}

fn render(settings: &Settings) -> anyhow::Result<()> {
    let c = pipeline::render(settings)?;
    println!(
        "Rendered {} pages, {} state pages, {} bank pages into {:?}",
        c.pages, c.states, c.banks, settings.output_dir
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
