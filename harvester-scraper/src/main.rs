use clap::{Parser, Subcommand};
use tracing::info;

use chrono::Utc;
use harvester_core::storage::{InMemoryStorage, Storage};
use harvester_core::{EventImporter, ImportRecord};
use harvester_scraper::config::ScraperConfig;
use harvester_scraper::extract::{candidate, page};
use harvester_scraper::feed::{self, SnapshotFeedSource};
use harvester_scraper::observability;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Community event harvester: feed extraction and batch import")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract event candidates from a feed snapshot
    Extract {
        /// Path to a JSON snapshot of raw feed units
        #[arg(long)]
        snapshot: PathBuf,
        /// Override the configured unit budget
        #[arg(long)]
        max_units: Option<usize>,
        /// Where to write the import batch (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Extract a single event detail page
    EventPage {
        /// Local HTML file to parse
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,
        /// URL to fetch and parse
        #[arg(long)]
        url: Option<String>,
        /// Where to write the import batch (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import a batch file into storage and print the outcome
    Import {
        /// Path to an import batch (JSON array of records)
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    observability::logging::init_logging();

    let config = ScraperConfig::from_env()?;

    match cli.command {
        Commands::Extract {
            snapshot,
            max_units,
            output,
        } => {
            let config = ScraperConfig {
                max_units: max_units.unwrap_or(config.max_units),
                ..config
            };

            println!("🕷️  Extracting from snapshot: {}", snapshot.display());
            let source = SnapshotFeedSource::from_file(&snapshot, 10)?;
            let units = feed::discover(&source, &config).await?;

            let now = Utc::now().with_timezone(&config.timezone).naive_local();
            let records: Vec<ImportRecord> = units
                .iter()
                .filter_map(|unit| candidate::build(unit, now))
                .map(candidate::CandidateEvent::into_import_record)
                .collect();

            info!("Extracted {} candidates from {} units", records.len(), units.len());
            write_batch(&records, output.as_deref())?;
            println!("✅ Extraction completed: {} candidates", records.len());
        }
        Commands::EventPage { file, url, output } => {
            let (html, page_url) = match (&file, &url) {
                (Some(path), _) => (std::fs::read_to_string(path)?, String::new()),
                (None, Some(url)) => {
                    info!("Fetching event page {}", url);
                    let body = reqwest::get(url).await?.error_for_status()?.text().await?;
                    (body, url.clone())
                }
                (None, None) => anyhow::bail!("Either --file or --url is required"),
            };

            let now = Utc::now().with_timezone(&config.timezone).naive_local();
            let records: Vec<ImportRecord> =
                page::extract_event_page(&html, &page_url, now)
                    .map(candidate::CandidateEvent::into_import_record)
                    .into_iter()
                    .collect();

            if records.is_empty() {
                println!("⚠️  No event found on page");
            }
            write_batch(&records, output.as_deref())?;
        }
        Commands::Import { file } => {
            println!("🔄 Importing batch: {}", file.display());
            let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
            let importer = EventImporter::new(storage, config.timezone);

            let result = importer.import_from_file(&file).await;
            println!("{}", result.summary());
            println!("✅ Import completed");
        }
    }

    Ok(())
}

fn write_batch(records: &[ImportRecord], output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)?;
            info!("Wrote {} records to {}", records.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
