//! Comic ingest CLI
//!
//! Local execution entry point. For AWS Lambda, use `comic-ingest-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comic_ingest::{
    ComicService,
    config::load_config,
    error::Result,
    storage::{KvStore, LocalStorage, MemoryStorage},
};

/// Mirror xkcd comics and their explanations into a local store
#[derive(Parser, Debug)]
#[command(
    name = "comic-ingest",
    version,
    about = "Comic and annotation ingestion pipeline"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Storage directory (overrides storage.root_dir)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Keep everything in memory for this run only
    #[arg(long, conflicts_with = "storage_dir")]
    memory: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest comics, advancing the scrape cursor
    Scrape {
        /// Ingest this comic instead of the next one after the cursor
        #[arg(long)]
        id: Option<u32>,

        /// Number of consecutive scheduled runs to perform
        #[arg(long, default_value_t = 1, conflicts_with = "id")]
        ticks: u32,
    },

    /// Print a stored comic, ingesting it on a miss
    Get { num: u32 },

    /// Write a comic's mirrored image to a file
    Image {
        num: u32,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print the comic after NUM
    Next { num: u32 },

    /// Print the comic before NUM
    Prev { num: u32 },

    /// Print a random stored comic number
    Random,

    /// List stored comic numbers in order
    List,

    /// Export every stored comic as a JSON array
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Upgrade records stored under an older schema version
    Migrate,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_id(label: &str, num: Option<u32>) {
    match num {
        Some(num) => println!("{num}"),
        None => log::warn!("No {} comic found", label),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(&cli.config)?;
    if let Some(dir) = &cli.storage_dir {
        config.storage.root_dir = dir.display().to_string();
    }

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        config.validate()?;
        log::info!("✓ Config OK ({})", cli.config.display());
        return Ok(());
    }

    let kv: Arc<dyn KvStore> = if cli.memory {
        log::info!("Using in-memory storage");
        Arc::new(MemoryStorage::with_page_size(config.storage.page_size))
    } else {
        log::info!("Using storage directory {}", config.storage.root_dir);
        Arc::new(LocalStorage::with_page_size(
            &config.storage.root_dir,
            config.storage.page_size,
        ))
    };
    let service = ComicService::from_config(&config, kv)?;

    match cli.command {
        Command::Scrape { id, ticks } => {
            let runs = if id.is_some() { 1 } else { ticks };
            let mut stored = 0;
            for tick in 1..=runs {
                log::debug!("Run {}/{}", tick, runs);
                if service.ingest(id).await?.is_some() {
                    stored += 1;
                }
            }
            log::info!("Scrape complete: {} of {} runs stored a comic", stored, runs);
        }

        Command::Get { num } => match service.get(num).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => log::warn!("Comic {} does not exist", num),
        },

        Command::Image { num, out } => match service.get_image(num).await? {
            Some(blob) => {
                tokio::fs::write(&out, &blob.body).await?;
                log::info!(
                    "Wrote {} bytes ({}) to {}",
                    blob.body.len(),
                    blob.content_type().unwrap_or("unknown type"),
                    out.display()
                );
            }
            None => log::warn!("No image for comic {}", num),
        },

        Command::Next { num } => print_id("next", service.next(num).await?),

        Command::Prev { num } => print_id("previous", service.prev(num).await?),

        Command::Random => print_id("random", service.random().await?),

        Command::List => {
            let ids = service.ids().await?;
            for num in &ids {
                println!("{num}");
            }
            log::info!("{} comics stored", ids.len());
        }

        Command::Export { out } => {
            let records = service.export().await?;
            let json = serde_json::to_string_pretty(&records)?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, json).await?;
                    log::info!("Exported {} comics to {}", records.len(), path.display());
                }
                None => println!("{json}"),
            }
        }

        Command::Migrate => {
            let report = service.migrate().await?;
            log::info!(
                "Migrated {} of {} records",
                report.upgraded,
                report.scanned
            );
        }

        Command::Validate => {}
    }

    Ok(())
}
