use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod asset;
mod graph;
mod pipeline;
mod reconcile;
mod registry;
mod report;
mod spec;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "abilitygen")]
#[command(about = "Declarative gameplay-ability graph generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate an ability document (read-only).
    Check {
        #[arg(long)]
        doc: PathBuf,

        #[arg(long)]
        catalog: PathBuf,

        /// Reject unknown fields in the document.
        #[arg(long)]
        strict: bool,
    },

    /// Generate or update ability assets from a document.
    Generate {
        #[arg(long)]
        doc: PathBuf,

        #[arg(long)]
        catalog: PathBuf,

        /// Asset root directory (one JSON graph file per ability id).
        #[arg(long)]
        assets: PathBuf,

        /// Reject unknown fields in the document.
        #[arg(long)]
        strict: bool,

        /// Compute and report edit plans without applying them.
        #[arg(long)]
        dry_run: bool,

        /// Emit the full report as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let report = match cli.cmd {
        Commands::Check {
            doc,
            catalog,
            strict,
        } => {
            let document = std::fs::read_to_string(&doc)?;
            let catalog = registry::FileCatalog::load(&catalog)?;
            let report = pipeline::check(&document, &catalog, &catalog, strict);
            print!("{}", report.summary());
            report
        }

        Commands::Generate {
            doc,
            catalog,
            assets,
            strict,
            dry_run,
            json,
        } => {
            let document = std::fs::read_to_string(&doc)?;
            let catalog = registry::FileCatalog::load(&catalog)?;
            let store = asset::JsonAssetStore::new(assets);
            let locks = asset::AssetLocks::new();

            let report = pipeline::run(
                &document,
                &catalog,
                &catalog,
                &store,
                &locks,
                pipeline::PipelineOptions { strict, dry_run },
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.summary());
            }
            report
        }
    };

    std::process::exit(report.exit_code());
}
