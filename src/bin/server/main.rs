//! OAR KV-Map Server and CLI
//!
//! A cross-platform binary that propagates key/value templates onto new
//! images, from the command line or over HTTP.
//!
//! # Usage
//!
//! ## Single image
//! ```bash
//! oar-kvmap-server align --template template.json --generic generic/0001.json --domain domain/0001.json
//! ```
//!
//! ## Batch
//! ```bash
//! oar-kvmap-server batch --template template.json --generic-dir generic --domain-dir domain --output-dir out
//! ```
//!
//! ## Server Mode
//! ```bash
//! oar-kvmap-server serve --port 8080 --key-snap-radius 40
//! ```

mod api;
mod cli;
mod config;
mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "oar-kvmap-server")]
#[command(author = "OAR-OCR Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Key/value template alignment via CLI or HTTP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align a template onto a single image
    Align {
        /// Template annotation document
        #[arg(long, env = "OAR_KV_TEMPLATE")]
        template: PathBuf,

        /// Generic OCR payload of the target image
        #[arg(long)]
        generic: PathBuf,

        /// Domain OCR payload of the target image
        #[arg(long)]
        domain: PathBuf,

        /// Image name written into the output document
        #[arg(long = "image-name")]
        image_name: Option<String>,

        /// Output file (prints to stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format (document, compact, result, manual, summary)
        #[arg(long, default_value = "document")]
        format: String,

        #[command(flatten)]
        tuning: config::TuningArgs,
    },
    /// Align a template onto every image of a folder
    Batch {
        /// Template annotation document
        #[arg(long, env = "OAR_KV_TEMPLATE")]
        template: PathBuf,

        /// Folder of generic OCR payloads (<stem>.json)
        #[arg(long = "generic-dir", env = "OAR_KV_GENERIC_DIR")]
        generic_dir: PathBuf,

        /// Folder of domain OCR payloads (<stem>.json)
        #[arg(long = "domain-dir", env = "OAR_KV_DOMAIN_DIR")]
        domain_dir: PathBuf,

        /// Folder receiving the aligned documents
        #[arg(long = "output-dir", env = "OAR_KV_OUTPUT_DIR")]
        output_dir: PathBuf,

        /// Folder of target images; pairs by image file stem when given
        #[arg(long = "image-dir")]
        image_dir: Option<PathBuf>,

        /// Write the compact export (no ids, integer boxes)
        #[arg(long)]
        compact: bool,

        /// Align images on this many threads (sequential when omitted)
        #[arg(long, env = "OAR_KV_WORKERS")]
        workers: Option<usize>,

        /// Write the batch report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        tuning: config::TuningArgs,
    },
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, short, default_value = "8080", env = "OAR_KV_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "OAR_KV_HOST")]
        host: String,

        #[command(flatten)]
        tuning: config::TuningArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    oar_kvmap::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Align {
            template,
            generic,
            domain,
            image_name,
            output,
            format,
            tuning,
        } => {
            let config = tuning.resolve()?;
            info!("Aligning {} onto {}", template.display(), generic.display());
            let args = cli::AlignArgs {
                template,
                generic,
                domain,
                image_name,
                output,
                format,
            };
            cli::process_single(&args, config)?;
        }
        Commands::Batch {
            template,
            generic_dir,
            domain_dir,
            output_dir,
            image_dir,
            compact,
            workers,
            report,
            tuning,
        } => {
            let config = tuning.resolve()?;
            info!("Processing folder: {}", generic_dir.display());
            let args = cli::BatchArgs {
                template,
                generic_dir,
                domain_dir,
                output_dir,
                image_dir,
                compact,
                workers,
                report,
            };
            cli::process_batch(args, config).await?;
        }
        Commands::Serve { port, host, tuning } => {
            let config = config::ServerConfig {
                align: tuning.resolve()?,
                host,
                port,
            };

            info!("Starting server on {}:{}", config.host, config.port);
            server::run_server(config).await?;
        }
    }

    Ok(())
}
