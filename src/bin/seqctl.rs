//! seqctl - Command-line interface for measurement sequences
//!
//! Provides subcommands for viewing, exporting, inspecting, and dry-running
//! sequence files.

use anyhow::Context;
use clap::{Parser, Subcommand};
use measure_seq::runner::{DummyDevice, RunnerConfig, SequenceRunner, load_config, write_config};
use measure_seq::sequence::storage::{SequenceDocument, export};
use measure_seq::sequence::{flatten, parse_file};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "seqctl")]
#[command(about = "Parse, export, and dry-run measurement sequences", long_about = None)]
struct Cli {
    /// Runner configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the display list of a sequence
    Show {
        /// Sequence file
        file: PathBuf,
    },

    /// Write binary and JSON documents next to a sequence
    Export {
        /// Sequence file
        file: PathBuf,
    },

    /// Summarize an exported document
    Inspect {
        /// Document file (.seqb or .json)
        document: PathBuf,

        /// Source file to check the document against
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Execute a sequence against the logging dummy device
    DryRun {
        /// Sequence file
        file: PathBuf,

        /// Print every device call after the run
        #[arg(long)]
        calls: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RunnerConfig::default(),
    };
    let options = config.parser_options();

    match cli.command {
        Commands::Show { file } => {
            let parsed = parse_file(&file, &options)
                .with_context(|| format!("failed to parse {}", file.display()))?;
            for line in flatten(&parsed.commands, &options) {
                println!("{}", line.text);
            }
        }

        Commands::Export { file } => {
            let (document, paths) = export(&file, &options)
                .with_context(|| format!("failed to export {}", file.display()))?;
            println!("Exported {} commands", document.commands.len());
            println!("  binary: {}", paths.binary.display());
            println!("  json:   {}", paths.json.display());
        }

        Commands::Inspect { document, source } => {
            let doc = SequenceDocument::load(&document)
                .with_context(|| format!("failed to load {}", document.display()))?;
            println!("Source:      {}", doc.source);
            println!("Hash:        {}", doc.source_hash);
            println!("Exported at: {}", doc.exported_at.to_rfc3339());
            println!("Commands:    {}", doc.commands.len());
            if let Some(source) = source {
                let text = fs::read_to_string(&source)
                    .with_context(|| format!("failed to read {}", source.display()))?;
                if doc.is_current(&text) {
                    println!("Status:      current");
                } else {
                    println!("Status:      stale (re-export {})", source.display());
                }
            }
        }

        Commands::DryRun { file, calls } => {
            let parsed = parse_file(&file, &options)
                .with_context(|| format!("failed to parse {}", file.display()))?;
            let device = Arc::new(DummyDevice::new());
            let runner = SequenceRunner::with_config(parsed, device.clone(), config);
            let outcome = runner.run()?;
            println!("{outcome}");
            if calls {
                for call in device.calls() {
                    println!("  {call}");
                }
            }
            for message in device.messages() {
                println!("message: {message}");
            }
        }

        Commands::InitConfig { path } => {
            write_config(&RunnerConfig::default(), &path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}
