//! fungal-traits: annotate a fungal taxonomy with spore volumes and FungalTraits
//!
//! Usage:
//!   fungal-traits annotate --taxonomy <DIR> --output <FILE> [--format tsv|parquet]
//!   fungal-traits validate-traits <FILE>

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use fungal_traits_rust::data::validate_trait_file;
use fungal_traits_rust::logging::init_logging;
use fungal_traits_rust::{AnnotatorConfig, OutputFormat, PrefixDetection, SporeFilterPolicy, TraitAnnotator};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fungal-traits",
    version,
    about = "Annotate fungal taxonomy with spore volume and FungalTraits lifestyle data"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate the taxonomy.tsv inside a taxonomy directory
    Annotate(AnnotateArgs),

    /// Check a FungalTraits table header
    ValidateTraits {
        /// FungalTraits table (TSV)
        file: PathBuf,
    },
}

#[derive(Args)]
struct AnnotateArgs {
    /// Directory containing taxonomy.tsv
    #[arg(long, value_name = "DIR")]
    taxonomy: PathBuf,

    /// Output file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    format: OutputFormat,

    /// Annotator config (JSON)
    #[arg(long, env = "FUNGAL_TRAITS_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the spore measurement table
    #[arg(long, value_name = "FILE")]
    spore_data: Option<PathBuf>,

    /// Override the FungalTraits table
    #[arg(long, value_name = "FILE")]
    fungal_traits: Option<PathBuf>,

    #[arg(long, value_enum)]
    prefix_detection: Option<PrefixDetection>,

    #[arg(long, value_enum)]
    spore_filter: Option<SporeFilterPolicy>,
}

impl AnnotateArgs {
    fn resolve_config(&self) -> Result<AnnotatorConfig> {
        let mut config = match &self.config {
            Some(path) => AnnotatorConfig::load(path)?,
            None => AnnotatorConfig::from_env(),
        };

        if let Some(path) = &self.spore_data {
            config.spore_data_path = path.clone();
        }
        if let Some(path) = &self.fungal_traits {
            config.fungal_traits_path = path.clone();
        }
        if let Some(detection) = self.prefix_detection {
            config.prefix_detection = detection;
        }
        if let Some(policy) = self.spore_filter {
            config.spore_filter = policy;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Annotate(args) => {
            let config = args.resolve_config()?;
            let annotator = TraitAnnotator::new(config)?;
            let table = annotator.annotate(&args.taxonomy)?;
            table.write(&args.output, args.format)?;
        }
        Commands::ValidateTraits { file } => {
            validate_trait_file(&file)?;
            tracing::info!(?file, "FungalTraits header is valid");
        }
    }

    Ok(())
}
