//! Attribute CLI: analyze and edit provenance metadata of generated images.
//!
//! Usage:
//!   attribute analyze <PATH> [--format human|structured] [--threshold F]
//!   attribute view <IMAGE>
//!   attribute set <IMAGE> [--prompt P] [--model M] [--tag T]... [--custom K=V]...
//!   attribute export <IMAGE> [--format json|csv] [-o PATH]
//!   attribute import <FILE>

use attribute::metadata::{split_tags, ValidationError};
use attribute::{
    AttributeConfig, AttributeError, CombinationPolicy, ExportFormat, ExtractorKind,
    ImageMetadata, MetadataError, Pipeline, ReportFormat,
};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "attribute",
    version,
    about = "Provenance metadata for AI-generated images"
)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether an image carries generator attribution
    Analyze {
        path: PathBuf,
        /// Report format
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,
        /// Score at or above which the image counts as attributed
        #[arg(long)]
        threshold: Option<f64>,
        /// Combination policy (weighted-average or strongest-signal)
        #[arg(long)]
        policy: Option<CombinationPolicy>,
        /// Minimum summed weight of voting signals
        #[arg(long)]
        min_evidence: Option<f64>,
        /// Run only these extractors (repeatable)
        #[arg(long = "extractor")]
        extractors: Vec<ExtractorKind>,
        /// Per-extractor timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the metadata record of an image
    View { image: PathBuf },
    /// Merge the given fields into an image's metadata
    Set {
        image: PathBuf,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// ISO date, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Tag (repeatable, or comma-separated)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        copyright: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        /// Custom field as KEY=VALUE (repeatable)
        #[arg(long = "custom")]
        custom: Vec<String>,
    },
    /// Write an image's metadata to a JSON or CSV file
    Export {
        image: PathBuf,
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
        /// Output file (default: <image stem>.metadata.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Apply a JSON or CSV metadata file to the images it names
    Import { file: PathBuf },
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Print the single fatal error line and return its exit code
fn fail(err: AttributeError) -> i32 {
    eprintln!("error: {}: {}", err.stage(), err);
    err.exit_code()
}

struct AnalyzeOverrides {
    format: Option<ReportFormat>,
    threshold: Option<f64>,
    policy: Option<CombinationPolicy>,
    min_evidence: Option<f64>,
    extractors: Vec<ExtractorKind>,
    timeout_ms: Option<u64>,
}

fn apply_overrides(mut config: AttributeConfig, overrides: AnalyzeOverrides) -> AttributeConfig {
    if let Some(format) = overrides.format {
        config.report_format = format;
    }
    if let Some(threshold) = overrides.threshold {
        config.aggregation.threshold = threshold;
    }
    if let Some(policy) = overrides.policy {
        config.aggregation.policy = policy;
    }
    if let Some(min_evidence) = overrides.min_evidence {
        config.aggregation.min_evidence = min_evidence;
    }
    if !overrides.extractors.is_empty() {
        config.extractors = overrides.extractors;
    }
    if let Some(timeout_ms) = overrides.timeout_ms {
        config.extractor_timeout_ms = timeout_ms;
    }
    config
}

async fn cmd_analyze(config: AttributeConfig, path: &Path) -> i32 {
    if let Err(e) = config.validate() {
        return fail(e.into());
    }
    let pipeline = Pipeline::from_config(&config);
    let verdict = match pipeline.analyze_path(path).await {
        Ok(verdict) => verdict,
        Err(e) => return fail(e),
    };
    match attribute::render(&verdict, config.report_format) {
        Ok(text) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            0
        }
        Err(e) => fail(e.into()),
    }
}

fn print_metadata(image: &Path, meta: &ImageMetadata) {
    let show = |value: Option<&str>| match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => "-".to_string(),
    };
    println!("{}", image.display());
    println!("  prompt:      {}", show(Some(meta.prompt.as_str())));
    println!("  model:       {}", show(Some(meta.model.as_str())));
    println!("  date:        {}", show(meta.date.as_deref()));
    println!("  description: {}", show(meta.description.as_deref()));
    println!("  tags:        {}", show(Some(meta.tags_joined().as_str())));
    println!("  copyright:   {}", show(meta.copyright.as_deref()));
    println!("  artist:      {}", show(meta.artist.as_deref()));
    if !meta.custom_fields.is_empty() {
        println!("  custom:");
        for (key, value) in &meta.custom_fields {
            println!("    {}: {}", key, value);
        }
    }
}

fn cmd_view(image: &Path) -> i32 {
    match attribute::read_metadata(image) {
        Ok(meta) => {
            if meta.is_empty() {
                println!("No metadata found in {}", image.display());
            } else {
                print_metadata(image, &meta);
            }
            0
        }
        Err(e) => fail(e.into()),
    }
}

fn parse_custom(pairs: &[String]) -> Result<Vec<(String, String)>, MetadataError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(MetadataError::Invalid(ValidationError(format!(
                "custom field '{}' is not KEY=VALUE",
                pair
            )))),
        })
        .collect()
}

fn cmd_set(image: &Path, mut update: ImageMetadata, custom: &[String]) -> i32 {
    let custom = match parse_custom(custom) {
        Ok(custom) => custom,
        Err(e) => return fail(e.into()),
    };
    update.custom_fields.extend(custom);

    if update.is_empty() {
        eprintln!("error: set: no fields given");
        return 1;
    }
    match attribute::write_metadata(image, &update) {
        Ok(written) => {
            println!("Updated metadata in {}", image.display());
            print_metadata(image, &written);
            0
        }
        Err(e) => fail(e.into()),
    }
}

fn cmd_export(image: &Path, format: Option<ExportFormat>, output: Option<&Path>) -> i32 {
    let format = format
        .or_else(|| output.and_then(ExportFormat::from_path))
        .unwrap_or_default();
    match attribute::export::export_metadata(image, format, output) {
        Ok(written) => {
            println!("Exported metadata to {}", written.display());
            0
        }
        Err(e) => fail(e.into()),
    }
}

fn cmd_import(file: &Path) -> i32 {
    match attribute::export::import_metadata(file) {
        Ok(updated) => {
            if updated.is_empty() {
                println!("No images updated.");
            } else {
                println!("Updated {} image(s):", updated.len());
                for path in updated {
                    println!("  {}", path.display());
                }
            }
            0
        }
        Err(e) => fail(e.into()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match AttributeConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => std::process::exit(fail(e.into())),
    };

    let code = match cli.command {
        Commands::Analyze {
            path,
            format,
            threshold,
            policy,
            min_evidence,
            extractors,
            timeout_ms,
        } => {
            let config = apply_overrides(
                config,
                AnalyzeOverrides {
                    format,
                    threshold,
                    policy,
                    min_evidence,
                    extractors,
                    timeout_ms,
                },
            );
            cmd_analyze(config, &path).await
        }
        Commands::View { image } => cmd_view(&image),
        Commands::Set {
            image,
            prompt,
            model,
            date,
            description,
            tags,
            copyright,
            artist,
            custom,
        } => {
            let update = ImageMetadata {
                prompt: prompt.unwrap_or_default(),
                model: model.unwrap_or_default(),
                date,
                description,
                tags: tags.iter().flat_map(|t| split_tags(t)).collect(),
                copyright,
                artist,
                custom_fields: Default::default(),
            };
            cmd_set(&image, update, &custom)
        }
        Commands::Export {
            image,
            format,
            output,
        } => cmd_export(&image, format, output.as_deref()),
        Commands::Import { file } => cmd_import(&file),
    };
    std::process::exit(code);
}
