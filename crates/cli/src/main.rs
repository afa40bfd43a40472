use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use phishing_cli::{import, logging};
use phishing_core::config;
use phishing_core::config::AppConfig;
use phishing_core::features;
use phishing_core::pipeline;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use storage::models::SourceMetadata;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let cfg_path = cli.config.as_deref();

    match cli.command {
        Commands::Extract { url, pretty } => run_extract(&url, pretty),
        Commands::Import {
            name,
            source_url,
            file,
            label,
        } => run_import(config::load(cfg_path)?, name, source_url, file, label).await,
        Commands::BuildFeatures { json } => run_build_features(config::load(cfg_path)?, json).await,
        Commands::Export { output } => run_export(config::load(cfg_path)?, output).await,
        Commands::Predict { url, json } => run_predict(config::load(cfg_path)?, &url, json).await,
    }
}

#[derive(Parser)]
#[command(name = "phishing-detector")]
#[command(about = "Phishing URL detection from lexical URL features", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Label {
    Phishing,
    Legitimate,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the feature mapping of a single URL
    Extract {
        url: String,
        /// Pretty-print the JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Import a newline-separated URL list as a new source
    Import {
        /// Source name (must be unique)
        #[arg(long)]
        name: String,
        /// Where the list was obtained from
        #[arg(long)]
        source_url: String,
        /// File with one URL per line
        #[arg(long)]
        file: PathBuf,
        /// Label applied to every URL in the file
        #[arg(long, value_enum, default_value = "phishing")]
        label: Label,
    },
    /// Extract features for every stored URL
    BuildFeatures {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Export extracted rows as a JSON-lines dataset
    Export {
        /// Output file; defaults to a timestamped name in the working directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify a URL with the trained model, escalating ambiguous scores
    Predict {
        url: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

fn run_extract(url: &str, pretty: bool) -> Result<()> {
    let features = features::extract_feature(url).with_context(|| format!("extract {url}"))?;
    if pretty {
        println!("{}", serde_json::to_string_pretty(&features)?);
    } else {
        println!("{}", serde_json::to_string(&features)?);
    }
    Ok(())
}

async fn open_store(cfg: &AppConfig) -> Result<sqlx::SqlitePool> {
    let pool = storage::connect(&cfg.database.path)
        .await
        .context("db connect")?;
    storage::migrate(&pool).await.context("db migrate")?;
    Ok(pool)
}

async fn run_import(
    cfg: AppConfig,
    name: String,
    source_url: String,
    file: PathBuf,
    label: Label,
) -> Result<()> {
    let rows = import::read_url_list(&file, matches!(label, Label::Phishing))?;
    if rows.is_empty() {
        bail!("{} contains no URLs", file.display());
    }
    let pool = open_store(&cfg).await?;
    let metadata = SourceMetadata {
        name,
        url: source_url,
    };
    let (source, inserted) = storage::load_dataset(&pool, &metadata, &rows).await?;
    println!("imported {} urls into source {} ({})", inserted, source.name, source.id);
    Ok(())
}

async fn run_build_features(cfg: AppConfig, json: bool) -> Result<()> {
    let pool = open_store(&cfg).await?;
    let report = pipeline::run_build_features(&pool).await?;
    if json {
        let summary = serde_json::json!({
            "status": "ok",
            "processed": report.processed,
            "failed": report.failed,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "build-features: processed {}, failed {}",
            report.processed, report.failed
        );
    }
    Ok(())
}

async fn run_export(cfg: AppConfig, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "data_{}.jsonl",
            chrono::Local::now().format("%Y-%m-%d_%H:%M:%S")
        ))
    });
    let pool = open_store(&cfg).await?;
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    info!("Saving processed data to {}", path.display());
    let written = pipeline::export_dataset(&pool, BufWriter::new(file)).await?;
    println!("exported {} rows to {}", written, path.display());
    Ok(())
}

async fn run_predict(cfg: AppConfig, url: &str, json: bool) -> Result<()> {
    let classifier = pipeline::build_classifier(&cfg)?;
    let prediction = classifier
        .predict(url)
        .await
        .with_context(|| format!("predict {url}"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        println!("Probability: {:.4}", prediction.probability);
        println!("Prediction: {}", u8::from(prediction.is_phishing));
    }
    Ok(())
}
