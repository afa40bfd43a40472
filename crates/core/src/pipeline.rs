use crate::batch::{self, BatchReport};
use crate::classifier::{Classifier, LogisticModel};
use crate::config::AppConfig;
use crate::features::{FeatureVector, FEATURE_COLUMNS};
use anyhow::Context;
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sqlx::SqlitePool;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Extracts features for every stored URL and writes them back.
///
/// Rows that fail extraction get their feature column cleared; the run
/// carries on with the next row. All updates commit together or not at all.
pub async fn run_build_features(pool: &SqlitePool) -> anyhow::Result<BatchReport> {
    info!("Loading URLs from the database...");
    let rows = storage::fetch_urls(pool).await.context("fetch urls")?;
    info!("Extracting features from {} URLs...", rows.len());

    let outcomes = batch::extract_batch(rows.iter().map(|r| r.url.as_str()));
    let report = batch::summarize(&outcomes);

    let mut tx = pool.begin().await.context("begin feature write-back")?;
    for (row, outcome) in rows.iter().zip(outcomes) {
        let value = match outcome {
            Ok(features) => Some(serde_json::to_value(&features)?),
            Err(_) => None,
        };
        storage::set_features(&mut *tx, row.id, value.as_ref())
            .await
            .with_context(|| format!("store features for url {}", row.id))?;
    }
    tx.commit().await.context("commit feature write-back")?;

    info!(
        processed = report.processed,
        failed = report.failed,
        "Feature extraction complete."
    );
    Ok(report)
}

/// Feature half of a dataset row. Rows without usable features still emit
/// every column, as `null`.
enum RowFeatures {
    Extracted(FeatureVector),
    Missing,
}

impl Serialize for RowFeatures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowFeatures::Extracted(features) => features.serialize(serializer),
            RowFeatures::Missing => {
                let mut map = serializer.serialize_map(Some(FEATURE_COLUMNS.len()))?;
                for column in FEATURE_COLUMNS {
                    map.serialize_entry(column, &())?;
                }
                map.end()
            }
        }
    }
}

#[derive(Serialize)]
struct DatasetRow<'a> {
    url: &'a str,
    is_phishing: u8,
    #[serde(flatten)]
    features: RowFeatures,
}

/// Writes one JSON object per stored row. Rows whose extraction failed keep
/// their place with null feature columns. Returns the number of rows written.
pub async fn export_dataset<W: Write>(pool: &SqlitePool, mut writer: W) -> anyhow::Result<usize> {
    let rows = storage::fetch_urls(pool).await.context("fetch urls")?;
    let mut written = 0usize;
    for row in &rows {
        let features = match row.features.as_deref().map(serde_json::from_str::<FeatureVector>) {
            Some(Ok(f)) => RowFeatures::Extracted(f),
            Some(Err(e)) => {
                warn!(id = row.id, error = %e, "stored features unreadable, exporting nulls");
                RowFeatures::Missing
            }
            None => RowFeatures::Missing,
        };
        let record = DatasetRow {
            url: &row.url,
            is_phishing: u8::from(row.is_phishing),
            features,
        };
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    info!("Exported {} rows.", written);
    Ok(written)
}

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_llm("noop", Arc::new(NoopProvider));

    let key = std::env::var_os("OPENROUTER_API_KEY").or_else(|| std::env::var_os("OPENAI_API_KEY"));
    if let Some(key) = key {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url: config.llm.base_url.clone(),
            chat_model: config.llm.model.clone(),
        });
        reg = reg.with_llm("openai", Arc::new(provider));
    } else {
        warn!("No LLM API key set; ambiguous URLs will be reported as phishing.");
    }

    reg.set_preferred_llm(&config.llm.provider)
}

pub fn build_classifier(config: &AppConfig) -> anyhow::Result<Classifier> {
    let model = LogisticModel::load(Path::new(&config.model.path))?;
    Ok(Classifier::new(
        Arc::new(model),
        build_registry(config),
        config.classification.thresholds,
    ))
}
