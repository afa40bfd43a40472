use phishing_core::classifier::{Classifier, LogisticModel, VerdictSource};
use phishing_core::config::Thresholds;
use phishing_core::features::NUMERIC_COLUMNS;
use providers::{LlmProvider, ProviderError, ProviderRegistry};
use std::sync::Arc;

struct AlwaysSafe;

#[async_trait::async_trait]
impl LlmProvider for AlwaysSafe {
    async fn classify_url(&self, _url: &str) -> Result<bool, ProviderError> {
        Ok(false)
    }
}

fn write_model(dir: &std::path::Path, digit_weight: f64, intercept: f64) -> std::path::PathBuf {
    let mut weights = vec![0.0; NUMERIC_COLUMNS.len()];
    // no_of_digits
    weights[7] = digit_weight;
    let model = serde_json::json!({
        "feature_names": NUMERIC_COLUMNS,
        "means": vec![0.0; NUMERIC_COLUMNS.len()],
        "scales": vec![1.0; NUMERIC_COLUMNS.len()],
        "weights": weights,
        "intercept": intercept,
    });
    let path = dir.join("model.json");
    std::fs::write(&path, model.to_string()).unwrap();
    path
}

fn classifier(model: LogisticModel) -> Classifier {
    let registry = ProviderRegistry::new()
        .with_llm("safe", Arc::new(AlwaysSafe))
        .set_preferred_llm("safe");
    Classifier::new(Arc::new(model), registry, Thresholds::default())
}

#[tokio::test]
async fn model_file_drives_the_verdict() {
    let temp = tempfile::tempdir().unwrap();
    let path = write_model(temp.path(), 3.0, -1.0);
    let model = LogisticModel::load(&path).unwrap();
    let c = classifier(model);

    // one digit in the root label: z = 2.0
    let p = c.predict("http://paypa1.com/login").await.unwrap();
    assert!(p.probability > 0.8);
    assert!(p.is_phishing);
    assert_eq!(p.source, VerdictSource::Model);

    // no digits: z = -1.0, inside the ambiguous band
    let p = c.predict("https://www.example.com").await.unwrap();
    let prob = p.probability;
    assert!(prob > 0.2 && prob < 0.8);
    assert!(!p.is_phishing);
    assert_eq!(p.source, VerdictSource::Llm);
}

#[tokio::test]
async fn missing_model_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    assert!(LogisticModel::load(&temp.path().join("absent.json")).is_err());
}
