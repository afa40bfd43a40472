use crate::config::Thresholds;
use crate::features::{extract_feature, FeatureError, FeatureVector, NUMERIC_COLUMNS};
use anyhow::Context;
use providers::ProviderRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("feature {0} is missing")]
    MissingFeature(&'static str),
    #[error("invalid model: {0}")]
    InvalidModel(String),
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("model cannot score url: {0}")]
    Model(#[from] ClassifierError),
}

/// Trained primary model. Scores the numeric feature columns only.
pub trait PhishingModel: Send + Sync {
    /// Probability that the URL behind `features` is phishing.
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ClassifierError>;
}

/// Standardised logistic regression exported from the training job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let model: Self = serde_json::from_str(raw)
            .map_err(|e| ClassifierError::InvalidModel(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read model {}", path.display()))?;
        let model =
            Self::from_json(&raw).with_context(|| format!("parse model {}", path.display()))?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        let names: Vec<&str> = self.feature_names.iter().map(String::as_str).collect();
        if names != NUMERIC_COLUMNS {
            return Err(ClassifierError::InvalidModel(format!(
                "feature columns {:?} do not match {:?}",
                names, NUMERIC_COLUMNS
            )));
        }
        let n = NUMERIC_COLUMNS.len();
        if self.means.len() != n || self.scales.len() != n || self.weights.len() != n {
            return Err(ClassifierError::InvalidModel(format!(
                "expected {n} means, scales and weights"
            )));
        }
        if self.scales.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ClassifierError::InvalidModel(
                "scales must be finite and non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl PhishingModel for LogisticModel {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ClassifierError> {
        let mut z = self.intercept;
        for (i, value) in features.numeric_columns().into_iter().enumerate() {
            let x = value.ok_or(ClassifierError::MissingFeature(NUMERIC_COLUMNS[i]))?;
            z += self.weights[i] * (x - self.means[i]) / self.scales[i];
        }
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Phishing,
    Legitimate,
    Ambiguous,
}

pub fn decide(probability: f64, thresholds: &Thresholds) -> Band {
    if probability >= thresholds.phishing {
        Band::Phishing
    } else if probability <= thresholds.legitimate {
        Band::Legitimate
    } else {
        Band::Ambiguous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Model,
    Llm,
    /// The LLM could not answer, so the URL is treated as phishing.
    FailSafe,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub url: String,
    pub probability: f64,
    pub is_phishing: bool,
    pub source: VerdictSource,
}

pub struct Classifier {
    model: Arc<dyn PhishingModel>,
    registry: ProviderRegistry,
    thresholds: Thresholds,
    provider: Option<String>,
}

impl Classifier {
    pub fn new(
        model: Arc<dyn PhishingModel>,
        registry: ProviderRegistry,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            model,
            registry,
            thresholds,
            provider: None,
        }
    }

    /// Pins the LLM provider instead of the registry's preferred one.
    pub fn with_provider(mut self, name: &str) -> Self {
        self.provider = Some(name.to_string());
        self
    }

    /// Only probabilities inside the ambiguous band reach the LLM. A vector
    /// the model cannot score is an error.
    pub async fn predict(&self, url: &str) -> Result<Prediction, PredictError> {
        let features = extract_feature(url)?;
        let probability = self.model.predict_proba(&features)?;

        let (is_phishing, source) = match decide(probability, &self.thresholds) {
            Band::Phishing => (true, VerdictSource::Model),
            Band::Legitimate => (false, VerdictSource::Model),
            Band::Ambiguous => {
                debug!(url = %url, probability, "ambiguous probability, asking llm");
                self.escalate(url).await
            }
        };

        Ok(Prediction {
            url: url.to_string(),
            probability,
            is_phishing,
            source,
        })
    }

    async fn escalate(&self, url: &str) -> (bool, VerdictSource) {
        let llm = match self.registry.llm(self.provider.as_deref()) {
            Ok(llm) => llm,
            Err(e) => {
                warn!(url = %url, error = %e, "no llm available, assuming phishing");
                return (true, VerdictSource::FailSafe);
            }
        };
        match llm.classify_url(url).await {
            Ok(guess) => (guess, VerdictSource::Llm),
            Err(e) => {
                warn!(url = %url, error = %e, "llm classification failed, assuming phishing");
                (true, VerdictSource::FailSafe)
            }
        }
    }
}
