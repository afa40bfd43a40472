use anyhow::ensure;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "PHISHING";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub classification: ClassificationConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// JSON file holding the trained model parameters.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub thresholds: Thresholds,
}

/// Probabilities at or below `legitimate` are accepted as safe, at or above
/// `phishing` as phishing. Anything between goes to the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub legitimate: f64,
    pub phishing: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            legitimate: 0.2,
            phishing: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let t = &self.classification.thresholds;
        ensure!(
            (0.0..=1.0).contains(&t.legitimate) && (0.0..=1.0).contains(&t.phishing),
            "thresholds must lie in [0, 1], got legitimate={} phishing={}",
            t.legitimate,
            t.phishing
        );
        ensure!(
            t.legitimate <= t.phishing,
            "legitimate threshold {} exceeds phishing threshold {}",
            t.legitimate,
            t.phishing
        );
        Ok(())
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let defaults = Thresholds::default();
    let mut settings = config::Config::builder()
        .set_default("database.path", "data/phishing.db")?
        .set_default("model.path", "models/phishing_model.json")?
        .set_default("classification.thresholds.legitimate", defaults.legitimate)?
        .set_default("classification.thresholds.phishing", defaults.phishing)?
        .set_default("llm.provider", "openai")?
        .set_default("llm.base_url", providers::openai::DEFAULT_BASE_URL)?
        .set_default("llm.model", providers::openai::DEFAULT_CHAT_MODEL)?;
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let cfg: AppConfig = settings.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phishing.toml");
        std::fs::write(
            &path,
            r#"
            [database]
            path = "/tmp/corpus.db"

            [classification.thresholds]
            legitimate = 0.3
            phishing = 0.7
            "#,
        )
        .unwrap();

        let cfg = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.database.path, "/tmp/corpus.db");
        assert_eq!(cfg.classification.thresholds.legitimate, 0.3);
        assert_eq!(cfg.classification.thresholds.phishing, 0.7);
        assert_eq!(cfg.llm.model, providers::openai::DEFAULT_CHAT_MODEL);
        assert_eq!(cfg.model.path, "models/phishing_model.json");
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            "[classification.thresholds]\nlegitimate = 0.9\nphishing = 0.1\n",
        )
        .unwrap();

        let err = load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
