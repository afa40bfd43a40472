use serde::{Deserialize, Serialize};

/// A dataset the URLs were imported from.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub name: String,
    pub url: String,
}

/// A labeled URL as stored in the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UrlRecord {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub is_phishing: bool,
    pub is_online: bool,
    /// JSON-encoded feature mapping, `None` until extracted or when extraction failed.
    pub features: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUrl {
    pub url: String,
    pub is_phishing: bool,
}
