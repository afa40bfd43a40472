use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use storage::models::NewUrl;

/// Parses a newline-separated URL list. Blank lines and `#` comments are skipped.
pub fn parse_url_list(content: &str, is_phishing: bool) -> Vec<NewUrl> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| NewUrl {
            url: line.to_string(),
            is_phishing,
        })
        .collect()
}

pub fn read_url_list(path: &Path, is_phishing: bool) -> Result<Vec<NewUrl>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read url list {}", path.display()))?;
    Ok(parse_url_list(&content, is_phishing))
}
