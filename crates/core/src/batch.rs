//! Row-wise feature extraction with per-row failure isolation.

use crate::features::{extract_feature, FeatureError, FeatureVector};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn record<T, E>(&mut self, outcome: &Result<T, E>) {
        self.processed += 1;
        if outcome.is_err() {
            self.failed += 1;
        }
    }

    pub fn succeeded(&self) -> usize {
        self.processed - self.failed
    }
}

/// Extracts features for every URL. Output `i` belongs to input `i`; a bad
/// row is logged and reported in place without stopping the batch.
pub fn extract_batch<'a, I>(urls: I) -> Vec<Result<FeatureVector, FeatureError>>
where
    I: IntoIterator<Item = &'a str>,
{
    urls.into_iter()
        .map(|url| {
            let outcome = extract_feature(url);
            if let Err(e) = &outcome {
                error!(url = %url, error = %e, "feature extraction failed");
            }
            outcome
        })
        .collect()
}

pub fn summarize<T, E>(outcomes: &[Result<T, E>]) -> BatchReport {
    let mut report = BatchReport::default();
    for outcome in outcomes {
        report.record(outcome);
    }
    report
}
