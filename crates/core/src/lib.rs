//! Core library: URL feature extraction, batch processing, classification.

pub mod batch;
pub mod classifier;
pub mod config;
pub mod features;
pub mod pipeline;

pub use features::{extract_feature, FeatureError, FeatureVector};
