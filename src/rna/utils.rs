// projeto: lstmseq2seq
// file: src/rna/utils.rs
// Error handling and small validation helpers shared by the pipeline



use std::path::{Path, PathBuf};

use ndarray::{Array2, ShapeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Index {index} out of range for {axis} (size {size})")]
    InvalidIndex { axis: &'static str, index: usize, size: usize },

    #[error("Shape error: {0}")]
    ShapeMismatch(String),

    #[error("Failed to import {}: {reason}", path.display())]
    Import { path: PathBuf, reason: String },

    #[error("Training diverged at epoch {epoch}: loss = {loss}")]
    Diverged { epoch: usize, loss: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Model recorder error: {0}")]
    Recorder(String),
}

impl ForecastError {
    pub fn import(path: &Path, reason: impl Into<String>) -> Self {
        ForecastError::Import {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl From<ShapeError> for ForecastError {
    fn from(err: ShapeError) -> Self {
        ForecastError::ShapeMismatch(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Serialization(err.to_string())
    }
}

impl From<burn::record::RecorderError> for ForecastError {
    fn from(err: burn::record::RecorderError) -> Self {
        ForecastError::Recorder(format!("{:?}", err))
    }
}

impl From<burn::tensor::DataError> for ForecastError {
    fn from(err: burn::tensor::DataError) -> Self {
        ForecastError::ShapeMismatch(format!("{:?}", err))
    }
}

/// Rejects series containing NaN or infinite values.
pub fn validate_series(series: &Array2<f32>) -> Result<(), ForecastError> {
    if let Some((idx, value)) = series.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(ForecastError::ShapeMismatch(format!(
            "non-finite value {} at (t={}, channel={})",
            value, idx.0, idx.1
        )));
    }
    Ok(())
}

/// Parses a number written with either a decimal point or a decimal comma.
pub fn parse_decimal(raw: &str) -> Option<f32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse::<f32>().ok()
}
