// projeto: lstmseq2seq
// file: src/rna/metrics.rs
// Loss curves and forecast error metrics

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

/// Mean training and validation loss, one value per completed epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossCurve {
    train: Vec<f64>,
    valid: Vec<f64>,
}

impl LossCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, train_loss: f64, valid_loss: f64) {
        self.train.push(train_loss);
        self.valid.push(valid_loss);
    }

    pub fn train(&self) -> &[f64] {
        &self.train
    }

    pub fn valid(&self) -> &[f64] {
        &self.valid
    }

    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    /// `(train, valid)` of the latest epoch.
    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.train.last()?, *self.valid.last()?))
    }

    /// Epoch index and value of the lowest validation loss.
    pub fn best_valid(&self) -> Option<(usize, f64)> {
        self.valid
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn save_to_csv(&self, file_path: &Path) -> Result<(), std::io::Error> {
        let mut file = File::create(file_path)?;

        writeln!(file, "epoch,train_loss,valid_loss")?;
        for (epoch, (train, valid)) in self.train.iter().zip(&self.valid).enumerate() {
            writeln!(file, "{},{:.8e},{:.8e}", epoch + 1, train, valid)?;
        }

        info!("📊 Loss curve saved to: {}", file_path.display());
        Ok(())
    }
}

pub fn calculate_rmse(predictions: &[f32], targets: &[f32]) -> f32 {
    let n = predictions.len().max(1) as f32;
    (predictions.iter().zip(targets).map(|(p, t)| (p - t).powi(2)).sum::<f32>() / n).sqrt()
}

pub fn calculate_mae(predictions: &[f32], targets: &[f32]) -> f32 {
    let n = predictions.len().max(1) as f32;
    predictions.iter().zip(targets).map(|(p, t)| (p - t).abs()).sum::<f32>() / n
}
