// projeto: lstmseq2seq
// file: src/rna/storage.rs
// Model snapshots: burn binary record plus a JSON metadata sidecar



use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{BinBytesRecorder, BinFileRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::Backend,
};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::rna::data::{ChannelStats, WindowSpec};
use crate::rna::metrics::LossCurve;
use crate::rna::model::{Seq2Seq, Seq2SeqConfig};
use crate::rna::utils::ForecastError;

/// Everything needed to rebuild the architecture and interpret its forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub input_size: usize,
    pub hidden_size: usize,
    pub window: WindowSpec,
    pub channel_stats: Option<ChannelStats>,
    pub epochs_trained: usize,
    pub final_train_loss: Option<f64>,
    pub final_valid_loss: Option<f64>,
    pub timestamp: String,
}

impl ModelMetadata {
    pub fn new(config: &Seq2SeqConfig, window: WindowSpec) -> Self {
        Self {
            input_size: config.input_size,
            hidden_size: config.hidden_size,
            window,
            channel_stats: None,
            epochs_trained: 0,
            final_train_loss: None,
            final_valid_loss: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_channel_stats(mut self, stats: ChannelStats) -> Self {
        self.channel_stats = Some(stats);
        self
    }

    pub fn with_loss_curve(mut self, curve: &LossCurve) -> Self {
        self.epochs_trained = curve.len();
        if let Some((train, valid)) = curve.last() {
            self.final_train_loss = Some(train);
            self.final_valid_loss = Some(valid);
        }
        self
    }

    pub fn model_config(&self) -> Seq2SeqConfig {
        Seq2SeqConfig::new(self.input_size, self.hidden_size)
    }
}

pub fn metadata_path(model_path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.metadata.json", model_path.display()))
}

pub fn save_model<B: Backend>(model: &Seq2Seq<B>, path: &Path, metadata: &ModelMetadata) -> Result<(), ForecastError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    model
        .clone()
        .save_file(path, &BinFileRecorder::<FullPrecisionSettings>::new())?;
    fs::write(metadata_path(path), serde_json::to_string_pretty(metadata)?)?;

    info!("💾 Model saved to {} ({} parameters)", path.display(), model.num_params());
    Ok(())
}

/// Rebuilds a model with the architecture recorded in the metadata, then restores its weights.
pub fn load_model<B: Backend>(path: &Path, device: &B::Device) -> Result<(Seq2Seq<B>, ModelMetadata), ForecastError> {
    let meta_path = metadata_path(path);
    let json = fs::read_to_string(&meta_path).map_err(|e| ForecastError::import(&meta_path, e.to_string()))?;
    let metadata: ModelMetadata = serde_json::from_str(&json)?;

    let model = metadata
        .model_config()
        .init::<B>(device)
        .load_file(path, &BinFileRecorder::<FullPrecisionSettings>::new(), device)?;

    info!("📂 Model loaded from {} (saved {})", path.display(), metadata.timestamp);
    Ok((model, metadata))
}

/// In-memory snapshot of the parameters, byte-comparable between calls.
pub fn parameter_bytes<B: Backend>(model: &Seq2Seq<B>) -> Result<Vec<u8>, ForecastError> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    Ok(Recorder::<B>::record(&recorder, model.clone().into_record(), ())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Tensor, TensorData};

    type TestBackend = NdArray;

    fn probe(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 3> {
        let values: Vec<f32> = (0..24).map(|i| (i as f32 * 0.25).cos()).collect();
        Tensor::from_data(TensorData::new(values, [8, 1, 3]), device)
    }

    #[test]
    fn test_save_load_reproduces_forecasts() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("seq2seq");

        let config = Seq2SeqConfig::new(3, 6);
        let model = config.init::<TestBackend>(&device);
        let metadata = ModelMetadata::new(&config, WindowSpec::new(8, 4, 2)).with_channel_stats(ChannelStats {
            means: vec![0.0, 1.0, 2.0],
            scales: vec![1.0, 2.0, 3.0],
        });
        save_model(&model, &path, &metadata).unwrap();

        let (loaded, loaded_meta) = load_model::<TestBackend>(&path, &device).unwrap();
        assert_eq!(loaded_meta, metadata);

        let expected = model.forward(probe(&device), 4).into_data().to_vec::<f32>().unwrap();
        let actual = loaded.forward(probe(&device), 4).into_data().to_vec::<f32>().unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_load_without_metadata_names_file() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");

        match load_model::<TestBackend>(&path, &device) {
            Err(ForecastError::Import { path: p, .. }) => assert!(p.to_string_lossy().ends_with("missing.metadata.json")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("loading a missing model should fail"),
        }
    }

    #[test]
    fn test_metadata_from_loss_curve() {
        let mut curve = LossCurve::new();
        curve.push(0.4, 0.5);
        curve.push(0.2, 0.3);
        let metadata = ModelMetadata::new(&Seq2SeqConfig::new(1, 4), WindowSpec::new(10, 2, 1)).with_loss_curve(&curve);
        assert_eq!(metadata.epochs_trained, 2);
        assert_eq!(metadata.final_train_loss, Some(0.2));
        assert_eq!(metadata.final_valid_loss, Some(0.3));
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.timestamp).is_ok());
    }

    #[test]
    fn test_parameter_bytes_are_stable() {
        let device = Default::default();
        let model = Seq2SeqConfig::new(2, 3).init::<TestBackend>(&device);
        assert_eq!(parameter_bytes(&model).unwrap(), parameter_bytes(&model.clone()).unwrap());

        let other = Seq2SeqConfig::new(2, 3).init::<TestBackend>(&device);
        assert_ne!(parameter_bytes(&model).unwrap(), parameter_bytes(&other).unwrap());
    }
}
