// projeto: lstmseq2seq
// file: src/rna/config.rs
// Experiment configuration (TOML)

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::rna::data::{PrepareOptions, WindowSpec, DEFAULT_T_FINAL};
use crate::rna::import::DatasetFormat;
use crate::rna::training::TrainingConfig;
use crate::rna::utils::ForecastError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data: DataConfig,
    pub window: WindowSpec,
    pub model: ModelSection,
    pub training: TrainingSection,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub format: DatasetFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Modes (POD) or numeric columns (CSV) to load.
    pub channels: Vec<usize>,
    pub max_timesteps: usize,
    pub train_fraction: f64,
    /// Fraction of the series shared by the end of training and the start of validation.
    pub common_fraction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_std: Option<f32>,
    pub seed: u64,
    pub synthetic_len: usize,
    pub synthetic_t_final: f32,
    pub synthetic_freqs: Vec<f32>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            format: DatasetFormat::Synthetic,
            path: None,
            channels: (1..11).collect(),
            max_timesteps: 300,
            train_fraction: 0.8,
            common_fraction: 0.2,
            noise_std: None,
            seed: 42,
            synthetic_len: 1000,
            synthetic_t_final: DEFAULT_T_FINAL,
            synthetic_freqs: vec![1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub hidden_size: usize,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self { hidden_size: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub epochs: usize,
    pub batch_size: usize,
    pub d_model: usize,
    pub warmup: usize,
    pub weight_decay: f32,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            epochs: 300,
            batch_size: 4,
            d_model: 512,
            warmup: 8000,
            weight_decay: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub plot_dir: PathBuf,
    /// Sample and channel drawn in the prediction figures.
    pub plot_batch: usize,
    pub plot_channel: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_model: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plot_dir: PathBuf::from("figures"),
            plot_batch: 0,
            plot_channel: 0,
            save_model: None,
        }
    }
}

impl ExperimentConfig {
    /// Reads `path`, or writes the defaults there when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self, ForecastError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: ExperimentConfig = toml::from_str(&content)
                .map_err(|e| ForecastError::Config(format!("{}: {}", path.display(), e)))?;
            info!("⚙️ Configuration loaded from: {}", path.display());
            Ok(config)
        } else {
            info!("📄 Configuration file not found. Writing defaults to {}", path.display());
            let config = ExperimentConfig::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ForecastError> {
        let content = toml::to_string_pretty(self).map_err(|e| ForecastError::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        self.window
            .validate()
            .map_err(|e| ForecastError::Config(e.to_string()))?;

        if self.data.format == DatasetFormat::Synthetic {
            if self.data.synthetic_freqs.is_empty() {
                return Err(ForecastError::Config("synthetic data needs at least one frequency".into()));
            }
        } else {
            if self.data.path.is_none() {
                return Err(ForecastError::Config(format!("{:?} data needs a path", self.data.format)));
            }
            if self.data.channels.is_empty() {
                return Err(ForecastError::Config("no channels selected".into()));
            }
        }
        if !(self.data.train_fraction > 0.0 && self.data.train_fraction < 1.0) {
            return Err(ForecastError::Config("train_fraction must be in (0, 1)".into()));
        }
        if !(0.0..=self.data.train_fraction).contains(&self.data.common_fraction) {
            return Err(ForecastError::Config("common_fraction must be in [0, train_fraction]".into()));
        }
        if let Some(std) = self.data.noise_std {
            if !(std.is_finite() && std >= 0.0) {
                return Err(ForecastError::Config("noise_std must be a non-negative number".into()));
            }
        }
        if self.model.hidden_size == 0 {
            return Err(ForecastError::Config("hidden_size must be greater than zero".into()));
        }
        if self.training.batch_size == 0 {
            return Err(ForecastError::Config("batch_size must be greater than zero".into()));
        }
        if self.training.epochs == 0 {
            return Err(ForecastError::Config("epochs must be greater than zero".into()));
        }
        if self.training.d_model == 0 || self.training.warmup == 0 {
            return Err(ForecastError::Config("d_model and warmup must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            window: self.window,
            train_fraction: self.data.train_fraction,
            common_fraction: self.data.common_fraction,
            noise_std: self.data.noise_std,
            seed: self.data.seed,
        }
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig::new(self.training.epochs)
            .with_batch_size(self.training.batch_size)
            .with_d_model(self.training.d_model)
            .with_warmup(self.training.warmup)
            .with_weight_decay(self.training.weight_decay)
    }
}
