// projeto: lstmseq2seq
// file: src/rna/mod.rs
// Module declarations for the seq2seq forecasting pipeline

pub mod utils;     // Error type and small validation helpers
pub mod data;      // Windowing, normalization, dataset preparation
pub mod import;    // POD text/binary and semicolon CSV readers
pub mod model;     // LSTM encoder-decoder (burn)
pub mod training;  // Trainer, Noam schedule, predictor
pub mod metrics;   // Loss curves and forecast errors
pub mod plot;      // plotly HTML figures
pub mod storage;   // Model snapshots and metadata
pub mod config;    // TOML experiment configuration

pub use config::ExperimentConfig;
pub use utils::ForecastError;
