// projeto: lstmseq2seq
// file: src/main.rs
#![recursion_limit = "256"]



mod rna;

use std::error::Error;
use std::path::{Path, PathBuf};

use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu};
use burn::tensor::backend::AutodiffBackend;
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use ndarray::Array2;

use rna::data::{generate_cosine, normalize_channels, prepare_dataset, ChannelStats, IntoArray3, TensorDataset};
use rna::import::DatasetFormat;
use rna::metrics::{calculate_mae, calculate_rmse};
use rna::model::{Seq2Seq, Seq2SeqConfig};
use rna::plot::{plot_loss_curve, plot_predictions, PlotOptions};
use rna::storage::{load_model, save_model, ModelMetadata};
use rna::training::{predict, Trainer};
use rna::utils::validate_series;
use rna::{ExperimentConfig, ForecastError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeviceKind {
    Cpu,
    Gpu,
}

#[derive(Parser)]
#[command(name = "lstm", about = "Seq2seq LSTM forecaster for POD coefficients and other time series", version = "0.1.0")]
struct Cli {
    #[arg(long, default_value = "config.toml", help = "Experiment configuration file (created with defaults if missing)")]
    config: PathBuf,
    #[arg(long, value_enum, help = "Dataset format")]
    dataset: Option<DatasetFormat>,
    #[arg(long, help = "Dataset file")]
    data_path: Option<PathBuf>,
    #[arg(long, help = "Training epochs")]
    epochs: Option<usize>,
    #[arg(long, help = "Batch size")]
    batch_size: Option<usize>,
    #[arg(long, help = "LSTM hidden size")]
    hidden_size: Option<usize>,
    #[arg(long, help = "Input window width")]
    input_width: Option<usize>,
    #[arg(long, help = "Forecast horizon")]
    output_width: Option<usize>,
    #[arg(long, help = "Stride between consecutive windows")]
    stride: Option<usize>,
    #[arg(long, value_enum, default_value_t = DeviceKind::Cpu, help = "Compute device")]
    device: DeviceKind,
    #[arg(long, help = "Save the trained model to this path")]
    save_model: Option<PathBuf>,
    #[arg(long, help = "Load a saved model and skip training")]
    load_model: Option<PathBuf>,
    #[arg(long, help = "Directory for figures and the loss history")]
    plot_dir: Option<PathBuf>,
    #[arg(short, long, help = "Debug logging")]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .init();
}

fn apply_overrides(cli: &Cli, config: &mut ExperimentConfig) {
    if let Some(format) = cli.dataset {
        config.data.format = format;
    }
    if let Some(path) = &cli.data_path {
        config.data.path = Some(path.clone());
    }
    if let Some(epochs) = cli.epochs {
        config.training.epochs = epochs;
    }
    if let Some(batch_size) = cli.batch_size {
        config.training.batch_size = batch_size;
    }
    if let Some(hidden_size) = cli.hidden_size {
        config.model.hidden_size = hidden_size;
    }
    if let Some(iw) = cli.input_width {
        config.window.input_width = iw;
    }
    if let Some(ow) = cli.output_width {
        config.window.output_width = ow;
    }
    if let Some(stride) = cli.stride {
        config.window.stride = stride;
    }
    if let Some(path) = &cli.save_model {
        config.output.save_model = Some(path.clone());
    }
    if let Some(dir) = &cli.plot_dir {
        config.output.plot_dir = dir.clone();
    }
}

fn load_series(config: &ExperimentConfig) -> Result<Array2<f32>, ForecastError> {
    match (config.data.format.source(), &config.data.path) {
        (Some(source), Some(path)) => source.load(path, &config.data.channels, config.data.max_timesteps),
        (Some(_), None) => Err(ForecastError::Config(format!("{:?} data needs a path", config.data.format))),
        (None, _) => {
            info!("🌊 Generating {} synthetic points for frequencies {:?}",
                config.data.synthetic_len, config.data.synthetic_freqs);
            Ok(generate_cosine(
                config.data.synthetic_len,
                config.data.synthetic_t_final,
                &config.data.synthetic_freqs,
            ))
        }
    }
}

fn train_model<B: AutodiffBackend>(
    config: &ExperimentConfig,
    data: &TensorDataset<B>,
    stats: &ChannelStats,
    device: &B::Device,
) -> Result<Seq2Seq<B>, ForecastError> {
    let model_config = Seq2SeqConfig::new(stats.num_channels(), config.model.hidden_size);
    let model = model_config.init::<B>(device);

    let mut trainer = Trainer::new(config.training_config());
    let (model, curve) = trainer.fit(model, data)?;

    let plot_dir = &config.output.plot_dir;
    plot_loss_curve(&curve, &plot_dir.join("loss.html"))?;
    curve.save_to_csv(&plot_dir.join("loss.csv"))?;

    if let Some(path) = &config.output.save_model {
        let metadata = ModelMetadata::new(&model_config, config.window)
            .with_channel_stats(stats.clone())
            .with_loss_curve(&curve);
        save_model(&model, path, &metadata)?;
    }
    Ok(model)
}

/// Normalizes `series` for a loaded snapshot, with the snapshot's stored statistics when present.
fn normalize_for_snapshot(series: &mut Array2<f32>, metadata: &ModelMetadata) -> Result<ChannelStats, ForecastError> {
    if metadata.input_size != series.ncols() {
        return Err(ForecastError::ShapeMismatch(format!(
            "model expects {} channels, data has {}",
            metadata.input_size,
            series.ncols()
        )));
    }
    match &metadata.channel_stats {
        Some(saved) => {
            let fresh = normalize_channels(&mut series.clone());
            if !saved.approx_eq(&fresh, 1e-3) {
                warn!("⚠️ Data statistics differ from the ones stored with the model; using the stored ones");
            }
            saved.apply(series)?;
            Ok(saved.clone())
        }
        None => {
            warn!("⚠️ Snapshot has no channel statistics; normalizing with the current data");
            Ok(normalize_channels(series))
        }
    }
}

fn run<B: AutodiffBackend>(
    config: &ExperimentConfig,
    load_path: Option<&Path>,
    device: B::Device,
) -> Result<(), ForecastError> {
    let mut series = load_series(config)?;
    validate_series(&series)?;

    let snapshot = load_path.map(|path| load_model::<B>(path, &device)).transpose()?;
    let stats = match &snapshot {
        Some((_, metadata)) => {
            if metadata.window != config.window {
                warn!("⚠️ Model was trained with window {:?}, running with {:?}", metadata.window, config.window);
            }
            normalize_for_snapshot(&mut series, metadata)?
        }
        None => normalize_channels(&mut series),
    };

    let prepared = prepare_dataset(&series, &config.prepare_options())?;
    let data = TensorDataset::<B>::new(&prepared, &device);

    let model = match snapshot {
        Some((model, _)) => model,
        None => train_model(config, &data, &stats, &device)?,
    };

    let ow = data.output_width();
    let plot_dir = &config.output.plot_dir;
    let (batch, channel) = (config.output.plot_batch, config.output.plot_channel);

    for (name, windows, input) in [
        ("train", &prepared.train, &data.x_train),
        ("valid", &prepared.valid, &data.x_valid),
    ] {
        let forecast = predict(&model, input.clone(), ow).into_array3()?;

        if let (Some(p), Some(t)) = (forecast.as_slice(), windows.y.as_slice()) {
            info!("📏 {} forecast (normalized): RMSE {:.4e}, MAE {:.4e}", name, calculate_rmse(p, t), calculate_mae(p, t));
        }
        let physical = stats.denormalize(&forecast)?;
        let target = stats.denormalize(&windows.y)?;
        if let (Some(p), Some(t)) = (physical.as_slice(), target.as_slice()) {
            info!("📏 {} forecast (physical units): RMSE {:.4e}", name, calculate_rmse(p, t));
        }

        let opts = PlotOptions::new(format!("{} set, sample {}, channel {}", name, batch, channel))
            .with_output(plot_dir.join(format!("prediction_{}.html", name)));
        plot_predictions(&windows.x, &windows.y, forecast, batch, channel, &opts)?;
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    println!("🚀 Seq2seq LSTM forecaster");

    let mut config = ExperimentConfig::load(&cli.config).map_err(|e| {
        error!("❌ Could not load configuration: {}", e);
        e
    })?;
    apply_overrides(&cli, &mut config);
    config.validate().map_err(|e| {
        error!("❌ Invalid configuration: {}", e);
        e
    })?;

    let load_path = cli.load_model.as_deref();
    let result = match cli.device {
        DeviceKind::Cpu => run::<Autodiff<NdArray>>(&config, load_path, NdArrayDevice::default()),
        DeviceKind::Gpu => run::<Autodiff<Wgpu>>(&config, load_path, WgpuDevice::default()),
    };
    result.map_err(|e| {
        error!("❌ Run failed: {}", e);
        e
    })?;

    println!("✅ Finished. Figures in {}", config.output.plot_dir.display());
    Ok(())
}
