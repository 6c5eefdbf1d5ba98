// projeto: lstmseq2seq
// file: src/rna/data.rs
// Windowing, normalization and dataset preparation for seq2seq training



use std::f32::consts::PI;

use burn::tensor::{backend::Backend, Tensor, TensorData};
use log::{debug, info, warn};
use ndarray::{s, Array2, Array3, Axis};
use ndarray_stats::QuantileExt;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::rna::utils::ForecastError;

// Centered spread at or below this many f32 epsilons of the raw magnitude is rounding noise.
const CONSTANT_CHANNEL_ULPS: f32 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSpec {
    pub input_width: usize,
    pub output_width: usize,
    pub stride: usize,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::new(200, 50, 50)
    }
}

impl WindowSpec {
    pub fn new(input_width: usize, output_width: usize, stride: usize) -> Self {
        Self { input_width, output_width, stride }
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.input_width == 0 || self.output_width == 0 {
            return Err(ForecastError::InvalidWindow(format!(
                "input and output widths must be positive (iw={}, ow={})",
                self.input_width, self.output_width
            )));
        }
        if self.stride == 0 {
            return Err(ForecastError::InvalidWindow("stride must be positive".into()));
        }
        Ok(())
    }

    /// Timesteps covered by one (input, target) pair.
    pub fn span(&self) -> usize {
        self.input_width + self.output_width
    }

    /// Number of windows `floor((T - iw - ow) / stride) + 1`, or 0 when the series is too short.
    pub fn num_windows(&self, timesteps: usize) -> usize {
        if timesteps < self.span() || self.stride == 0 {
            return 0;
        }
        (timesteps - self.span()) / self.stride + 1
    }
}

/// Input windows `x` of shape `(iw, N, C)` and target windows `y` of shape `(ow, N, C)`.
#[derive(Debug, Clone)]
pub struct WindowedData {
    pub x: Array3<f32>,
    pub y: Array3<f32>,
}

impl WindowedData {
    pub fn num_samples(&self) -> usize {
        self.x.len_of(Axis(1))
    }

    pub fn num_channels(&self) -> usize {
        self.x.len_of(Axis(2))
    }
}

pub fn window_series(series: &Array2<f32>, spec: &WindowSpec) -> Result<WindowedData, ForecastError> {
    spec.validate()?;
    let (timesteps, channels) = series.dim();
    let n = spec.num_windows(timesteps);
    if n == 0 {
        return Err(ForecastError::InsufficientData {
            required: spec.span(),
            actual: timesteps,
        });
    }

    let mut x = Array3::<f32>::zeros((spec.input_width, n, channels));
    let mut y = Array3::<f32>::zeros((spec.output_width, n, channels));

    for i in 0..n {
        let start_x = i * spec.stride;
        let start_y = start_x + spec.input_width;
        x.slice_mut(s![.., i, ..])
            .assign(&series.slice(s![start_x..start_y, ..]));
        y.slice_mut(s![.., i, ..])
            .assign(&series.slice(s![start_y..start_y + spec.output_width, ..]));
    }

    debug!("🪟 Windowed {} timesteps into {} samples (iw={}, ow={}, stride={})",
        timesteps, n, spec.input_width, spec.output_width, spec.stride);
    Ok(WindowedData { x, y })
}

/// Per-channel statistics recorded by [`normalize_channels`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub means: Vec<f32>,
    pub scales: Vec<f32>,
}

impl ChannelStats {
    pub fn num_channels(&self) -> usize {
        self.means.len()
    }

    /// Normalizes `series` with these statistics instead of its own.
    pub fn apply(&self, series: &mut Array2<f32>) -> Result<(), ForecastError> {
        if series.ncols() != self.num_channels() {
            return Err(ForecastError::ShapeMismatch(format!(
                "expected {} channels, got {}",
                self.num_channels(),
                series.ncols()
            )));
        }
        for (c, mut column) in series.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, scale) = (self.means[c], self.scales[c]);
            column.mapv_inplace(|v| (v - mean) / scale);
        }
        Ok(())
    }

    /// True when both describe the same channels within a relative tolerance.
    pub fn approx_eq(&self, other: &ChannelStats, rel_tol: f32) -> bool {
        let close = |a: f32, b: f32| (a - b).abs() <= rel_tol * a.abs().max(b.abs()).max(f32::MIN_POSITIVE);
        self.num_channels() == other.num_channels()
            && self.means.iter().zip(&other.means).all(|(a, b)| close(*a, *b))
            && self.scales.iter().zip(&other.scales).all(|(a, b)| close(*a, *b))
    }

    /// Maps normalized windows `(len, batch, C)` back to physical units.
    pub fn denormalize(&self, values: &Array3<f32>) -> Result<Array3<f32>, ForecastError> {
        let channels = values.len_of(Axis(2));
        if channels != self.num_channels() {
            return Err(ForecastError::ShapeMismatch(format!(
                "expected {} channels, got {}",
                self.num_channels(),
                channels
            )));
        }
        let mut out = values.clone();
        for (c, mut lane) in out.axis_iter_mut(Axis(2)).enumerate() {
            let (mean, scale) = (self.means[c], self.scales[c]);
            lane.mapv_inplace(|v| v * scale + mean);
        }
        Ok(out)
    }
}

/// Centers each channel on its mean and divides it by its maximum absolute value.
///
/// A channel that is constant has nothing to scale: it is left at zero, its scale
/// is recorded as 1.0 and a warning is logged. Constancy is judged relative to the
/// channel's own magnitude, so tiny but varying channels are still scaled to 1.
pub fn normalize_channels(series: &mut Array2<f32>) -> ChannelStats {
    let channels = series.ncols();
    let mut means = Vec::with_capacity(channels);
    let mut scales = Vec::with_capacity(channels);

    for (c, mut column) in series.axis_iter_mut(Axis(1)).enumerate() {
        if column.is_empty() {
            means.push(0.0);
            scales.push(1.0);
            continue;
        }
        let raw_max_abs = *column.mapv(f32::abs).max_skipnan();
        let mean = column.mean().unwrap_or(0.0);
        column.mapv_inplace(|v| v - mean);
        let max_abs = *column.mapv(f32::abs).max_skipnan();

        if !max_abs.is_finite() || max_abs == 0.0 || max_abs <= CONSTANT_CHANNEL_ULPS * f32::EPSILON * raw_max_abs {
            warn!("⚠️ Channel {} is constant (mean {:.6}); leaving it at zero", c, mean);
            column.fill(0.0);
            means.push(mean);
            scales.push(1.0);
        } else {
            column.mapv_inplace(|v| v / max_abs);
            means.push(mean);
            scales.push(max_abs);
        }
    }

    ChannelStats { means, scales }
}

/// Splits a series into training and validation parts.
///
/// Training covers `[0, idx)` with `idx = floor(train_fraction * T)`; validation
/// covers `[idx - common, T)` with `common = floor(common_fraction * T)`, so both
/// parts share `common` timesteps.
pub fn split_series(
    series: &Array2<f32>,
    train_fraction: f64,
    common_fraction: f64,
) -> Result<(Array2<f32>, Array2<f32>), ForecastError> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(ForecastError::Config(format!(
            "train fraction must be in (0, 1), got {}",
            train_fraction
        )));
    }
    if !(0.0..=train_fraction).contains(&common_fraction) {
        return Err(ForecastError::Config(format!(
            "common fraction must be in [0, {}], got {}",
            train_fraction, common_fraction
        )));
    }

    let timesteps = series.nrows();
    let idx = (train_fraction * timesteps as f64).floor() as usize;
    let common = ((common_fraction * timesteps as f64).floor() as usize).min(idx);

    let train = series.slice(s![..idx, ..]).to_owned();
    let valid = series.slice(s![idx - common.., ..]).to_owned();
    Ok((train, valid))
}

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub window: WindowSpec,
    pub train_fraction: f64,
    pub common_fraction: f64,
    /// Standard deviation of the Gaussian noise added to training inputs. `None` disables it.
    pub noise_std: Option<f32>,
    pub seed: u64,
}

impl PrepareOptions {
    pub fn new(window: WindowSpec, train_fraction: f64) -> Self {
        Self {
            window,
            train_fraction,
            common_fraction: 0.0,
            noise_std: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub train: WindowedData,
    pub valid: WindowedData,
}

pub fn prepare_dataset(series: &Array2<f32>, opts: &PrepareOptions) -> Result<PreparedDataset, ForecastError> {
    let (train_series, valid_series) = split_series(series, opts.train_fraction, opts.common_fraction)?;
    let mut train = window_series(&train_series, &opts.window)?;
    let valid = window_series(&valid_series, &opts.window)?;

    if let Some(std) = opts.noise_std {
        if !(std.is_finite() && std >= 0.0) {
            return Err(ForecastError::Config(format!("noise std must be a non-negative number, got {}", std)));
        }
        let normal = Normal::new(0.0f32, std)
            .map_err(|e| ForecastError::Config(format!("invalid noise std {}: {}", std, e)))?;
        let mut rng = StdRng::seed_from_u64(opts.seed);
        train.x.mapv_inplace(|v| v + normal.sample(&mut rng));
        info!("🔊 Added Gaussian noise (std {}) to training inputs", std);
    }

    info!("📊 Dataset ready: {} train samples, {} valid samples, {} channels",
        train.num_samples(), valid.num_samples(), train.num_channels());
    Ok(PreparedDataset { train, valid })
}

fn linspace(n: usize, t_final: f32) -> impl Iterator<Item = f32> {
    let step = if n > 1 { t_final / (n - 1) as f32 } else { 0.0 };
    (0..n).map(move |i| i as f32 * step)
}

/// Synthetic `cos(f * t)` channels, one per frequency, on `n` points of `[0, t_final]`,
/// already centered and scaled like imported data.
pub fn generate_cosine(n: usize, t_final: f32, freqs: &[f32]) -> Array2<f32> {
    let mut series = Array2::<f32>::zeros((n, freqs.len()));
    for (i, t) in linspace(n, t_final).enumerate() {
        for (c, f) in freqs.iter().enumerate() {
            series[[i, c]] = (f * t).cos();
        }
    }
    normalize_channels(&mut series);
    series
}

pub fn generate_sine(n: usize, t_final: f32, freqs: &[f32]) -> Array2<f32> {
    let mut series = Array2::<f32>::zeros((n, freqs.len()));
    for (i, t) in linspace(n, t_final).enumerate() {
        for (c, f) in freqs.iter().enumerate() {
            series[[i, c]] = (f * t).sin();
        }
    }
    series
}

/// Default synthetic horizon, one full period of the unit frequency.
pub const DEFAULT_T_FINAL: f32 = 2.0 * PI;

pub fn to_tensor<B: Backend>(array: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (a, b, c) = array.dim();
    let values: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(values, [a, b, c]), device)
}

/// Train and validation windows moved onto the training device.
#[derive(Debug, Clone)]
pub struct TensorDataset<B: Backend> {
    pub x_train: Tensor<B, 3>,
    pub y_train: Tensor<B, 3>,
    pub x_valid: Tensor<B, 3>,
    pub y_valid: Tensor<B, 3>,
}

impl<B: Backend> TensorDataset<B> {
    pub fn new(prepared: &PreparedDataset, device: &B::Device) -> Self {
        Self {
            x_train: to_tensor(&prepared.train.x, device),
            y_train: to_tensor(&prepared.train.y, device),
            x_valid: to_tensor(&prepared.valid.x, device),
            y_valid: to_tensor(&prepared.valid.y, device),
        }
    }

    /// Timesteps in each input window.
    pub fn input_width(&self) -> usize {
        self.x_train.dims()[0]
    }

    /// Forecast horizon of each target window.
    pub fn output_width(&self) -> usize {
        self.y_train.dims()[0]
    }
}

/// Anything that can be viewed as an `(len, batch, channels)` array for plotting or export.
pub trait IntoArray3 {
    fn into_array3(self) -> Result<Array3<f32>, ForecastError>;
}

impl IntoArray3 for Array3<f32> {
    fn into_array3(self) -> Result<Array3<f32>, ForecastError> {
        Ok(self)
    }
}

impl IntoArray3 for &Array3<f32> {
    fn into_array3(self) -> Result<Array3<f32>, ForecastError> {
        Ok(self.clone())
    }
}

impl<B: Backend> IntoArray3 for Tensor<B, 3> {
    fn into_array3(self) -> Result<Array3<f32>, ForecastError> {
        let [a, b, c] = self.dims();
        let values = self.into_data().convert::<f32>().to_vec::<f32>()?;
        Ok(Array3::from_shape_vec((a, b, c), values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use ndarray::array;

    fn ramp(timesteps: usize, channels: usize) -> Array2<f32> {
        Array2::from_shape_fn((timesteps, channels), |(t, c)| (t * 10 + c) as f32)
    }

    #[test]
    fn test_window_count_and_contiguity() {
        let cases = [
            (10, 3, 2, 1),   // T, iw, ow, stride
            (10, 3, 2, 5),
            (5, 3, 2, 1),    // exactly one window
            (1000, 100, 20, 50),
            (37, 4, 6, 7),
        ];
        for (t, iw, ow, stride) in cases {
            let series = ramp(t, 2);
            let spec = WindowSpec::new(iw, ow, stride);
            let data = window_series(&series, &spec).unwrap();
            let n = (t - iw - ow) / stride + 1;

            assert_eq!(data.x.dim(), (iw, n, 2));
            assert_eq!(data.y.dim(), (ow, n, 2));
            for i in 0..n {
                for c in 0..2 {
                    for k in 0..iw {
                        assert_eq!(data.x[[k, i, c]], series[[i * stride + k, c]]);
                    }
                    for k in 0..ow {
                        assert_eq!(data.y[[k, i, c]], series[[i * stride + iw + k, c]]);
                    }
                    // target picks up right after the input window
                    assert_eq!(data.y[[0, i, c]] - data.x[[iw - 1, i, c]], 10.0);
                }
            }
        }
    }

    #[test]
    fn test_window_insufficient_data() {
        let series = ramp(4, 1);
        match window_series(&series, &WindowSpec::new(3, 2, 1)) {
            Err(ForecastError::InsufficientData { required, actual }) => {
                assert_eq!(required, 5);
                assert_eq!(actual, 4);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_window_rejects_zero_sizes() {
        let series = ramp(20, 1);
        assert!(matches!(
            window_series(&series, &WindowSpec::new(0, 2, 1)),
            Err(ForecastError::InvalidWindow(_))
        ));
        assert!(matches!(
            window_series(&series, &WindowSpec::new(3, 2, 0)),
            Err(ForecastError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_normalize_channels() {
        let mut series = array![[1.0f32, -4.0], [2.0, 0.0], [3.0, 4.0], [6.0, 8.0]];
        let stats = normalize_channels(&mut series);

        for column in series.axis_iter(Axis(1)) {
            let mean = column.mean().unwrap();
            let max_abs = column.iter().fold(0.0f32, |m, v| m.max(v.abs()));
            assert!(mean.abs() < 1e-6);
            assert!((max_abs - 1.0).abs() < 1e-6);
        }
        assert_eq!(stats.means, vec![3.0, 2.0]);
        assert_eq!(stats.scales, vec![3.0, 6.0]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut series = generate_sine(200, 6.0, &[1.0, 2.5]);
        series.column_mut(1).mapv_inplace(|v| 3.0 * v + 7.0);
        normalize_channels(&mut series);
        let once = series.clone();
        normalize_channels(&mut series);
        for (a, b) in once.iter().zip(series.iter()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_normalize_constant_channel_guard() {
        let mut series = Array2::from_shape_fn((50, 2), |(t, c)| if c == 0 { 0.1 } else { t as f32 });
        let stats = normalize_channels(&mut series);

        assert!(series.column(0).iter().all(|v| *v == 0.0));
        assert!(series.column(0).iter().all(|v| v.is_finite()));
        assert_eq!(stats.scales[0], 1.0);
        assert!(series.column(1).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_normalize_scales_small_amplitude_channel() {
        let mut series = Array2::from_shape_fn((100, 2), |(t, c)| {
            let wave = (0.3 * t as f32).sin();
            if c == 0 { 5e-7 * wave } else { 10.0 + 1e-2 * wave }
        });
        let stats = normalize_channels(&mut series);

        for (c, column) in series.axis_iter(Axis(1)).enumerate() {
            let max_abs = column.iter().fold(0.0f32, |m, v| m.max(v.abs()));
            assert!((max_abs - 1.0).abs() < 1e-5, "channel {} has max abs {}", c, max_abs);
        }
        assert!(stats.scales[0] > 4e-7 && stats.scales[0] < 6e-7);
        assert!((stats.means[1] - 10.0).abs() < 1e-3);
        assert!(stats.scales[1] > 5e-3 && stats.scales[1] < 2e-2);
    }

    #[test]
    fn test_denormalize_restores_units() {
        let raw = array![[10.0f32], [20.0], [30.0], [40.0]];
        let mut series = raw.clone();
        let stats = normalize_channels(&mut series);

        let windows = series.into_shape_with_order((4, 1, 1)).unwrap();
        let restored = stats.denormalize(&windows).unwrap();
        for (r, e) in restored.iter().zip(raw.iter()) {
            assert!((r - e).abs() < 1e-4);
        }

        let wrong = Array3::<f32>::zeros((4, 1, 2));
        assert!(matches!(stats.denormalize(&wrong), Err(ForecastError::ShapeMismatch(_))));
    }

    #[test]
    fn test_apply_saved_stats() {
        let raw = array![[1.0f32, 100.0], [3.0, 300.0], [5.0, 200.0]];
        let mut fresh = raw.clone();
        let stats = normalize_channels(&mut fresh);

        let mut reused = raw.clone();
        stats.apply(&mut reused).unwrap();
        assert_eq!(reused, fresh);

        let shifted = ChannelStats { means: vec![3.0, 210.0], scales: stats.scales.clone() };
        assert!(stats.approx_eq(&stats.clone(), 1e-6));
        assert!(!stats.approx_eq(&shifted, 1e-3));
        assert!(matches!(
            stats.apply(&mut Array2::zeros((3, 1))),
            Err(ForecastError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_split_series_with_common_part() {
        let series = ramp(100, 1);
        let (train, valid) = split_series(&series, 0.8, 0.2).unwrap();
        assert_eq!(train.nrows(), 80);
        assert_eq!(valid.nrows(), 40);
        assert_eq!(valid[[0, 0]], series[[60, 0]]);

        let (train, valid) = split_series(&series, 0.7, 0.0).unwrap();
        assert_eq!(train.nrows() + valid.nrows(), 100);
        assert_eq!(valid[[0, 0]], series[[70, 0]]);

        assert!(split_series(&series, 1.5, 0.0).is_err());
        assert!(split_series(&series, 0.5, 0.6).is_err());
    }

    #[test]
    fn test_prepare_dataset_sample_counts() {
        let series = generate_sine(1000, 20.0, &[1.0]);
        let opts = PrepareOptions::new(WindowSpec::new(100, 20, 50), 0.7);
        let data = prepare_dataset(&series, &opts).unwrap();
        assert_eq!(data.train.num_samples(), 12);
        assert_eq!(data.valid.num_samples(), 4);
    }

    #[test]
    fn test_noise_only_touches_training_inputs() {
        let series = generate_cosine(400, 12.0, &[1.0, 2.0]);
        let clean = prepare_dataset(&series, &PrepareOptions::new(WindowSpec::new(20, 10, 10), 0.75)).unwrap();

        let mut opts = PrepareOptions::new(WindowSpec::new(20, 10, 10), 0.75);
        opts.noise_std = Some(0.05);
        let noisy = prepare_dataset(&series, &opts).unwrap();

        assert_ne!(clean.train.x, noisy.train.x);
        assert_eq!(clean.train.y, noisy.train.y);
        assert_eq!(clean.valid.x, noisy.valid.x);
        assert_eq!(clean.valid.y, noisy.valid.y);

        opts.noise_std = Some(-1.0);
        assert!(matches!(prepare_dataset(&series, &opts), Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_generate_cosine_is_normalized() {
        let series = generate_cosine(1000, DEFAULT_T_FINAL, &[1.0, 3.0]);
        assert_eq!(series.dim(), (1000, 2));
        for column in series.axis_iter(Axis(1)) {
            let max_abs = column.iter().fold(0.0f32, |m, v| m.max(v.abs()));
            assert!(column.mean().unwrap().abs() < 1e-5);
            assert!((max_abs - 1.0).abs() < 1e-6);
        }

        let raw = generate_sine(5, 2.0 * PI, &[1.0]);
        assert!(raw[[0, 0]].abs() < 1e-6);
        assert!((raw[[1, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tensor_conversion() {
        let device = Default::default();
        let array = Array3::from_shape_fn((3, 2, 4), |(a, b, c)| (a * 100 + b * 10 + c) as f32);
        let tensor = to_tensor::<NdArray>(&array, &device);
        assert_eq!(tensor.dims(), [3, 2, 4]);
        assert_eq!(tensor.into_array3().unwrap(), array);
    }
}
