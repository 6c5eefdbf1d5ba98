// projeto: lstmseq2seq
// file: src/rna/plot.rs
// HTML plots of forecasts against ground truth and of the training loss curves



use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use ndarray::{s, Array3};
use plotly::{
    common::{Marker, MarkerSymbol, Mode, Title},
    layout::Axis,
    Layout, Plot, Scatter,
};

use crate::rna::data::IntoArray3;
use crate::rna::metrics::LossCurve;
use crate::rna::utils::ForecastError;

#[derive(Debug, Clone, Default)]
pub struct PlotOptions {
    pub title: String,
    /// HTML file to write; nothing is written when `None`.
    pub output: Option<PathBuf>,
}

impl PlotOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

fn select(values: &Array3<f32>, name: &'static str, batch: usize, channel: usize) -> Result<Vec<f32>, ForecastError> {
    let (_, batches, channels) = values.dim();
    if batch >= batches {
        return Err(ForecastError::InvalidIndex { axis: name, index: batch, size: batches });
    }
    if channel >= channels {
        return Err(ForecastError::InvalidIndex { axis: name, index: channel, size: channels });
    }
    Ok(values.slice(s![.., batch, channel]).to_vec())
}

/// Input window on `[0, iw)`, target and prediction on `[iw, iw + len)` for one sample and channel.
pub fn plot_predictions<X, Y, P>(
    x: X,
    y: Y,
    p: P,
    batch: usize,
    channel: usize,
    opts: &PlotOptions,
) -> Result<Plot, ForecastError>
where
    X: IntoArray3,
    Y: IntoArray3,
    P: IntoArray3,
{
    let input = select(&x.into_array3()?, "input batch/channel", batch, channel)?;
    let target = select(&y.into_array3()?, "target batch/channel", batch, channel)?;
    let prediction = select(&p.into_array3()?, "prediction batch/channel", batch, channel)?;

    let iw = input.len();
    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new((0..iw).collect::<Vec<usize>>(), input)
            .name("Data")
            .mode(Mode::Lines),
    );
    plot.add_trace(
        Scatter::new((iw..iw + target.len()).collect::<Vec<usize>>(), target)
            .name("Target")
            .mode(Mode::LinesMarkers)
            .marker(Marker::new().symbol(MarkerSymbol::X)),
    );
    plot.add_trace(
        Scatter::new((iw..iw + prediction.len()).collect::<Vec<usize>>(), prediction)
            .name("Predictions")
            .mode(Mode::LinesMarkers)
            .marker(Marker::new().symbol(MarkerSymbol::X)),
    );

    let layout = Layout::new()
        .title(Title::with_text(opts.title.as_str()))
        .x_axis(Axis::new().title(Title::with_text("timesteps")))
        .y_axis(Axis::new().title(Title::with_text("amplitude")));
    plot.set_layout(layout);

    if let Some(path) = &opts.output {
        write_plot(&plot, path)?;
    }
    Ok(plot)
}

/// log10 of the training and validation loss per epoch.
pub fn plot_loss_curve(curve: &LossCurve, path: &Path) -> Result<Plot, ForecastError> {
    let epochs: Vec<usize> = (1..=curve.len()).collect();
    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new(epochs.clone(), curve.train().iter().map(|l| l.log10()).collect::<Vec<f64>>())
            .name("Training set")
            .mode(Mode::Lines),
    );
    plot.add_trace(
        Scatter::new(epochs, curve.valid().iter().map(|l| l.log10()).collect::<Vec<f64>>())
            .name("Validation set")
            .mode(Mode::Lines),
    );

    let layout = Layout::new()
        .title(Title::with_text("Seq2Seq LSTM training and validation loss"))
        .x_axis(Axis::new().title(Title::with_text("epochs")))
        .y_axis(Axis::new().title(Title::with_text("log10(loss)")));
    plot.set_layout(layout);

    write_plot(&plot, path)?;
    Ok(plot)
}

fn write_plot(plot: &Plot, path: &Path) -> Result<(), ForecastError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, plot.to_html())?;
    info!("📈 Saved figure at: {}", path.display());
    Ok(())
}
