// projeto: lstmseq2seq
// file: src/rna/training.rs
// Trainer (Adam + Noam warmup schedule) and the inference entry point



use burn::{
    config::Config,
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::rna::data::TensorDataset;
use crate::rna::metrics::LossCurve;
use crate::rna::model::Seq2Seq;
use crate::rna::utils::ForecastError;

/// Warmup-then-decay learning rate:
/// `factor * d_model^-0.5 * min(step^-0.5, step * warmup^-1.5)`.
///
/// Rises linearly for `warmup` steps, peaks at `d_model^-0.5 * warmup^-0.5` and then
/// decays as `step^-0.5`. Step 0 means no update has happened yet and has rate 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoamSchedule {
    pub d_model: usize,
    pub warmup: usize,
    pub factor: f64,
}

impl Default for NoamSchedule {
    fn default() -> Self {
        Self::new(512, 8000)
    }
}

impl NoamSchedule {
    pub fn new(d_model: usize, warmup: usize) -> Self {
        Self { d_model, warmup, factor: 1.0 }
    }

    pub fn rate(&self, step: usize) -> f64 {
        if step == 0 {
            return 0.0;
        }
        let step = step as f64;
        let warmup = self.warmup as f64;
        self.factor * (self.d_model as f64).powf(-0.5) * step.powf(-0.5).min(step * warmup.powf(-1.5))
    }
}

/// Whether a pass over the data updates the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Initialized,
    Training { epoch: usize },
    Validating { epoch: usize },
    Done,
}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub epochs: usize,
    #[config(default = 4)]
    pub batch_size: usize,
    #[config(default = 512)]
    pub d_model: usize,
    #[config(default = 8000)]
    pub warmup: usize,
    #[config(default = 1e-9)]
    pub weight_decay: f32,
}

pub struct Trainer {
    config: TrainingConfig,
    schedule: NoamSchedule,
    step: usize,
    state: TrainerState,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        let schedule = NoamSchedule::new(config.d_model, config.warmup);
        Self {
            config,
            schedule,
            step: 0,
            state: TrainerState::Initialized,
        }
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Optimizer updates applied so far.
    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn current_rate(&self) -> f64 {
        self.schedule.rate(self.step)
    }

    fn num_batches(&self, samples: usize) -> Result<usize, ForecastError> {
        let bs = self.config.batch_size;
        if bs == 0 || samples / bs == 0 {
            return Err(ForecastError::InsufficientData {
                required: bs.max(1),
                actual: samples,
            });
        }
        Ok(samples / bs)
    }

    /// Trains for `config.epochs` epochs, validating after each one.
    ///
    /// Batches are consecutive, non-overlapping slices of `batch_size` samples; a trailing
    /// partial batch is dropped. A non-finite loss aborts the run with `Diverged`.
    pub fn fit<B: AutodiffBackend>(
        &mut self,
        mut model: Seq2Seq<B>,
        data: &TensorDataset<B>,
    ) -> Result<(Seq2Seq<B>, LossCurve), ForecastError> {
        let n_train = self.num_batches(data.x_train.dims()[1])?;
        let n_valid = self.num_batches(data.x_valid.dims()[1])?;

        let weight_decay = (self.config.weight_decay > 0.0).then(|| WeightDecayConfig::new(self.config.weight_decay));
        let mut optim = AdamConfig::new()
            .with_beta_1(0.9)
            .with_beta_2(0.98)
            .with_epsilon(1e-9)
            .with_weight_decay(weight_decay)
            .init::<B, Seq2Seq<B>>();

        info!("🚀 Training for {} epochs: {} train batches, {} valid batches of {} samples ({} -> {} steps)",
            self.config.epochs, n_train, n_valid, self.config.batch_size, data.input_width(), data.output_width());

        let mut curve = LossCurve::new();
        for epoch in 1..=self.config.epochs {
            self.state = TrainerState::Training { epoch };
            let (trained, train_loss) =
                self.run_epoch(model, &mut optim, &data.x_train, &data.y_train, n_train, epoch, Mode::Train)?;

            self.state = TrainerState::Validating { epoch };
            let (trained, valid_loss) =
                self.run_epoch(trained, &mut optim, &data.x_valid, &data.y_valid, n_valid, epoch, Mode::Eval)?;
            model = trained;

            curve.push(train_loss, valid_loss);
            info!("Epoch {:3}: Train Loss: {:.3e}, Val Loss: {:.3e}, LR: {:.3e}",
                epoch, train_loss, valid_loss, self.current_rate());
        }

        self.state = TrainerState::Done;
        if let Some((epoch, loss)) = curve.best_valid() {
            info!("🎯 Best validation loss {:.3e} at epoch {}", loss, epoch + 1);
        }
        Ok((model, curve))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_epoch<B: AutodiffBackend, O: Optimizer<Seq2Seq<B>, B>>(
        &mut self,
        mut model: Seq2Seq<B>,
        optim: &mut O,
        x: &Tensor<B, 3>,
        y: &Tensor<B, 3>,
        n_batches: usize,
        epoch: usize,
        mode: Mode,
    ) -> Result<(Seq2Seq<B>, f64), ForecastError> {
        let [input_width, _, channels] = x.dims();
        let target_len = y.dims()[0];
        let bs = self.config.batch_size;
        let criterion = MseLoss::new();
        let eval_model = (mode == Mode::Eval).then(|| model.valid());

        let mut total = 0.0;
        for b in 0..n_batches {
            let samples = b * bs..(b + 1) * bs;
            let input = x.clone().slice([0..input_width, samples.clone(), 0..channels]);
            let target = y.clone().slice([0..target_len, samples, 0..channels]);

            let loss = match &eval_model {
                None => {
                    let output = model.forward(input, target_len);
                    let loss = criterion.forward(output, target, Reduction::Mean);
                    let value = loss.clone().into_scalar().elem::<f64>();
                    check_finite(epoch, value)?;

                    let grads = GradientsParams::from_grads(loss.backward(), &model);
                    self.step += 1;
                    model = optim.step(self.schedule.rate(self.step), model, grads);
                    value
                }
                Some(inner) => {
                    let output = inner.forward(input.inner(), target_len);
                    let loss = criterion.forward(output, target.inner(), Reduction::Mean);
                    let value = loss.into_scalar().elem::<f64>();
                    check_finite(epoch, value)?;
                    value
                }
            };
            debug!("{:?} batch {}/{}: loss {:.6e}", mode, b + 1, n_batches, loss);
            total += loss;
        }

        Ok((model, total / n_batches as f64))
    }
}

fn check_finite(epoch: usize, loss: f64) -> Result<(), ForecastError> {
    if loss.is_finite() {
        Ok(())
    } else {
        Err(ForecastError::Diverged { epoch, loss })
    }
}

/// Forecasts `target_len` steps for each input window `(iw, batch, C)`.
///
/// Runs on the inner backend of the model, so the result carries no gradient graph
/// and the parameters are only read.
pub fn predict<B: AutodiffBackend>(
    model: &Seq2Seq<B>,
    input: Tensor<B, 3>,
    target_len: usize,
) -> Tensor<B::InnerBackend, 3> {
    model.valid().forward(input.inner(), target_len)
}
