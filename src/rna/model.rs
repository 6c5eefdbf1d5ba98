// projeto: lstmseq2seq
// file: src/rna/model.rs
// LSTM encoder-decoder: the encoder summarizes the input window into (hidden, cell),
// the decoder unrolls the forecast one step at a time feeding its own output back



use burn::{
    config::Config,
    module::Module,
    nn::{Initializer, Linear, LinearConfig, Lstm, LstmConfig, LstmState},
    tensor::{backend::Backend, Tensor},
};
use log::info;

/// Encoder result: the full output sequence and the final recurrent state.
pub struct EncoderOutput<B: Backend> {
    /// `(seq_len, batch, hidden)`
    pub output: Tensor<B, 3>,
    pub state: LstmState<B, 2>,
}

impl<B: Backend> EncoderOutput<B> {
    /// Final hidden state as `(1, batch, hidden)`.
    pub fn hidden(&self) -> Tensor<B, 3> {
        self.state.hidden.clone().unsqueeze_dim(0)
    }

    /// Final cell state as `(1, batch, hidden)`.
    pub fn cell(&self) -> Tensor<B, 3> {
        self.state.cell.clone().unsqueeze_dim(0)
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    lstm: Lstm<B>,
}

impl<B: Backend> Encoder<B> {
    /// Input shape: `(seq_len, batch, channels)`. Every call starts from a zero state.
    pub fn forward(&self, input: Tensor<B, 3>) -> EncoderOutput<B> {
        let (output, state) = self.lstm.forward(input.swap_dims(0, 1), None);
        EncoderOutput {
            output: output.swap_dims(0, 1),
            state,
        }
    }
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    lstm: Lstm<B>,
    linear: Linear<B>,
}

impl<B: Backend> Decoder<B> {
    /// One decoding step.
    ///
    /// Input shape: `(1, batch, channels)`
    /// Output shape: `(batch, channels)` plus the updated state
    pub fn forward(&self, input: Tensor<B, 3>, state: LstmState<B, 2>) -> (Tensor<B, 2>, LstmState<B, 2>) {
        let (output, state) = self.lstm.forward(input.swap_dims(0, 1), Some(state));
        let [batch, _, hidden] = output.dims();
        let output = self.linear.forward(output.reshape([batch, hidden]));
        (output, state)
    }
}

#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    /// Number of channels in the series.
    pub input_size: usize,
    pub hidden_size: usize,
    #[config(default = "Initializer::XavierNormal { gain: 1.0 }")]
    pub initializer: Initializer,
}

impl Seq2SeqConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2Seq<B> {
        let encoder = Encoder {
            lstm: LstmConfig::new(self.input_size, self.hidden_size, true)
                .with_initializer(self.initializer.clone())
                .init(device),
        };
        let decoder = Decoder {
            lstm: LstmConfig::new(self.input_size, self.hidden_size, true)
                .with_initializer(self.initializer.clone())
                .init(device),
            linear: LinearConfig::new(self.hidden_size, self.input_size)
                .with_initializer(self.initializer.clone())
                .init(device),
        };
        let model = Seq2Seq { encoder, decoder };
        info!("🧠 Seq2Seq model: {} channels, {} hidden units, {} parameters",
            self.input_size, self.hidden_size, model.num_params());
        model
    }
}

#[derive(Module, Debug)]
pub struct Seq2Seq<B: Backend> {
    encoder: Encoder<B>,
    decoder: Decoder<B>,
}

impl<B: Backend> Seq2Seq<B> {
    pub fn encoder(&self) -> &Encoder<B> {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder<B> {
        &self.decoder
    }

    /// Forecasts `target_len` steps after the input window.
    ///
    /// Input shape: `(iw, batch, channels)`
    /// Output shape: `(target_len, batch, channels)`
    ///
    /// The decoder starts from the last input timestep and always consumes its own
    /// previous output, during training as well as inference.
    pub fn forward(&self, input: Tensor<B, 3>, target_len: usize) -> Tensor<B, 3> {
        let [seq_len, batch, channels] = input.dims();
        if target_len == 0 || seq_len == 0 {
            return Tensor::zeros([target_len, batch, channels], &input.device());
        }

        let encoded = self.encoder.forward(input.clone());
        let mut state = encoded.state;
        let mut decoder_input = input.slice([seq_len - 1..seq_len, 0..batch, 0..channels]);

        let mut outputs = Vec::with_capacity(target_len);
        for _ in 0..target_len {
            let (output, next_state) = self.decoder.forward(decoder_input, state);
            decoder_input = output.clone().unsqueeze_dim(0);
            state = next_state;
            outputs.push(output);
        }

        Tensor::stack(outputs, 0)
    }
}
