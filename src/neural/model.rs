// projeto: lstmsensortrain
// file: src/neural/model.rs
// LSTM regressor: stacked LSTM, dropout and a linear output unit trained on MAE

use log::debug;
use ndarray::{s, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::neural::utils::{glorot_limit, sigmoid, tanh, AdamOptimizer, TrainingError};

/// Gate blocks are stacked in the order input, forget, cell, output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayerWeights {
    pub w_ih: Array2<f64>, // [4H, input]
    pub w_hh: Array2<f64>, // [4H, H]
    pub b: Array1<f64>,    // [4H]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLayerWeights {
    pub w: Array2<f64>, // [1, H]
    pub b: Array1<f64>, // [1]
}

/// Full parameter set; also used as the gradient container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWeights {
    pub lstm_layers: Vec<LstmLayerWeights>,
    pub output: OutputLayerWeights,
}

impl ModelWeights {
    fn zeros_like(other: &ModelWeights) -> Self {
        ModelWeights {
            lstm_layers: other
                .lstm_layers
                .iter()
                .map(|layer| LstmLayerWeights {
                    w_ih: Array2::zeros(layer.w_ih.raw_dim()),
                    w_hh: Array2::zeros(layer.w_hh.raw_dim()),
                    b: Array1::zeros(layer.b.raw_dim()),
                })
                .collect(),
            output: OutputLayerWeights {
                w: Array2::zeros(other.output.w.raw_dim()),
                b: Array1::zeros(other.output.b.raw_dim()),
            },
        }
    }

    fn add_assign(&mut self, other: &ModelWeights) {
        for (acc, layer) in self.lstm_layers.iter_mut().zip(&other.lstm_layers) {
            acc.w_ih += &layer.w_ih;
            acc.w_hh += &layer.w_hh;
            acc.b += &layer.b;
        }
        self.output.w += &other.output.w;
        self.output.b += &other.output.b;
    }

    fn scale(&mut self, factor: f64) {
        for layer in &mut self.lstm_layers {
            layer.w_ih *= factor;
            layer.w_hh *= factor;
            layer.b *= factor;
        }
        self.output.w *= factor;
        self.output.b *= factor;
    }

    fn squared_norm(&self) -> f64 {
        let mut total = 0.0;
        for layer in &self.lstm_layers {
            total += layer.w_ih.mapv(|x| x * x).sum();
            total += layer.w_hh.mapv(|x| x * x).sum();
            total += layer.b.mapv(|x| x * x).sum();
        }
        total += self.output.w.mapv(|x| x * x).sum();
        total += self.output.b.mapv(|x| x * x).sum();
        total
    }

    fn num_parameters(&self) -> usize {
        let lstm: usize = self
            .lstm_layers
            .iter()
            .map(|layer| layer.w_ih.len() + layer.w_hh.len() + layer.b.len())
            .sum();
        lstm + self.output.w.len() + self.output.b.len()
    }
}

// Activations kept from the forward pass of one timestep.
#[derive(Debug, Clone)]
struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    tanh_c: Array1<f64>,
    h: Array1<f64>,
}

pub struct LstmRegressor {
    input_size: usize,
    hidden_size: usize,
    dropout_rate: f64,
    weights: ModelWeights,
    rng: StdRng,
}

impl LstmRegressor {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout_rate: f64,
        seed: Option<u64>,
    ) -> Result<Self, TrainingError> {
        if input_size == 0 || hidden_size == 0 || num_layers == 0 {
            return Err(TrainingError::ModelConfiguration(format!(
                "input size, hidden size and layer count must be positive (got {}, {}, {})",
                input_size, hidden_size, num_layers
            )));
        }
        if !(0.0..1.0).contains(&dropout_rate) {
            return Err(TrainingError::ModelConfiguration(format!(
                "dropout rate must be in [0, 1), got {}",
                dropout_rate
            )));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let gates = 4 * hidden_size;
        let mut lstm_layers = Vec::with_capacity(num_layers);
        for l in 0..num_layers {
            let layer_input = if l == 0 { input_size } else { hidden_size };
            let w_ih = glorot_matrix(&mut rng, gates, layer_input)?;
            let w_hh = glorot_matrix(&mut rng, gates, hidden_size)?;
            // unit forget bias
            let mut b = Array1::zeros(gates);
            b.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);
            lstm_layers.push(LstmLayerWeights { w_ih, w_hh, b });
        }

        let output = OutputLayerWeights {
            w: glorot_matrix(&mut rng, 1, hidden_size)?,
            b: Array1::zeros(1),
        };

        let model = LstmRegressor {
            input_size,
            hidden_size,
            dropout_rate,
            weights: ModelWeights { lstm_layers, output },
            rng,
        };

        debug!(
            "🛠️ [Model] LSTM initialized: {} features, {} hidden units, {} layers, {} parameters",
            input_size,
            hidden_size,
            num_layers,
            model.num_parameters()
        );
        Ok(model)
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.num_parameters()
    }

    pub fn num_layers(&self) -> usize {
        self.weights.lstm_layers.len()
    }

    fn check_sequence(&self, sequence: &Array2<f64>) -> Result<(), TrainingError> {
        if sequence.nrows() == 0 || sequence.ncols() != self.input_size {
            return Err(TrainingError::Shape(format!(
                "expected a [timesteps >= 1, {}] sequence, got {:?}",
                self.input_size,
                sequence.dim()
            )));
        }
        Ok(())
    }

    fn forward_layer(&self, layer: &LstmLayerWeights, inputs: &[Array1<f64>]) -> Vec<StepCache> {
        let h_size = self.hidden_size;
        let mut h = Array1::zeros(h_size);
        let mut c = Array1::zeros(h_size);
        let mut caches = Vec::with_capacity(inputs.len());

        for x in inputs {
            let z = layer.w_ih.dot(x) + layer.w_hh.dot(&h) + &layer.b;
            let i = sigmoid(&z.slice(s![0..h_size]).to_owned());
            let f = sigmoid(&z.slice(s![h_size..2 * h_size]).to_owned());
            let g = tanh(&z.slice(s![2 * h_size..3 * h_size]).to_owned());
            let o = sigmoid(&z.slice(s![3 * h_size..4 * h_size]).to_owned());

            let c_new = &f * &c + &i * &g;
            let tanh_c = tanh(&c_new);
            let h_new = &o * &tanh_c;

            caches.push(StepCache {
                x: x.clone(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
                h: h_new.clone(),
            });
            h = h_new;
            c = c_new;
        }
        caches
    }

    fn forward_cached(&self, sequence: &Array2<f64>) -> Vec<Vec<StepCache>> {
        let mut inputs: Vec<Array1<f64>> = sequence.axis_iter(Axis(0)).map(|r| r.to_owned()).collect();
        let mut per_layer = Vec::with_capacity(self.num_layers());
        for layer in &self.weights.lstm_layers {
            let caches = self.forward_layer(layer, &inputs);
            inputs = caches.iter().map(|step| step.h.clone()).collect();
            per_layer.push(caches);
        }
        per_layer
    }

    fn head(&self, h_last: &Array1<f64>) -> f64 {
        self.weights.output.w.row(0).dot(h_last) + self.weights.output.b[0]
    }

    /// Inference pass; dropout is inactive.
    pub fn forward(&self, sequence: &Array2<f64>) -> Result<f64, TrainingError> {
        self.check_sequence(sequence)?;
        let caches = self.forward_cached(sequence);
        let h_last = &caches[caches.len() - 1][sequence.nrows() - 1].h;
        Ok(self.head(h_last))
    }

    pub fn predict_batch(&self, sequences: &[Array2<f64>]) -> Result<Vec<f64>, TrainingError> {
        sequences.par_iter().map(|seq| self.forward(seq)).collect()
    }

    /// Absolute error and parameter gradients for one sample. `mask` is the
    /// inverted-dropout mask applied to the last hidden state.
    fn sample_gradients(
        &self,
        sequence: &Array2<f64>,
        target: f64,
        mask: Option<&Array1<f64>>,
    ) -> (f64, ModelWeights) {
        let h_size = self.hidden_size;
        let caches = self.forward_cached(sequence);
        let steps = sequence.nrows();
        let h_last = &caches[caches.len() - 1][steps - 1].h;
        let h_drop = match mask {
            Some(m) => h_last * m,
            None => h_last.clone(),
        };
        let pred = self.head(&h_drop);
        let error = pred - target;

        let mut grads = ModelWeights::zeros_like(&self.weights);
        // d|e|/de, zero at the kink
        let d_pred = if error > 0.0 {
            1.0
        } else if error < 0.0 {
            -1.0
        } else {
            0.0
        };

        grads.output.w.row_mut(0).assign(&(&h_drop * d_pred));
        grads.output.b[0] = d_pred;

        let mut dh_last = self.weights.output.w.row(0).to_owned() * d_pred;
        if let Some(m) = mask {
            dh_last = dh_last * m;
        }

        // external dL/dh per step for the top layer: only the final step
        let mut dh_ext: Vec<Array1<f64>> = vec![Array1::zeros(h_size); steps];
        dh_ext[steps - 1] = dh_last;

        for l in (0..self.num_layers()).rev() {
            let layer = &self.weights.lstm_layers[l];
            let layer_grads = &mut grads.lstm_layers[l];
            let mut dx_seq: Vec<Array1<f64>> = Vec::with_capacity(steps);
            let mut dh_next = Array1::<f64>::zeros(h_size);
            let mut dc_next = Array1::<f64>::zeros(h_size);

            for t in (0..steps).rev() {
                let step = &caches[l][t];
                let dh = &dh_ext[t] + &dh_next;

                let d_o = &dh * &step.tanh_c * &step.o.mapv(|v| v * (1.0 - v));
                let dc = &dh * &step.o * &step.tanh_c.mapv(|v| 1.0 - v * v) + &dc_next;
                let d_i = &dc * &step.g * &step.i.mapv(|v| v * (1.0 - v));
                let d_f = &dc * &step.c_prev * &step.f.mapv(|v| v * (1.0 - v));
                let d_g = &dc * &step.i * &step.g.mapv(|v| 1.0 - v * v);

                let mut d_gates = Array1::zeros(4 * h_size);
                d_gates.slice_mut(s![0..h_size]).assign(&d_i);
                d_gates.slice_mut(s![h_size..2 * h_size]).assign(&d_f);
                d_gates.slice_mut(s![2 * h_size..3 * h_size]).assign(&d_g);
                d_gates.slice_mut(s![3 * h_size..4 * h_size]).assign(&d_o);

                let gates_col = d_gates.view().insert_axis(Axis(1));
                layer_grads.w_ih += &gates_col.dot(&step.x.view().insert_axis(Axis(0)));
                layer_grads.w_hh += &gates_col.dot(&step.h_prev.view().insert_axis(Axis(0)));
                layer_grads.b += &d_gates;

                dx_seq.push(layer.w_ih.t().dot(&d_gates));
                dh_next = layer.w_hh.t().dot(&d_gates);
                dc_next = &dc * &step.f;
            }

            dx_seq.reverse();
            dh_ext = dx_seq;
        }

        (error.abs(), grads)
    }

    fn dropout_mask(&mut self) -> Option<Array1<f64>> {
        if self.dropout_rate <= 0.0 {
            return None;
        }
        let keep = 1.0 - self.dropout_rate;
        let rate = self.dropout_rate;
        let rng = &mut self.rng;
        Some(Array1::from_shape_fn(self.hidden_size, |_| {
            if rng.random::<f64>() < rate { 0.0 } else { 1.0 / keep }
        }))
    }

    /// One pass over the data in temporal order, one Adam step per batch.
    /// Returns the mean absolute error over all samples (dropout active).
    pub fn train_epoch(
        &mut self,
        sequences: &[Array2<f64>],
        targets: &[f64],
        optimizer: &mut AdamOptimizer,
        batch_size: usize,
        clip_norm: Option<f64>,
    ) -> Result<f64, TrainingError> {
        if sequences.len() != targets.len() {
            return Err(TrainingError::Shape(format!(
                "{} sequences but {} targets",
                sequences.len(),
                targets.len()
            )));
        }
        if sequences.is_empty() {
            return Err(TrainingError::Training("no training samples".to_string()));
        }
        if batch_size == 0 {
            return Err(TrainingError::ModelConfiguration(
                "batch size must be positive".to_string(),
            ));
        }
        for seq in sequences {
            self.check_sequence(seq)?;
        }

        let mut total_loss = 0.0;
        for (batch_seqs, batch_targets) in sequences.chunks(batch_size).zip(targets.chunks(batch_size)) {
            let masks: Vec<Option<Array1<f64>>> = (0..batch_seqs.len()).map(|_| self.dropout_mask()).collect();

            let model = &*self;
            let samples: Vec<(f64, ModelWeights)> = batch_seqs
                .par_iter()
                .zip(batch_targets.par_iter())
                .zip(masks.par_iter())
                .map(|((seq, &target), mask)| model.sample_gradients(seq, target, mask.as_ref()))
                .collect();

            // summed in sample order so the result does not depend on thread scheduling
            let mut batch_loss = 0.0;
            let mut grads = ModelWeights::zeros_like(&self.weights);
            for (loss, g) in &samples {
                batch_loss += loss;
                grads.add_assign(g);
            }

            grads.scale(1.0 / batch_seqs.len() as f64);
            if let Some(max_norm) = clip_norm {
                let norm = grads.squared_norm().sqrt();
                if norm > max_norm && norm > 0.0 {
                    grads.scale(max_norm / norm);
                }
            }
            self.apply_gradients(&grads, optimizer)?;
            total_loss += batch_loss;
        }

        let loss = total_loss / sequences.len() as f64;
        if !loss.is_finite() {
            return Err(TrainingError::Training(format!("training diverged (loss = {})", loss)));
        }
        Ok(loss)
    }

    fn apply_gradients(&mut self, grads: &ModelWeights, optimizer: &mut AdamOptimizer) -> Result<(), TrainingError> {
        optimizer.begin_step();
        for (l, (layer, grad)) in self
            .weights
            .lstm_layers
            .iter_mut()
            .zip(&grads.lstm_layers)
            .enumerate()
        {
            optimizer.update(&format!("lstm{}.w_ih", l), &mut layer.w_ih, &grad.w_ih)?;
            optimizer.update(&format!("lstm{}.w_hh", l), &mut layer.w_hh, &grad.w_hh)?;
            optimizer.update(&format!("lstm{}.b", l), &mut layer.b, &grad.b)?;
        }
        optimizer.update("dense.w", &mut self.weights.output.w, &grads.output.w)?;
        optimizer.update("dense.b", &mut self.weights.output.b, &grads.output.b)?;
        Ok(())
    }

    /// Mean absolute error without dropout.
    pub fn validate(&self, sequences: &[Array2<f64>], targets: &[f64]) -> Result<f64, TrainingError> {
        if sequences.is_empty() || sequences.len() != targets.len() {
            return Err(TrainingError::Shape(format!(
                "{} sequences but {} targets",
                sequences.len(),
                targets.len()
            )));
        }
        let predictions = self.predict_batch(sequences)?;
        let total: f64 = predictions
            .iter()
            .zip(targets)
            .map(|(p, t)| (p - t).abs())
            .sum();
        Ok(total / targets.len() as f64)
    }
}

fn glorot_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Result<Array2<f64>, TrainingError> {
    let limit = glorot_limit(cols, rows);
    let dist = Uniform::new(-limit, limit)
        .map_err(|e| TrainingError::ModelConfiguration(format!("initializer: {}", e)))?;
    Ok(Array2::from_shape_fn((rows, cols), |_| dist.sample(rng)))
}
