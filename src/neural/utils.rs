// projeto: lstmsensortrain
// file: src/neural/utils.rs
// Error handling, Adam optimizer and numeric helpers shared by the training system

use ndarray::{Array, ArrayD, ArrayView2, Dimension, ShapeError};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Data processing error: {0}")]
    DataProcessing(String),

    #[error("Model configuration error: {0}")]
    ModelConfiguration(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Plot error: {0}")]
    Plot(String),
}

impl From<ShapeError> for TrainingError {
    fn from(err: ShapeError) -> Self {
        TrainingError::Shape(err.to_string())
    }
}

impl From<serde_json::Error> for TrainingError {
    fn from(err: serde_json::Error) -> Self {
        TrainingError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for TrainingError {
    fn from(err: toml::de::Error) -> Self {
        TrainingError::Serialization(err.to_string())
    }
}

/// Adam with one pair of moment buffers per named parameter.
///
/// `begin_step` must be called once per optimisation step, before the
/// `update` calls for that step, so every parameter sees the same bias
/// correction.
#[derive(Debug, Clone)]
pub struct AdamOptimizer {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub t: usize,
    m: HashMap<String, ArrayD<f64>>,
    v: HashMap<String, ArrayD<f64>>,
}

impl AdamOptimizer {
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        AdamOptimizer {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: HashMap::new(),
            v: HashMap::new(),
        }
    }

    /// beta1 0.9, beta2 0.999, epsilon 1e-7.
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self::new(learning_rate, 0.9, 0.999, 1e-7)
    }

    pub fn begin_step(&mut self) {
        self.t += 1;
    }

    /// Applies one Adam update to `param` in place.
    pub fn update<D: Dimension>(
        &mut self,
        param_name: &str,
        param: &mut Array<f64, D>,
        gradient: &Array<f64, D>,
    ) -> Result<(), TrainingError> {
        if param.shape() != gradient.shape() {
            return Err(TrainingError::Shape(format!(
                "gradient for '{}' has shape {:?}, parameter has {:?}",
                param_name,
                gradient.shape(),
                param.shape()
            )));
        }
        let t = self.t.max(1) as i32;
        let grad = gradient.view().into_dyn();

        let m = self
            .m
            .entry(param_name.to_string())
            .or_insert_with(|| ArrayD::zeros(grad.shape()));
        let v = self
            .v
            .entry(param_name.to_string())
            .or_insert_with(|| ArrayD::zeros(grad.shape()));

        *m = &*m * self.beta1 + &grad * (1.0 - self.beta1);
        *v = &*v * self.beta2 + &grad.mapv(|x| x * x) * (1.0 - self.beta2);

        let m_hat = &*m / (1.0 - self.beta1.powi(t));
        let v_hat = &*v / (1.0 - self.beta2.powi(t));
        let step = &m_hat / &(v_hat.mapv(f64::sqrt) + self.epsilon) * self.learning_rate;

        let mut target = param.view_mut().into_dyn();
        target -= &step;
        Ok(())
    }
}

pub fn sigmoid_scalar(x: f64) -> f64 {
    if x > 500.0 {
        1.0
    } else if x < -500.0 {
        0.0
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}

pub fn sigmoid<D: Dimension>(x: &Array<f64, D>) -> Array<f64, D> {
    x.mapv(sigmoid_scalar)
}

pub fn tanh<D: Dimension>(x: &Array<f64, D>) -> Array<f64, D> {
    x.mapv(f64::tanh)
}

/// Glorot-uniform limit for a `fan_in x fan_out` kernel.
pub fn glorot_limit(fan_in: usize, fan_out: usize) -> f64 {
    (6.0 / (fan_in + fan_out) as f64).sqrt()
}

pub fn validate_input_data(data: &ArrayView2<f64>, name: &str) -> Result<(), TrainingError> {
    if data.is_empty() {
        return Err(TrainingError::DataProcessing(format!("{} is empty", name)));
    }

    for ((i, j), &value) in data.indexed_iter() {
        if value.is_nan() {
            return Err(TrainingError::DataProcessing(format!(
                "{} contains NaN at position ({}, {})",
                name, i, j
            )));
        }
        if value.is_infinite() {
            return Err(TrainingError::DataProcessing(format!(
                "{} contains infinite value at position ({}, {})",
                name, i, j
            )));
        }
    }

    Ok(())
}

pub fn validate_targets(targets: &[f64], name: &str) -> Result<(), TrainingError> {
    if targets.is_empty() {
        return Err(TrainingError::DataProcessing(format!("{} is empty", name)));
    }

    for (i, &value) in targets.iter().enumerate() {
        if !value.is_finite() {
            return Err(TrainingError::DataProcessing(format!(
                "{} contains non-finite value at position {}",
                name, i
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_adam_moves_against_gradient() {
        let mut optimizer = AdamOptimizer::with_learning_rate(0.1);
        let mut param = Array1::from_vec(vec![1.0, -1.0, 0.5]);
        let gradient = Array1::from_vec(vec![0.3, -0.2, 0.0]);

        optimizer.begin_step();
        optimizer.update("w", &mut param, &gradient).unwrap();

        // first Adam step moves every non-zero-gradient entry by ~lr
        assert!((param[0] - 0.9).abs() < 1e-4);
        assert!((param[1] - (-0.9)).abs() < 1e-4);
        assert_eq!(param[2], 0.5);
    }

    #[test]
    fn test_adam_keeps_separate_moments() {
        let mut optimizer = AdamOptimizer::with_learning_rate(0.01);
        let mut a = Array2::<f64>::zeros((2, 2));
        let mut b = Array1::<f64>::zeros(3);
        optimizer.begin_step();
        optimizer.update("a", &mut a, &Array2::ones((2, 2))).unwrap();
        optimizer.update("b", &mut b, &Array1::ones(3)).unwrap();
        assert_eq!(optimizer.t, 1);
        assert!(a.iter().all(|&x| x < 0.0));
        assert!(b.iter().all(|&x| x < 0.0));
    }

    #[test]
    fn test_adam_rejects_shape_mismatch() {
        let mut optimizer = AdamOptimizer::with_learning_rate(0.01);
        let mut param = Array1::<f64>::zeros(3);
        optimizer.begin_step();
        let result = optimizer.update("w", &mut param, &Array1::ones(2));
        assert!(matches!(result, Err(TrainingError::Shape(_))));
    }

    #[test]
    fn test_activation_functions() {
        let x = Array1::from_vec(vec![-1.0, 0.0, 1.0]);
        let sig_result = sigmoid(&x);
        assert!(sig_result[0] < 0.5);
        assert!((sig_result[1] - 0.5).abs() < 1e-10);
        assert!(sig_result[2] > 0.5);
        let tanh_result = tanh(&x);
        assert!(tanh_result[0] < 0.0);
        assert!((tanh_result[1]).abs() < 1e-10);
        assert!(tanh_result[2] > 0.0);
        assert_eq!(sigmoid_scalar(1000.0), 1.0);
        assert_eq!(sigmoid_scalar(-1000.0), 0.0);
    }

    #[test]
    fn test_data_validation() {
        let valid_data = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(validate_input_data(&valid_data.view(), "test").is_ok());
        let invalid_data = Array2::from_shape_vec((2, 2), vec![1.0, f64::NAN, 3.0, 4.0]).unwrap();
        assert!(validate_input_data(&invalid_data.view(), "test").is_err());
        let valid_targets = vec![1.0, 2.0, 3.0];
        assert!(validate_targets(&valid_targets, "test").is_ok());
        let invalid_targets = vec![1.0, f64::INFINITY, 3.0];
        assert!(validate_targets(&invalid_targets, "test").is_err());
    }
}
