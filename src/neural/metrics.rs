// projeto: lstmsensortrain
// file: src/neural/metrics.rs
// Forecast error metrics, per-epoch history and target inversion

use log::{info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::neural::scaler::MinMaxScaler;
use crate::neural::utils::TrainingError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub val_loss: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, epoch: usize, loss: f64, val_loss: f64) {
        self.epochs.push(EpochMetrics { epoch, loss, val_loss });
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.loss).collect()
    }

    pub fn val_losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.val_loss).collect()
    }

    #[allow(dead_code)]
    pub fn latest(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn best(&self) -> Option<&EpochMetrics> {
        self.epochs
            .iter()
            .min_by(|a, b| a.val_loss.total_cmp(&b.val_loss))
    }
}

fn check_lengths(predictions: &[f64], targets: &[f64]) -> Result<(), TrainingError> {
    if predictions.len() != targets.len() {
        return Err(TrainingError::Shape(format!(
            "{} predictions but {} targets",
            predictions.len(),
            targets.len()
        )));
    }
    if targets.is_empty() {
        return Err(TrainingError::DataProcessing(
            "cannot score an empty forecast".to_string(),
        ));
    }
    Ok(())
}

pub fn rmse(predictions: &[f64], targets: &[f64]) -> Result<f64, TrainingError> {
    check_lengths(predictions, targets)?;
    let mse = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / targets.len() as f64;
    Ok(mse.sqrt())
}

/// Mean absolute percentage error in percent. Terms with a zero true value
/// are left out of the mean.
pub fn mape(predictions: &[f64], targets: &[f64]) -> Result<f64, TrainingError> {
    check_lengths(predictions, targets)?;
    let terms: Vec<f64> = predictions
        .iter()
        .zip(targets)
        .filter(|(_, t)| **t != 0.0)
        .map(|(p, t)| ((t - p) / t).abs())
        .collect();

    let skipped = targets.len() - terms.len();
    if terms.is_empty() {
        return Err(TrainingError::DataProcessing(
            "MAPE undefined: every true value is zero".to_string(),
        ));
    }
    if skipped > 0 {
        warn!(
            "⚠️ [Metrics] MAPE skipped {} of {} samples with a zero true value",
            skipped,
            targets.len()
        );
    }
    Ok(terms.iter().sum::<f64>() / terms.len() as f64 * 100.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mape: f64,
    pub mae: f64,
    pub r_squared: f64,
    pub directional_accuracy: f64,
    pub n_samples: usize,
}

pub fn calculate_regression_metrics(
    predictions: &[f64],
    targets: &[f64],
) -> Result<RegressionMetrics, TrainingError> {
    let rmse = rmse(predictions, targets)?;
    let mape = mape(predictions, targets)?;
    let n = targets.len() as f64;

    let mae = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).abs())
        .sum::<f64>()
        / n;

    let target_mean = targets.iter().sum::<f64>() / n;
    let ss_res = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (t - p).powi(2))
        .sum::<f64>();
    let ss_tot = targets.iter().map(|t| (t - target_mean).powi(2)).sum::<f64>();
    let r_squared = if ss_tot != 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let mut correct_direction = 0;
    for i in 1..predictions.len() {
        let pred_change = predictions[i] - predictions[i - 1];
        let actual_change = targets[i] - targets[i - 1];
        if pred_change.signum() == actual_change.signum() {
            correct_direction += 1;
        }
    }
    let directional_accuracy = if predictions.len() > 1 {
        correct_direction as f64 / (predictions.len() - 1) as f64
    } else {
        0.0
    };

    Ok(RegressionMetrics {
        rmse,
        mape,
        mae,
        r_squared,
        directional_accuracy,
        n_samples: predictions.len(),
    })
}

impl RegressionMetrics {
    pub fn log_summary(&self, prefix: &str) {
        info!("📊 [{}] Regression Metrics:", prefix);
        info!("   ├── Samples: {}", self.n_samples);
        info!("   ├── RMSE: {:.6}", self.rmse);
        info!("   ├── MAE: {:.6}", self.mae);
        info!("   ├── MAPE: {:.2}%", self.mape);
        info!("   ├── Direction Acc: {:.2}%", self.directional_accuracy * 100.0);
        info!("   └── R²: {:.6}", self.r_squared);
    }
}

/// Maps scaled target values back to the original scale. Each value is
/// written into its row of `context` (scaled `t-1` values of every variable)
/// at `target_var`, the rows are inverted with `scaler` and the target column
/// is read back.
pub fn invert_target(
    scaler: &MinMaxScaler,
    context: &Array2<f64>,
    values: &[f64],
    target_var: usize,
) -> Result<Vec<f64>, TrainingError> {
    if context.nrows() != values.len() {
        return Err(TrainingError::Shape(format!(
            "{} context rows for {} values",
            context.nrows(),
            values.len()
        )));
    }
    if target_var >= context.ncols() {
        return Err(TrainingError::Shape(format!(
            "target column {} out of range for {} columns",
            target_var,
            context.ncols()
        )));
    }

    let mut rows = context.clone();
    for (mut row, &value) in rows.rows_mut().into_iter().zip(values) {
        row[target_var] = value;
    }
    let restored = scaler.inverse_transform(&rows.view())?;
    Ok(restored.column(target_var).to_vec())
}
