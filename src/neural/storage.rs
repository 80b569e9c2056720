// projeto: lstmsensortrain
// file: src/neural/storage.rs
// Training history and run report export (CSV / JSON)

use chrono::Utc;
use csv::Writer;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ForecastConfig;
use crate::neural::metrics::{RegressionMetrics, TrainingHistory};
use crate::neural::utils::TrainingError;

pub const HISTORY_FILE: &str = "training_history.csv";
pub const REPORT_FILE: &str = "training_report.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub generated_at: String,
    pub config: ForecastConfig,
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub windowed_shape: (usize, usize),
    pub train_shape: (usize, usize, usize),
    pub test_shape: (usize, usize, usize),
    pub num_parameters: usize,
    pub metrics: RegressionMetrics,
    pub history: TrainingHistory,
}

impl TrainingReport {
    /// Stamps the report with the current UTC time.
    pub fn stamp(mut self) -> Self {
        self.generated_at = Utc::now().to_rfc3339();
        self
    }
}

/// One row per epoch: `epoch,loss,val_loss`.
pub fn save_history_csv(history: &TrainingHistory, path: &Path) -> Result<(), TrainingError> {
    let mut writer = Writer::from_path(path)?;
    for record in &history.epochs {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("📊 [Storage] Training history saved to: {}", path.display());
    Ok(())
}

pub fn save_report_json(report: &TrainingReport, path: &Path) -> Result<(), TrainingError> {
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    info!("💾 [Storage] Run report saved to: {}", path.display());
    Ok(())
}

/// Writes both artifacts into `output_dir` and returns their paths.
pub fn save_run_artifacts(report: &TrainingReport, output_dir: &Path) -> Result<(PathBuf, PathBuf), TrainingError> {
    let history_path = output_dir.join(HISTORY_FILE);
    let report_path = output_dir.join(REPORT_FILE);
    save_history_csv(&report.history, &history_path)?;
    save_report_json(report, &report_path)?;
    Ok((history_path, report_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> TrainingReport {
        let mut history = TrainingHistory::new();
        history.record(1, 0.25, 0.3);
        history.record(2, 0.125, 0.2);
        TrainingReport {
            generated_at: String::new(),
            config: ForecastConfig::default(),
            feature_names: vec!["temp".to_string(), "load".to_string()],
            target_name: "load".to_string(),
            windowed_shape: (100, 12),
            train_shape: (80, 5, 2),
            test_shape: (20, 5, 2),
            num_parameters: 1234,
            metrics: RegressionMetrics {
                rmse: 1.5,
                mape: 12.0,
                mae: 1.0,
                r_squared: 0.8,
                directional_accuracy: 0.6,
                n_samples: 20,
            },
            history,
        }
        .stamp()
    }

    #[test]
    fn test_save_run_artifacts() {
        let dir = std::env::temp_dir().join(format!("lstmsensortrain_storage_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let report = sample_report();
        let (history_path, report_path) = save_run_artifacts(&report, &dir).unwrap();

        let csv_text = fs::read_to_string(&history_path).unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();
        assert_eq!(lines[0], "epoch,loss,val_loss");
        assert_eq!(lines[1], "1,0.25,0.3");
        assert_eq!(lines.len(), 3);

        let loaded: TrainingReport =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(loaded.num_parameters, 1234);
        assert_eq!(loaded.history.len(), 2);
        assert_eq!(loaded.config, ForecastConfig::default());
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded.generated_at).is_ok());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_history_to_missing_directory_fails() {
        let history = TrainingHistory::new();
        let path = Path::new("/nonexistent/dir/history.csv");
        assert!(save_history_csv(&history, path).is_err());
    }
}
