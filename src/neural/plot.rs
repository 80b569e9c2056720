// projeto: lstmsensortrain
// file: src/neural/plot.rs
// HTML charts for the loss curves and the test forecast

use log::info;
use plotly::color::NamedColor;
use plotly::common::{Line, Mode};
use plotly::layout::Axis;
use plotly::{Layout, Plot, Scatter};
use std::fs;
use std::path::{Path, PathBuf};

use crate::neural::metrics::TrainingHistory;
use crate::neural::utils::TrainingError;

pub const LOSS_PLOT_FILE: &str = "loss_plot.html";
pub const PREDICTION_PLOT_FILE: &str = "prediction_plot.html";

fn write_plot(plot: &Plot, path: &Path, show: bool) -> Result<(), TrainingError> {
    fs::write(path, plot.to_html())?;
    info!("🖼️ [Plot] Chart saved to {}", path.display());
    if show {
        plot.show();
    }
    Ok(())
}

pub fn loss_plot(history: &TrainingHistory) -> Plot {
    let epochs: Vec<usize> = history.epochs.iter().map(|m| m.epoch).collect();

    let trace_train = Scatter::new(epochs.clone(), history.losses())
        .name("train")
        .mode(Mode::Lines);
    let trace_valid = Scatter::new(epochs, history.val_losses())
        .name("test")
        .mode(Mode::Lines);

    let mut plot = Plot::new();
    plot.add_trace(trace_train);
    plot.add_trace(trace_valid);
    plot.set_layout(
        Layout::new()
            .title("LSTM Training and Validation Loss (MAE)")
            .x_axis(Axis::new().title("Epoch"))
            .y_axis(Axis::new().title("Loss")),
    );
    plot
}

/// Forecast (red) against the observed series (blue), x = 1..N.
pub fn prediction_plot(predictions: &[f64], actual: &[f64]) -> Plot {
    let steps: Vec<usize> = (1..=predictions.len().max(actual.len())).collect();

    let trace_pred = Scatter::new(steps[..predictions.len()].to_vec(), predictions.to_vec())
        .name("prediction")
        .mode(Mode::Lines)
        .line(Line::new().color(NamedColor::Red));
    let trace_actual = Scatter::new(steps[..actual.len()].to_vec(), actual.to_vec())
        .name("actual")
        .mode(Mode::Lines)
        .line(Line::new().color(NamedColor::Blue));

    let mut plot = Plot::new();
    plot.add_trace(trace_pred);
    plot.add_trace(trace_actual);
    plot.set_layout(
        Layout::new()
            .title("Test forecast vs actual")
            .x_axis(Axis::new().title("Step"))
            .y_axis(Axis::new().title("Target")),
    );
    plot
}

pub fn save_loss_plot(history: &TrainingHistory, output_dir: &Path, show: bool) -> Result<PathBuf, TrainingError> {
    if history.is_empty() {
        return Err(TrainingError::Plot("no epochs recorded".to_string()));
    }
    let path = output_dir.join(LOSS_PLOT_FILE);
    write_plot(&loss_plot(history), &path, show)?;
    Ok(path)
}

pub fn save_prediction_plot(
    predictions: &[f64],
    actual: &[f64],
    output_dir: &Path,
    show: bool,
) -> Result<PathBuf, TrainingError> {
    if predictions.is_empty() || actual.is_empty() {
        return Err(TrainingError::Plot("nothing to plot".to_string()));
    }
    let path = output_dir.join(PREDICTION_PLOT_FILE);
    write_plot(&prediction_plot(predictions, actual), &path, show)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lstmsensortrain_plot_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_save_loss_plot() {
        let mut history = TrainingHistory::new();
        history.record(1, 0.4, 0.5);
        history.record(2, 0.3, 0.35);

        let dir = temp_dir("loss");
        let path = save_loss_plot(&history, &dir, false).unwrap();
        assert_eq!(path.file_name().unwrap(), LOSS_PLOT_FILE);
        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("plotly"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_prediction_plot() {
        let dir = temp_dir("pred");
        let path = save_prediction_plot(&[1.0, 2.0, 3.0], &[1.5, 2.5, 2.0], &dir, false).unwrap();
        assert!(path.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        let dir = std::env::temp_dir();
        assert!(matches!(
            save_loss_plot(&TrainingHistory::new(), &dir, false),
            Err(TrainingError::Plot(_))
        ));
        assert!(save_prediction_plot(&[], &[1.0], &dir, false).is_err());
    }
}
