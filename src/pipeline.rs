// projeto: lstmsensortrain
// file: src/pipeline.rs
// Pipeline completo: carga, normalização, janelas, treino, avaliação e gráficos

use log::{debug, info, warn};
use ndarray::{s, Array2};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::ForecastConfig;
use crate::neural::data::{build_dataset, load_sensor_csv, split_rows, training_raw_rows};
use crate::neural::metrics::{calculate_regression_metrics, invert_target};
use crate::neural::plot::{save_loss_plot, save_prediction_plot};
use crate::neural::storage::{save_run_artifacts, TrainingReport};
use crate::neural::utils::{validate_input_data, validate_targets};
use crate::neural::window::complete_rows;
use crate::neural::{
    series_to_supervised, AdamOptimizer, LstmRegressor, MinMaxScaler, RegressionMetrics, ScalerFit,
    SensorTable, TrainingError, TrainingHistory, WindowedDataset,
};

#[derive(Debug)]
pub struct ForecastOutcome {
    pub history: TrainingHistory,
    /// Test-split forecast on the original scale.
    pub predictions: Vec<f64>,
    /// Observed target on the original scale.
    pub actual: Vec<f64>,
    pub metrics: RegressionMetrics,
    pub plots: Vec<PathBuf>,
    pub artifacts: Option<(PathBuf, PathBuf)>,
}

pub fn run_forecast(config: &ForecastConfig) -> Result<ForecastOutcome, TrainingError> {
    config.validate()?;
    let table = load_sensor_csv(&config.data_path)?;
    run_on_table(&table, config)
}

pub fn run_on_table(table: &SensorTable, config: &ForecastConfig) -> Result<ForecastOutcome, TrainingError> {
    config.validate()?;
    let target_var = config.target_index(table.n_features())?;
    let target_name = table.feature_names[target_var].clone();
    info!(
        "🎯 Alvo: '{}' (coluna {}) | Entradas: {} passos x {} variáveis",
        target_name,
        target_var + 1,
        config.n_in,
        table.n_features()
    );

    if let (Some(first), Some(last)) = (table.index.first(), table.index.last()) {
        debug!("📅 {}: {} → {}", table.index_name, first, last);
    }

    let raw = table.to_f64();
    let missing = table.missing_cells();
    if missing > 0 {
        warn!("⚠️ {} células ausentes; janelas que as tocam serão descartadas", missing);
    }

    // Normalização
    let times = complete_rows(&raw.view(), config.n_in, config.n_out);
    let scaler = fit_scaler(&raw, &times, config)?;
    let scaled = scaler.transform(&raw.view())?;

    // Janelas supervisionadas
    let frame = series_to_supervised(&scaled.view(), config.n_in, config.n_out, true)?;
    validate_input_data(&frame.values.view(), "windowed table")?;
    info!("✅ Janelas supervisionadas: {:?}", frame.shape());

    let (train_range, test_range) = split_rows(frame.nrows(), config.train_rows)?;
    if let Some(first) = frame.times.get(test_range.start).and_then(|&t| table.index.get(t)) {
        debug!("🧪 Teste a partir de {} = {}", table.index_name, first);
    }
    let train = build_dataset(&frame, train_range, target_var)?;
    let test = build_dataset(&frame, test_range, target_var)?;
    validate_targets(&train.targets, "training targets")?;
    validate_targets(&test.targets, "test targets")?;
    info!(
        "✅ Dados divididos - Treino: {:?} | Teste: {:?}",
        train.input_shape(),
        test.input_shape()
    );

    info!("🛠️ Inicializando modelo LSTM");
    let mut model = LstmRegressor::new(
        table.n_features(),
        config.hidden_size,
        config.num_layers,
        config.dropout,
        config.seed,
    )?;
    info!("✅ Modelo criado com {} parâmetros", model.num_parameters());

    let history = train_model(&mut model, &train, &test, config)?;

    let scaled_predictions = model.predict_batch(&test.sequences)?;
    let predictions = invert_target(&scaler, &test.context, &scaled_predictions, target_var)?;
    let actual = invert_target(&scaler, &test.context, &test.targets, target_var)?;
    let metrics = calculate_regression_metrics(&predictions, &actual)?;
    metrics.log_summary("Test");

    fs::create_dir_all(&config.output_dir)?;
    let plots = vec![
        save_loss_plot(&history, &config.output_dir, config.show_plots)?,
        save_prediction_plot(&predictions, &actual, &config.output_dir, config.show_plots)?,
    ];

    let artifacts = if config.report {
        let report = TrainingReport {
            generated_at: String::new(),
            config: config.clone(),
            feature_names: table.feature_names.clone(),
            target_name,
            windowed_shape: frame.shape(),
            train_shape: train.input_shape(),
            test_shape: test.input_shape(),
            num_parameters: model.num_parameters(),
            metrics: metrics.clone(),
            history: history.clone(),
        }
        .stamp();
        Some(save_run_artifacts(&report, &config.output_dir)?)
    } else {
        None
    };

    Ok(ForecastOutcome {
        history,
        predictions,
        actual,
        metrics,
        plots,
        artifacts,
    })
}

/// Fits the scaler on the raw rows selected by `config.scaler_fit`. `times`
/// holds the source step of every complete window.
fn fit_scaler(raw: &Array2<f64>, times: &[usize], config: &ForecastConfig) -> Result<MinMaxScaler, TrainingError> {
    // fail on a missing test split before fitting on a clipped range
    split_rows(times.len(), config.train_rows)?;
    let fit_rows = match config.scaler_fit {
        ScalerFit::TrainOnly => training_raw_rows(times, config.train_rows, config.n_out),
        ScalerFit::Full => 0..raw.nrows(),
    };
    debug!("📐 Scaler ajustado nas linhas {:?} ({:?})", fit_rows, config.scaler_fit);
    let mut scaler = MinMaxScaler::default();
    scaler.fit(&raw.slice(s![fit_rows, ..]))?;
    Ok(scaler)
}

fn train_model(
    model: &mut LstmRegressor,
    train: &WindowedDataset,
    test: &WindowedDataset,
    config: &ForecastConfig,
) -> Result<TrainingHistory, TrainingError> {
    let mut optimizer = AdamOptimizer::with_learning_rate(config.learning_rate);
    let mut history = TrainingHistory::new();

    info!(
        "🎓 Iniciando treinamento por {} épocas ({} amostras, batch {}, lr {})",
        config.epochs,
        train.len(),
        config.batch_size,
        config.learning_rate
    );
    let start = Instant::now();

    for epoch in 1..=config.epochs {
        let epoch_start = Instant::now();
        let loss = model.train_epoch(
            &train.sequences,
            &train.targets,
            &mut optimizer,
            config.batch_size,
            config.clip_norm,
        )?;
        let val_loss = model.validate(&test.sequences, &test.targets)?;
        history.record(epoch, loss, val_loss);

        info!(
            "📈 Época {}/{}: loss={:.6} | val_loss={:.6} | {:.1}s",
            epoch,
            config.epochs,
            loss,
            val_loss,
            epoch_start.elapsed().as_secs_f64()
        );
    }

    if let Some(best) = history.best() {
        info!(
            "⏱️ Treinamento concluído em {:.2}s | melhor val_loss {:.6} na época {}",
            start.elapsed().as_secs_f64(),
            best.val_loss,
            best.epoch
        );
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn synthetic_table(rows: usize) -> SensorTable {
        let values = Array2::from_shape_fn((rows, 3), |(i, j)| {
            let t = i as f32;
            match j {
                0 => 20.0 + (t * 0.15).sin(),
                1 => 40.0 + (t * 0.05).cos() * 3.0,
                _ => 10.0 + (t * 0.15).sin() * 2.0 + (t * 0.05).cos(),
            }
        });
        SensorTable {
            index_name: "date".to_string(),
            index: (0..rows).map(|i| format!("t{}", i)).collect(),
            feature_names: vec!["temp".to_string(), "humidity".to_string(), "load".to_string()],
            values,
        }
    }

    fn small_config(name: &str) -> ForecastConfig {
        ForecastConfig {
            n_in: 3,
            train_rows: 80,
            hidden_size: 6,
            epochs: 3,
            batch_size: 16,
            seed: Some(1),
            output_dir: std::env::temp_dir()
                .join(format!("lstmsensortrain_pipeline_{}_{}", name, std::process::id())),
            ..ForecastConfig::default()
        }
    }

    #[test]
    fn test_run_on_table_end_to_end() {
        let mut config = small_config("e2e");
        config.report = true;
        let outcome = run_on_table(&synthetic_table(120), &config).unwrap();

        // 120 rows - 3 lags = 117 windows, 80 for training
        assert_eq!(outcome.predictions.len(), 37);
        assert_eq!(outcome.actual.len(), 37);
        assert_eq!(outcome.history.len(), 3);
        assert!(outcome.metrics.rmse.is_finite());
        assert!(outcome.metrics.mape.is_finite());
        assert!(outcome.plots.iter().all(|p| p.exists()));

        let (history_path, report_path) = outcome.artifacts.clone().unwrap();
        assert!(history_path.exists());
        assert!(report_path.exists());

        // actual values come back on the original scale
        let table = synthetic_table(120);
        let expected = table.values[[83, 2]] as f64;
        assert!((outcome.actual[0] - expected).abs() < 1e-4);

        fs::remove_dir_all(&config.output_dir).unwrap();
    }

    #[test]
    fn test_full_scaler_fit_and_explicit_target() {
        let mut config = small_config("full");
        config.scaler_fit = ScalerFit::Full;
        config.target = Some(1);
        config.num_layers = 2;
        config.epochs = 1;
        let table = synthetic_table(100);
        let outcome = run_on_table(&table, &config).unwrap();
        assert_eq!(outcome.predictions.len(), 100 - 3 - 80);
        assert!(outcome.artifacts.is_none());

        // target is 'temp'; the first test window sits at raw step 80 + 3
        let expected = table.values[[83, 0]] as f64;
        assert!((outcome.actual[0] - expected).abs() < 1e-4);
        fs::remove_dir_all(&config.output_dir).unwrap();
    }

    #[test]
    fn test_train_only_fit_ignores_test_rows() {
        // rising target: the test split exceeds everything seen in training
        let raw = Array2::from_shape_fn((120, 2), |(i, j)| if j == 0 { (i as f64).sin() } else { i as f64 });
        let times = complete_rows(&raw.view(), 3, 1);
        let mut config = small_config("fit");

        config.scaler_fit = ScalerFit::TrainOnly;
        let train_only = fit_scaler(&raw, &times, &config).unwrap();
        config.scaler_fit = ScalerFit::Full;
        let full = fit_scaler(&raw, &times, &config).unwrap();

        // 80 training windows end at raw step 82
        assert_eq!(train_only.data_max[1], 82.0);
        assert_eq!(full.data_max[1], 119.0);
        assert_eq!(train_only.data_min[1], full.data_min[1]);

        let scaled = train_only.transform(&raw.view()).unwrap();
        assert!(scaled[[119, 1]] > 1.0);
        assert!((full.transform(&raw.view()).unwrap()[[119, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gaps_drop_the_windows_that_touch_them() {
        let mut table = synthetic_table(120);
        table.values[[50, 1]] = f32::NAN;
        let config = small_config("gaps");
        let outcome = run_on_table(&table, &config).unwrap();

        // windows ending at steps 50..=53 read row 50: 117 - 4 = 113 remain
        assert_eq!(outcome.predictions.len(), 113 - 80);
        assert!(outcome.predictions.iter().all(|p| p.is_finite()));
        assert!(outcome.metrics.rmse.is_finite());

        // 47 windows before the gap, so test window 0 is raw step 54 + 33
        let expected = table.values[[87, 2]] as f64;
        assert!((outcome.actual[0] - expected).abs() < 1e-4);
        fs::remove_dir_all(&config.output_dir).unwrap();
    }

    #[test]
    fn test_train_rows_must_leave_a_test_split() {
        let mut config = small_config("split");
        config.train_rows = 200;
        assert!(matches!(
            run_on_table(&synthetic_table(100), &config),
            Err(TrainingError::DataProcessing(_))
        ));
    }

    #[test]
    fn test_missing_csv_is_reported() {
        let mut config = small_config("missing");
        config.data_path = PathBuf::from("/nonexistent/sensordata.csv");
        assert!(matches!(run_forecast(&config), Err(TrainingError::Io(_))));
    }
}
