// projeto: lstmsensortrain
// file: src/neural/data.rs
// Sensor CSV loading, train/test splitting and sequence building

use csv::ReaderBuilder;
use log::{debug, info, warn};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use crate::neural::utils::TrainingError;
use crate::neural::SupervisedFrame;

/// Raw sensor table: one row per timestamp, one column per feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorTable {
    pub index_name: String,
    pub index: Vec<String>,
    pub feature_names: Vec<String>,
    pub values: Array2<f32>,
}

impl SensorTable {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    pub fn to_f64(&self) -> Array2<f64> {
        self.values.mapv(f64::from)
    }

    pub fn missing_cells(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }
}

// Blank and NA markers load as NaN.
fn is_missing(field: &str) -> bool {
    matches!(field, "" | "NA" | "N/A" | "null")
}

pub fn load_sensor_csv<P: AsRef<Path>>(path: P) -> Result<SensorTable, TrainingError> {
    let path = path.as_ref();
    info!("📥 [DataLoader] Loading sensor series from {}", path.display());
    let file = File::open(path)?;
    let table = read_sensor_csv(file)?;
    info!(
        "✅ [DataLoader] Loaded {} records with {} features",
        table.n_rows(),
        table.n_features()
    );
    let missing = table.missing_cells();
    if missing > 0 {
        warn!("⚠️ [DataLoader] {} missing cells loaded as NaN", missing);
    }
    Ok(table)
}

/// Parses a CSV whose first column is the timestamp index and whose remaining
/// columns are numeric features. Empty cells become NaN.
pub fn read_sensor_csv<R: Read>(reader: R) -> Result<SensorTable, TrainingError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(TrainingError::DataProcessing(format!(
            "expected an index column and at least one feature, found {} columns",
            headers.len()
        )));
    }
    let index_name = headers[0].to_string();
    let feature_names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let n_features = feature_names.len();

    let mut index = Vec::new();
    let mut flat: Vec<f32> = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        index.push(record[0].to_string());
        for (col, field) in record.iter().skip(1).enumerate() {
            if is_missing(field) {
                flat.push(f32::NAN);
                continue;
            }
            let value = field.parse::<f32>().map_err(|_| {
                TrainingError::DataProcessing(format!(
                    "row {}, column '{}': cannot parse '{}' as float",
                    row + 1,
                    feature_names[col],
                    field
                ))
            })?;
            flat.push(value);
        }
    }

    let values = Array2::from_shape_vec((index.len(), n_features), flat)?;
    debug!("🔢 [DataLoader] Raw table shape: {:?}", values.dim());

    Ok(SensorTable {
        index_name,
        index,
        feature_names,
        values,
    })
}

/// Raw rows covered by the first `n_train` windowed rows, given the source
/// step of every windowed row.
pub fn training_raw_rows(times: &[usize], n_train: usize, n_out: usize) -> Range<usize> {
    match n_train.min(times.len()).checked_sub(1) {
        Some(last) => 0..times[last] + n_out,
        None => 0..0,
    }
}

/// Contiguous train prefix and test suffix of the windowed rows.
pub fn split_rows(n_rows: usize, n_train: usize) -> Result<(Range<usize>, Range<usize>), TrainingError> {
    if n_train == 0 {
        return Err(TrainingError::DataProcessing(
            "training split is empty".to_string(),
        ));
    }
    if n_train >= n_rows {
        return Err(TrainingError::DataProcessing(format!(
            "{} windowed rows leave nothing to test after {} training rows",
            n_rows, n_train
        )));
    }
    Ok((0..n_train, n_train..n_rows))
}

/// Model-ready view of a block of windowed rows.
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    /// One `[n_in, n_vars]` matrix per row, oldest step first.
    pub sequences: Vec<Array2<f64>>,
    /// Scaled target value per row.
    pub targets: Vec<f64>,
    /// Scaled `t-1` values of every variable, used to invert the target.
    pub context: Array2<f64>,
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// `(samples, timesteps, features)`
    pub fn input_shape(&self) -> (usize, usize, usize) {
        let (steps, vars) = self.sequences.first().map(|s| s.dim()).unwrap_or((0, 0));
        (self.sequences.len(), steps, vars)
    }
}

/// Builds sequences and targets from `rows` of the frame. The target is
/// variable `target_var` at the last lead step.
pub fn build_dataset(
    frame: &SupervisedFrame,
    rows: Range<usize>,
    target_var: usize,
) -> Result<WindowedDataset, TrainingError> {
    if frame.n_in == 0 {
        return Err(TrainingError::ModelConfiguration(
            "the recurrent model needs at least one lag step (n_in >= 1)".to_string(),
        ));
    }
    if target_var >= frame.n_vars {
        return Err(TrainingError::ModelConfiguration(format!(
            "target variable {} out of range for {} variables",
            target_var + 1,
            frame.n_vars
        )));
    }

    let lag_cols = frame.lag_columns()?;
    let target_col = frame.column_for(target_var, frame.n_out as isize - 1)?;
    let context_cols: Vec<usize> = (0..frame.n_vars)
        .map(|j| frame.column_for(j, -1))
        .collect::<Result<_, _>>()?;

    let inputs = frame.select(rows.clone(), &lag_cols);
    let sequences = inputs
        .axis_iter(Axis(0))
        .map(|row| {
            row.to_owned()
                .into_shape_with_order((frame.n_in, frame.n_vars))
                .map_err(TrainingError::from)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let targets = frame
        .values
        .slice(ndarray::s![rows.clone(), target_col])
        .to_vec();
    let context = frame.select(rows, &context_cols);

    Ok(WindowedDataset {
        sequences,
        targets,
        context,
    })
}
