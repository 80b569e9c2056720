// projeto: lstmsensortrain
// file: src/neural/scaler.rs
// Per-column min-max normalisation with an exact inverse

use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use crate::neural::utils::TrainingError;

/// Which raw rows the scaler bounds are fitted on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalerFit {
    /// Only the rows that feed training windows.
    #[default]
    TrainOnly,
    /// Every row, train and test together.
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub feature_range: (f64, f64),
    pub data_min: Array1<f64>,
    pub data_max: Array1<f64>,
    fitted: bool,
}

impl Default for MinMaxScaler {
    fn default() -> Self {
        Self::new((0.0, 1.0))
    }
}

impl MinMaxScaler {
    pub fn new(feature_range: (f64, f64)) -> Self {
        MinMaxScaler {
            feature_range,
            data_min: Array1::zeros(0),
            data_max: Array1::zeros(0),
            fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn n_features(&self) -> usize {
        self.data_min.len()
    }

    /// Fits per-column bounds. NaN cells are ignored; a column with no
    /// observed value is a data error.
    pub fn fit(&mut self, data: &ArrayView2<f64>) -> Result<(), TrainingError> {
        let (lo, hi) = self.feature_range;
        if !(lo < hi) {
            return Err(TrainingError::ModelConfiguration(format!(
                "invalid feature range ({}, {})",
                lo, hi
            )));
        }
        if data.nrows() == 0 {
            return Err(TrainingError::DataProcessing(
                "cannot fit scaler on an empty table".to_string(),
            ));
        }

        let cols = data.ncols();
        let mut data_min = Array1::zeros(cols);
        let mut data_max = Array1::zeros(cols);
        for (j, column) in data.axis_iter(Axis(1)).enumerate() {
            let min = *column.min_skipnan();
            let max = *column.max_skipnan();
            if min.is_nan() || max.is_nan() {
                return Err(TrainingError::DataProcessing(format!(
                    "column {} has no observed values",
                    j
                )));
            }
            data_min[j] = min;
            data_max[j] = max;
        }

        self.data_min = data_min;
        self.data_max = data_max;
        self.fitted = true;
        Ok(())
    }

    // A zero-range column gets unit range, so it lands on the range minimum
    // and still inverts exactly.
    fn column_range(&self, j: usize) -> f64 {
        let range = self.data_max[j] - self.data_min[j];
        if range == 0.0 { 1.0 } else { range }
    }

    fn span(&self) -> f64 {
        self.feature_range.1 - self.feature_range.0
    }

    fn check(&self, cols: usize) -> Result<(), TrainingError> {
        if !self.is_fitted() {
            return Err(TrainingError::ModelConfiguration(
                "scaler used before fit".to_string(),
            ));
        }
        if cols != self.n_features() {
            return Err(TrainingError::Shape(format!(
                "scaler fitted on {} columns, got {}",
                self.n_features(),
                cols
            )));
        }
        Ok(())
    }

    pub fn transform(&self, data: &ArrayView2<f64>) -> Result<Array2<f64>, TrainingError> {
        self.check(data.ncols())?;
        let mut out = data.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let range = self.column_range(j);
            let (min, lo, span) = (self.data_min[j], self.feature_range.0, self.span());
            column.mapv_inplace(|x| (x - min) / range * span + lo);
        }
        Ok(out)
    }

    #[allow(dead_code)]
    pub fn fit_transform(&mut self, data: &ArrayView2<f64>) -> Result<Array2<f64>, TrainingError> {
        self.fit(data)?;
        self.transform(data)
    }

    pub fn inverse_transform(&self, data: &ArrayView2<f64>) -> Result<Array2<f64>, TrainingError> {
        self.check(data.ncols())?;
        let mut out = data.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let range = self.column_range(j);
            let (min, lo, span) = (self.data_min[j], self.feature_range.0, self.span());
            column.mapv_inplace(|x| (x - lo) / span * range + min);
        }
        Ok(out)
    }

    /// Inverse of a single feature column, using that column's bounds.
    #[allow(dead_code)]
    pub fn inverse_transform_column(&self, column: usize, values: &[f64]) -> Result<Vec<f64>, TrainingError> {
        if !self.fitted {
            return Err(TrainingError::ModelConfiguration(
                "scaler used before fit".to_string(),
            ));
        }
        if column >= self.n_features() {
            return Err(TrainingError::Shape(format!(
                "column {} out of range for {} features",
                column,
                self.n_features()
            )));
        }
        let range = self.column_range(column);
        let (min, lo, span) = (self.data_min[column], self.feature_range.0, self.span());
        Ok(values.iter().map(|&x| (x - lo) / span * range + min).collect())
    }
}
