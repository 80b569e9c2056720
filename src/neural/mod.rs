// projeto: lstmsensortrain
// file: src/neural/mod.rs
// Module declarations for the sensor forecasting system

pub mod utils;    // Error handling, Adam optimizer, activations
pub mod data;     // CSV loading, splitting and sequence building
pub mod scaler;   // Min-max normalisation
pub mod window;   // Lag/lead reframing of the series
pub mod model;    // LSTM regressor with backpropagation through time
pub mod metrics;  // Error metrics, history and target inversion
pub mod plot;     // plotly charts
pub mod storage;  // History CSV and JSON report

pub use data::{SensorTable, WindowedDataset};
pub use metrics::{RegressionMetrics, TrainingHistory};
pub use model::LstmRegressor;
pub use scaler::{MinMaxScaler, ScalerFit};
pub use utils::{AdamOptimizer, TrainingError};
pub use window::{series_to_supervised, SupervisedFrame};
