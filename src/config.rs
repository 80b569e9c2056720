// projeto: lstmsensortrain
// file: src/config.rs
// Run configuration: defaults, TOML file and command-line overrides

use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::neural::scaler::ScalerFit;
use crate::neural::utils::TrainingError;

/// Four days of one-minute readings.
pub const DEFAULT_TRAIN_ROWS: usize = 4 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForecastConfig {
    pub data_path: PathBuf,
    /// Lag steps fed to the network.
    pub n_in: usize,
    /// Lead steps; the target sits at the last one.
    pub n_out: usize,
    /// Windowed rows in the training prefix.
    pub train_rows: usize,
    /// 1-based feature column to forecast; `None` means the last one.
    pub target: Option<usize>,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub clip_norm: Option<f64>,
    pub seed: Option<u64>,
    pub scaler_fit: ScalerFit,
    pub output_dir: PathBuf,
    pub show_plots: bool,
    pub report: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            data_path: PathBuf::from("sensordata.csv"),
            n_in: 5,
            n_out: 1,
            train_rows: DEFAULT_TRAIN_ROWS,
            target: None,
            hidden_size: 120,
            num_layers: 1,
            dropout: 0.2,
            epochs: 50,
            batch_size: 512,
            learning_rate: 0.001,
            clip_norm: None,
            seed: None,
            scaler_fit: ScalerFit::TrainOnly,
            output_dir: PathBuf::from("."),
            show_plots: false,
            report: false,
        }
    }
}

impl ForecastConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, TrainingError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, TrainingError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), TrainingError> {
        let fail = |msg: String| Err(TrainingError::ModelConfiguration(msg));
        if self.n_in == 0 {
            return fail("n_in must be at least 1 to feed the recurrent layer".to_string());
        }
        if self.n_out == 0 {
            return fail("n_out must be at least 1".to_string());
        }
        if self.train_rows == 0 {
            return fail("train_rows must be positive".to_string());
        }
        if self.target == Some(0) {
            return fail("target is 1-based".to_string());
        }
        if self.hidden_size == 0 || self.num_layers == 0 {
            return fail("hidden_size and num_layers must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return fail(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return fail("epochs and batch_size must be positive".to_string());
        }
        if !(self.learning_rate > 0.0) {
            return fail(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if let Some(clip) = self.clip_norm {
            if !(clip > 0.0) {
                return fail(format!("clip_norm must be positive, got {}", clip));
            }
        }
        Ok(())
    }

    /// 0-based target column for a table with `n_features` columns.
    pub fn target_index(&self, n_features: usize) -> Result<usize, TrainingError> {
        match self.target {
            None if n_features > 0 => Ok(n_features - 1),
            Some(k) if k >= 1 && k <= n_features => Ok(k - 1),
            _ => Err(TrainingError::ModelConfiguration(format!(
                "target {:?} out of range for {} features",
                self.target, n_features
            ))),
        }
    }
}

/// Command-line values that take precedence over the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// CSV com a série de sensores (primeira coluna = timestamp)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Passos de atraso usados como entrada
    #[arg(long)]
    pub n_in: Option<usize>,

    /// Passos à frente; o alvo é o último
    #[arg(long)]
    pub n_out: Option<usize>,

    /// Linhas janeladas usadas para treino
    #[arg(long)]
    pub train_rows: Option<usize>,

    /// Coluna alvo (1-based, padrão: última)
    #[arg(long)]
    pub target: Option<usize>,

    /// Neurônios da camada LSTM
    #[arg(long)]
    pub hidden_size: Option<usize>,

    /// Camadas LSTM empilhadas
    #[arg(long)]
    pub num_layers: Option<usize>,

    /// Taxa de dropout (0.0-1.0)
    #[arg(long)]
    pub dropout: Option<f64>,

    #[arg(long)]
    pub epochs: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Learning rate para Adam optimizer
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Máximo para gradient clipping (norma global)
    #[arg(long)]
    pub clip_norm: Option<f64>,

    /// Semente para pesos e dropout
    #[arg(long)]
    pub seed: Option<u64>,

    /// Ajusta o scaler em todas as linhas, não só no treino
    #[arg(long)]
    pub fit_scaler_on_full: bool,

    /// Diretório dos gráficos e relatórios
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Abre os gráficos no navegador
    #[arg(long)]
    pub show_plots: bool,

    /// Salva histórico CSV e relatório JSON
    #[arg(long)]
    pub report: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ForecastConfig) {
        if let Some(path) = &self.data {
            config.data_path = path.clone();
        }
        if let Some(v) = self.n_in {
            config.n_in = v;
        }
        if let Some(v) = self.n_out {
            config.n_out = v;
        }
        if let Some(v) = self.train_rows {
            config.train_rows = v;
        }
        if self.target.is_some() {
            config.target = self.target;
        }
        if let Some(v) = self.hidden_size {
            config.hidden_size = v;
        }
        if let Some(v) = self.num_layers {
            config.num_layers = v;
        }
        if let Some(v) = self.dropout {
            config.dropout = v;
        }
        if let Some(v) = self.epochs {
            config.epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if self.clip_norm.is_some() {
            config.clip_norm = self.clip_norm;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.fit_scaler_on_full {
            config.scaler_fit = ScalerFit::Full;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        config.show_plots |= self.show_plots;
        config.report |= self.report;
    }
}
