// projeto: lstmsensortrain
// file: src/main.rs
// Sistema de previsão de séries de sensores com redes LSTM

mod config;
mod neural;
mod pipeline;

use chrono::Utc;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{ConfigOverrides, ForecastConfig};
use crate::neural::utils::TrainingError;
use crate::pipeline::run_forecast;

#[derive(Parser, Debug)]
#[command(
    name = "lstm-forecast",
    version = "0.1.0",
    about = "Treina uma rede LSTM para prever uma variável de sensor a partir de uma série multivariada",
    long_about = "Lê um CSV de sensores, normaliza, monta janelas supervisionadas (lags), treina uma LSTM com Adam sobre o erro absoluto médio e avalia RMSE/MAPE no trecho de teste."
)]
struct Cli {
    /// Arquivo TOML de configuração (valores da linha de comando prevalecem)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Modo verboso de logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<(), TrainingError> {
    let cli = Cli::parse();

    // Configurar logging
    setup_logging(cli.verbose);

    let start_time = Instant::now();
    info!("🚀 Sistema de previsão LSTM iniciado");
    info!("🕐 Iniciado em: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuração inválida: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "📊 Dados: {} | Lags: {} | Hidden: {} | Camadas: {} | Épocas: {}",
        config.data_path.display(),
        config.n_in,
        config.hidden_size,
        config.num_layers,
        config.epochs
    );

    match run_forecast(&config) {
        Ok(outcome) => {
            println!("Test RMSE: {:.3}", outcome.metrics.rmse);
            println!("Test mape: {}", outcome.metrics.mape.trunc() as i64);
            info!(
                "✅ Treinamento concluído com sucesso em {:.2}s",
                start_time.elapsed().as_secs_f64()
            );
            info!("🏁 Finalizado em: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        }
        Err(e) => {
            error!("❌ Erro durante treinamento: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ForecastConfig, TrainingError> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("🔧 Lendo configuração de {}", path.display());
            ForecastConfig::from_toml_file(path)?
        }
        None => ForecastConfig::default(),
    };
    cli.overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .init();
}
