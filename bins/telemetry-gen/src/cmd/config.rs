use clap::Args;
use serde::Deserialize;

use super::error::GenError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub url: Option<String>,
    pub interval: Option<u64>,
    pub count: Option<u64>,
    pub seed: Option<i64>,
    pub record_type: Option<String>,
}

pub fn load_config(path: &str) -> Result<Config, GenError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| GenError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| GenError::Config(format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct GenArgs {
    /// Путь к config.toml
    #[arg(long, default_value = "config.toml", env = "TELEMETRY_GEN_CONFIG")]
    pub config: String,

    /// Endpoint relay
    #[arg(long)]
    pub url: Option<String>,

    /// Интервал между раундами в мс
    #[arg(long)]
    pub interval: Option<u64>,

    /// Число раундов (0 = бесконечно)
    #[arg(long)]
    pub count: Option<u64>,

    /// Seed для PRNG (0 = текущее время)
    #[arg(long)]
    pub seed: Option<i64>,

    /// Слать только один тип записи (напр. weather_data)
    #[arg(long)]
    pub record_type: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация после мержа: config.toml < env/CLI
pub struct Effective {
    pub url: String,
    pub interval: u64,
    pub count: u64,
    pub seed: i64,
    pub record_type: Option<String>,
}

impl Effective {
    pub fn new(args: &GenArgs) -> Result<Self, GenError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };

        Ok(Self {
            url: args
                .url
                .clone()
                .or(cfg.url)
                .unwrap_or_else(|| "http://127.0.0.1:9100/api/simulation-data".into()),
            interval: args.interval.or(cfg.interval).unwrap_or(5000),
            count: args.count.or(cfg.count).unwrap_or(0),
            seed: args.seed.or(cfg.seed).unwrap_or(0),
            record_type: args.record_type.clone().or(cfg.record_type),
        })
    }
}
