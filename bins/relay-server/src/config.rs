use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "relay-server", about = "Relay телеметрии симуляции")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "CONFIG_PATH")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_api_port() -> u16 {
    9100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
        }
    }
}

impl ServerConfig {
    /// Загрузить конфиг. Отсутствующий файл — не ошибка:
    /// сервер поднимается на дефолтах.
    pub fn load(path: &str) -> Result<Self, crate::error::ServerError> {
        if !std::path::Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::ServerError::Config {
                context: "read",
                detail: format!("'{path}': {e}"),
            }
        })?;
        toml::from_str(&content).map_err(|e| crate::error::ServerError::Config {
            context: "parse",
            detail: format!("'{path}': {e}"),
        })
    }
}
