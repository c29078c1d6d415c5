//! Конфігурація бота: TOML-файл плюс змінні оточення.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_BOT_TOKEN_FALLBACK: &str = "TG_BOT_TOKEN";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "GEMINI_API_KEY";
pub const ENV_PORT: &str = "PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не вдалося прочитати {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("некоректний TOML у {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("змінна оточення {0} не задана")]
    MissingEnv(&'static str),
    #[error("некоректне значення {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub school_name: String,
    pub donation_url: String,
    pub schedule_path: PathBuf,
    pub elementary_schedule_path: PathBuf,
    pub bells_path: PathBuf,
    pub admins_path: PathBuf,
    pub instructions_path: PathBuf,
    /// Адміни, якими засівається admins.json, якщо файла ще немає.
    pub bootstrap_admin_ids: Vec<i64>,
    pub bootstrap_password: Option<String>,
    pub health_port: Option<u16>,
    pub shifts: ShiftsConfig,
    pub ai: AiConfig,
    pub limits: LimitsConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShiftsConfig {
    /// Класи другої зміни. Усі інші вважаються першою зміною.
    pub second_shift_classes: Vec<String>,
    /// Година, з якої без обраного класу показуються дзвінки другої зміни.
    pub second_shift_from_hour: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub api_base: String,
    pub short_max_tokens: u32,
    pub detail_max_tokens: u32,
    pub short_temperature: f32,
    pub detail_temperature: f32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_message_len: usize,
    pub broadcast_delay_ms: u64,
    pub online_window_secs: u64,
    pub min_password_len: usize,
    pub active_users_shown: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub loading_animation: bool,
    pub loading_frame_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            school_name: "12-го ліцею".to_string(),
            donation_url: "https://send.monobank.ua/jar/96YBXc4K6g".to_string(),
            schedule_path: PathBuf::from("schedule_full.json"),
            elementary_schedule_path: PathBuf::from("schedule_elementary.json"),
            bells_path: PathBuf::from("bells_schedule.json"),
            admins_path: PathBuf::from("admins.json"),
            instructions_path: PathBuf::from("instructions.json"),
            bootstrap_admin_ids: Vec::new(),
            bootstrap_password: None,
            health_port: None,
            shifts: ShiftsConfig::default(),
            ai: AiConfig::default(),
            limits: LimitsConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for ShiftsConfig {
    fn default() -> Self {
        let second_shift_classes = ["6-А", "6-Б", "6-В", "7-А", "7-Б", "7-В", "7-Г"]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            second_shift_classes,
            second_shift_from_hour: 12,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            short_max_tokens: 420,
            detail_max_tokens: 900,
            short_temperature: 0.4,
            detail_temperature: 0.35,
            request_timeout_secs: 60,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_len: 3900,
            broadcast_delay_ms: 50,
            online_window_secs: 300,
            min_password_len: 4,
            active_users_shown: 20,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            loading_animation: true,
            loading_frame_ms: 300,
        }
    }
}

impl Config {
    /// Читає конфіг з TOML. Відсутній файл означає значення за замовчуванням.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using built-in defaults"
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn bot_token(&self) -> Result<String, ConfigError> {
        env_with_fallback(ENV_BOT_TOKEN, ENV_BOT_TOKEN_FALLBACK)
            .ok_or(ConfigError::MissingEnv(ENV_BOT_TOKEN))
    }

    pub fn ai_api_key(&self) -> Result<String, ConfigError> {
        env_with_fallback(ENV_API_KEY, ENV_API_KEY_FALLBACK)
            .ok_or(ConfigError::MissingEnv(ENV_API_KEY))
    }

    /// Порт health-check: `PORT` з оточення має пріоритет над конфігом.
    pub fn health_port(&self) -> Result<Option<u16>, ConfigError> {
        match std::env::var(ENV_PORT) {
            Ok(value) if !value.trim().is_empty() => value
                .trim()
                .parse::<u16>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_PORT,
                    value,
                }),
            _ => Ok(self.health_port),
        }
    }

    pub fn online_window(&self) -> Duration {
        Duration::from_secs(self.limits.online_window_secs)
    }

    pub fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.limits.broadcast_delay_ms)
    }
}

fn env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
