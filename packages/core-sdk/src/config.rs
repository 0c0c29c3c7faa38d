use std::{collections::HashMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::flags::FlagValue;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_FLAG_FETCH_INTERVAL_SECS: u64 = 3_600;
pub const DEFAULT_FLAG_FETCH_TIMEOUT_MS: u64 = 60_000;

/**
 * \brief 部署模式；开发模式下错误响应附带 details。
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Development,
    #[default]
    Production,
}

impl DeploymentMode {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => DeploymentMode::Development,
            _ => DeploymentMode::Production,
        }
    }

    pub fn is_development(self) -> bool {
        self == DeploymentMode::Development
    }
}

/**
 * \brief 提示词中要求的图标命名方式：纯名称或带 `-outline` 后缀。
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconStyle {
    Plain,
    #[default]
    Outline,
}

impl IconStyle {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(IconStyle::Plain),
            "outline" => Ok(IconStyle::Outline),
            other => Err(ConfigError::Invalid {
                key: "TAREAS_ICON_STYLE".into(),
                value: other.into(),
            }),
        }
    }
}

/**
 * \brief 网关配置：凭据、模型、部署模式。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /** \brief OpenAI API Key；缺失时网关返回 503 */
    pub api_key: Option<String>,
    /** \brief API 基地址，默认官方地址 */
    pub api_base: Option<String>,
    /** \brief 默认模型标识 */
    pub default_model: Option<String>,
    pub mode: DeploymentMode,
    pub icon_style: IconStyle,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(env_lookup)?;
        Ok(config)
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_OPENAI_BASE)
    }

    pub fn default_model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.api_base = Some(base);
        }
        if let Some(model) = lookup("DEFAULT_AI_MODEL") {
            self.default_model = Some(model);
        }
        if let Some(mode) = lookup("TAREAS_ENV").or_else(|| lookup("NODE_ENV")) {
            self.mode = DeploymentMode::parse(&mode);
        }
        if let Some(style) = lookup("TAREAS_ICON_STYLE") {
            self.icon_style = IconStyle::parse(&style)?;
        }
        Ok(())
    }
}

/**
 * \brief 客户端配置：网关地址缺失即进入纯本地模式。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /** \brief 网关 URL，例如 `https://.../suggest` */
    pub endpoint: Option<String>,
    /** \brief 超时（毫秒） */
    pub timeout_ms: u64,
    /** \brief 强制使用本地建议 */
    pub use_mock: bool,
    /** \brief 请求时附带的模型标识 */
    pub model: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            use_mock: false,
            model: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(env_lookup)?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AI_PROXY_URL") {
            self.endpoint = Some(url);
        }
        if let Some(raw) = lookup("AI_PROXY_TIMEOUT_MS") {
            self.timeout_ms = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "AI_PROXY_TIMEOUT_MS".into(),
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("AI_USE_MOCK") {
            self.use_mock = parse_bool("AI_USE_MOCK", &raw)?;
        }
        if let Some(model) = lookup("AI_MODEL") {
            self.model = Some(model);
        }
        Ok(())
    }
}

/**
 * \brief 功能开关配置：远程地址或静态值。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagsConfig {
    pub url: Option<String>,
    pub min_fetch_interval_secs: u64,
    pub fetch_timeout_ms: u64,
    pub values: HashMap<String, FlagValue>,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            url: None,
            min_fetch_interval_secs: DEFAULT_FLAG_FETCH_INTERVAL_SECS,
            fetch_timeout_ms: DEFAULT_FLAG_FETCH_TIMEOUT_MS,
            values: HashMap::new(),
        }
    }
}

impl FlagsConfig {
    pub fn min_fetch_interval(&self) -> Duration {
        Duration::from_secs(self.min_fetch_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TAREAS_FLAGS_URL") {
            self.url = Some(url);
        }
        Ok(())
    }
}

/**
 * \brief 完整配置文件（TOML），每个段落都可省略；环境变量覆盖文件值。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub gateway: GatewayConfig,
    pub flags: FlagsConfig,
}

impl AppConfig {
    /**
     * \brief 读取可选配置文件，再叠加进程环境变量。
     */
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, env_lookup)
    }

    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&raw)?
            }
            None => AppConfig::default(),
        };
        config.client.apply_env(&lookup)?;
        config.gateway.apply_env(&lookup)?;
        config.flags.apply_env(&lookup)?;
        Ok(config)
    }
}

/** \brief 读取环境变量，空串视为未设置。 */
fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.into(),
            value: raw.into(),
        }),
    }
}
