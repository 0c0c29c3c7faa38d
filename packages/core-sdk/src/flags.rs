use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use crate::config::FlagsConfig;
use crate::error::FlagError;

/** \brief 是否启用 AI 建议。 */
pub const AI_SUGGESTIONS_ENABLED: &str = "ai_suggestions_enabled";
/** \brief AI 建议使用的模型；`mock` 表示不覆盖。 */
pub const AI_SUGGESTIONS_MODEL: &str = "ai_suggestions_model";

pub const MOCK_MODEL: &str = "mock";

/**
 * \brief 开关值：布尔、数值或字符串。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FlagValue {
    pub fn as_bool(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Number(n) => *n != 0.0,
            FlagValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            ),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            FlagValue::Bool(b) => b.to_string(),
            FlagValue::Number(n) => n.to_string(),
            FlagValue::Text(s) => s.clone(),
        }
    }
}

/**
 * \brief 内置默认值，远程值缺失时使用。
 */
pub fn default_flags() -> HashMap<String, FlagValue> {
    HashMap::from([
        (AI_SUGGESTIONS_ENABLED.to_string(), FlagValue::Bool(true)),
        (
            AI_SUGGESTIONS_MODEL.to_string(),
            FlagValue::Text(MOCK_MODEL.to_string()),
        ),
    ])
}

/**
 * \brief 功能开关接缝，由 `CategoryStyler` 以 `Arc<dyn FeatureGate>` 持有。
 */
pub trait FeatureGate: Send + Sync {
    fn is_enabled(&self, key: &str) -> bool;

    /** \brief 未知键返回空串。 */
    fn get_string(&self, key: &str) -> String;

    /** \brief 按需刷新；失败时保留旧值。 */
    fn refresh(&self) -> BoxFuture<'_, Result<(), FlagError>>;
}

/**
 * \brief 静态开关：默认值叠加配置文件中的值。
 */
#[derive(Debug, Clone)]
pub struct StaticFlags {
    values: HashMap<String, FlagValue>,
}

impl Default for StaticFlags {
    fn default() -> Self {
        Self {
            values: default_flags(),
        }
    }
}

impl StaticFlags {
    pub fn new(overrides: HashMap<String, FlagValue>) -> Self {
        let mut values = default_flags();
        values.extend(overrides);
        Self { values }
    }

    pub fn with(mut self, key: &str, value: FlagValue) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
}

impl FeatureGate for StaticFlags {
    fn is_enabled(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(FlagValue::as_bool)
    }

    fn get_string(&self, key: &str) -> String {
        self.values
            .get(key)
            .map(FlagValue::as_string)
            .unwrap_or_default()
    }

    fn refresh(&self) -> BoxFuture<'_, Result<(), FlagError>> {
        async { Ok(()) }.boxed()
    }
}

#[derive(Debug)]
struct Snapshot {
    values: HashMap<String, FlagValue>,
    fetched_at: Option<Instant>,
}

/**
 * \brief 远程开关：从 JSON 端点拉取扁平的 `{key: value}`，最短间隔内不重复拉取。
 */
#[derive(Debug)]
pub struct RemoteFlags {
    http: reqwest::Client,
    url: String,
    min_fetch_interval: Duration,
    fetch_timeout: Duration,
    snapshot: RwLock<Snapshot>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl RemoteFlags {
    pub fn new(url: impl Into<String>, config: &FlagsConfig) -> Self {
        let mut values = default_flags();
        values.extend(config.values.clone());
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            min_fetch_interval: config.min_fetch_interval(),
            fetch_timeout: config.fetch_timeout(),
            snapshot: RwLock::new(Snapshot {
                values,
                fetched_at: None,
            }),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn is_fresh(&self) -> bool {
        self.snapshot
            .read()
            .ok()
            .and_then(|s| s.fetched_at)
            .is_some_and(|at| at.elapsed() < self.min_fetch_interval)
    }

    fn lookup(&self, key: &str) -> Option<FlagValue> {
        self.snapshot
            .read()
            .ok()
            .and_then(|s| s.values.get(key).cloned())
    }

    /**
     * \brief 忽略最短间隔立即拉取。
     */
    pub async fn force_refresh(&self) -> Result<(), FlagError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store().await
    }

    async fn fetch_and_store(&self) -> Result<(), FlagError> {
        let fetched = match tokio::time::timeout(self.fetch_timeout, self.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FlagError::Timeout(self.fetch_timeout.as_millis() as u64)),
        };
        match fetched {
            Ok(remote) => {
                if let Ok(mut snapshot) = self.snapshot.write() {
                    snapshot.values.extend(remote);
                    snapshot.fetched_at = Some(Instant::now());
                }
                tracing::debug!(url = %self.url, "feature flags refreshed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!("feature flag refresh failed, keeping previous values: {}", err);
                Err(err)
            }
        }
    }

    async fn fetch(&self) -> Result<HashMap<String, FlagValue>, FlagError> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FlagError::Status(status.as_u16()));
        }
        Ok(resp.json::<HashMap<String, FlagValue>>().await?)
    }
}

impl FeatureGate for RemoteFlags {
    fn is_enabled(&self, key: &str) -> bool {
        self.lookup(key).is_some_and(|v| v.as_bool())
    }

    fn get_string(&self, key: &str) -> String {
        self.lookup(key)
            .map(|v| v.as_string())
            .unwrap_or_default()
    }

    fn refresh(&self) -> BoxFuture<'_, Result<(), FlagError>> {
        async move {
            if self.is_fresh() {
                return Ok(());
            }
            let _guard = self.refresh_lock.lock().await;
            // 等锁期间其他调用可能已完成拉取
            if self.is_fresh() {
                return Ok(());
            }
            self.fetch_and_store().await
        }
        .boxed()
    }
}
