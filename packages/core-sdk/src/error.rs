use std::path::PathBuf;

use thiserror::Error;

/**
 * \brief 建议流水线的错误分类。网关将其映射为 HTTP 状态码，客户端一律降级为本地建议。
 */
#[derive(Debug, Error)]
pub enum SuggestError {
    /** \brief 请求本身不合法（如 categoryName 为空）。 */
    #[error("{0}")]
    BadRequest(String),

    /** \brief 缺少 Provider 凭据。 */
    #[error("{0}")]
    Configuration(String),

    /** \brief 上游模型调用失败（超时、鉴权、限流等）。 */
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /** \brief 模型输出无法解析或缺少必需字段。 */
    #[error("{0}")]
    Format(String),

    /** \brief 客户端检测到字段格式错误，仅在本地修复，不向用户暴露。 */
    #[error("{0}")]
    Validation(String),
}

impl SuggestError {
    /** \brief 上游错误信息是否提及限流。 */
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SuggestError::Upstream(_))
            && self.to_string().to_ascii_lowercase().contains("rate limit")
    }

    /** \brief 上游错误信息是否提及 API key 问题。 */
    pub fn is_credential_rejected(&self) -> bool {
        matches!(self, SuggestError::Upstream(_))
            && self.to_string().to_ascii_lowercase().contains("api key")
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("provider rejected the API key (status {status})")]
    Unauthorized { status: u16 },

    #[error("no API key configured for provider")]
    MissingCredential,

    #[error("request failed: {status} -> {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned an empty completion")]
    EmptyCompletion,

    #[error("no answer within {0} ms")]
    Timeout(u64),

    #[error("request task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("flag fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("flag source answered {0}")]
    Status(u16),

    #[error("flag fetch timed out after {0} ms")]
    Timeout(u64),
}
