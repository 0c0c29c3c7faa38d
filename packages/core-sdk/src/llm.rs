use std::future::Future;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::GatewayConfig;
use crate::error::UpstreamError;
use crate::models::Message;

/**
 * \brief 单次补全请求参数。
 */
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /** \brief 不带 provider 前缀的模型名 */
    pub model: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f64,
}

/**
 * \brief 语言模型接缝：网关只依赖此 trait，测试可替换为计数实现。
 */
pub trait LanguageModel: Send + Sync + 'static {
    /** \brief 是否已配置凭据；健康检查依赖它，且不得发起调用。 */
    fn is_configured(&self) -> bool;

    /** \brief 发起一次补全，返回原始文本。 */
    fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> impl Future<Output = Result<String, UpstreamError>> + Send;
}

/**
 * \brief OpenAI Chat Completions 实现。
 */
#[derive(Debug, Clone)]
pub struct OpenAiModel {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl OpenAiModel {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.api_base(), config.api_key.clone())
    }
}

impl LanguageModel for OpenAiModel {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)?;
        let url = format!(
            "{}/v1/chat/completions",
            self.api_base.trim_end_matches('/')
        );
        let body = json!({
            "model": request.model,
            "messages": [Message::user(request.prompt)],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": false
        });

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status, text));
        }
        let v: Value = resp.json().await?;
        let content = extract_openai_content(&v);
        if content.trim().is_empty() {
            return Err(UpstreamError::EmptyCompletion);
        }
        Ok(content)
    }
}

fn classify_failure(status: StatusCode, body: String) -> UpstreamError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::Unauthorized {
            status: status.as_u16(),
        },
        _ => UpstreamError::Rejected {
            status: status.as_u16(),
            body,
        },
    }
}

fn extract_openai_content(v: &Value) -> String {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string()
}
