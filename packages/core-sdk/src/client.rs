use reqwest::StatusCode;

use crate::config::ClientConfig;
use crate::error::{SuggestError, UpstreamError};
use crate::gateway::REPORTED_CONFIDENCE;
use crate::models::{
    HealthReport, ProxyRequest, ProxyResponse, StyleSuggestion, SuggestionSource,
};
use crate::palette;
use crate::resolver::DeterministicStyleResolver;
use crate::telemetry;

/**
 * \brief 前端侧建议客户端：调用网关、超时降级、校验并修复结果。对调用方永不失败。
 */
#[derive(Debug, Clone)]
pub struct SuggestionClient {
    http: reqwest::Client,
    config: ClientConfig,
    resolver: DeterministicStyleResolver,
}

impl SuggestionClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: ClientConfig) -> Self {
        match (&config.endpoint, config.use_mock) {
            (Some(endpoint), false) => {
                tracing::info!(endpoint = %endpoint, timeout_ms = config.timeout_ms, "suggestion gateway configured")
            }
            (Some(_), true) => tracing::info!("suggestion gateway configured but mock mode is on"),
            (None, _) => tracing::info!("no suggestion gateway configured, using local suggestions"),
        }
        Self {
            http,
            config,
            resolver: DeterministicStyleResolver,
        }
    }

    /** \brief 是否会真正调用网关。 */
    pub fn is_configured(&self) -> bool {
        self.config.endpoint.is_some() && !self.config.use_mock
    }

    pub fn provider_name(&self) -> &'static str {
        if self.is_configured() {
            "gateway"
        } else {
            "local"
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /**
     * \brief 使用配置中的模型标识请求建议。
     */
    pub async fn suggest_category_style(&self, category_name: &str) -> StyleSuggestion {
        self.suggest_with_model(category_name, self.config.model.as_deref())
            .await
    }

    /**
     * \brief 请求建议；任何失败（网络、超时、解析）都降级为本地确定性建议。
     */
    pub async fn suggest_with_model(
        &self,
        category_name: &str,
        model: Option<&str>,
    ) -> StyleSuggestion {
        let endpoint = match (&self.config.endpoint, self.config.use_mock) {
            (Some(endpoint), false) => endpoint.clone(),
            _ => {
                tracing::debug!("using local suggestion");
                return self.resolver.resolve(category_name);
            }
        };

        let suggestion = match self.request_remote(&endpoint, category_name, model).await {
            Ok(suggestion) => suggestion,
            Err(err) => {
                tracing::warn!("suggestion gateway failed, falling back to local: {}", err);
                telemetry::log_error("client.suggest", &format!("fallback: {}", err));
                self.resolver.resolve(category_name)
            }
        };
        telemetry::record_suggestion("client.suggest", &suggestion);
        suggestion
    }

    /**
     * \brief 探测网关健康状态（`<endpoint>/health`），同样受超时限制。
     */
    pub async fn health(&self) -> Result<HealthReport, SuggestError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or_else(|| SuggestError::Configuration("no gateway endpoint configured".into()))?;
        let url = format!("{}/health", endpoint.trim_end_matches('/'));
        let resp = tokio::time::timeout(self.config.timeout(), self.http.get(url).send())
            .await
            .map_err(|_| UpstreamError::Timeout(self.config.timeout_ms))?
            .map_err(UpstreamError::from)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(resp.json::<HealthReport>().await.map_err(UpstreamError::from)?)
    }

    /**
     * \brief 网关调用在独立任务中执行，超时后放弃而不取消；迟到的结果被丢弃。
     */
    async fn request_remote(
        &self,
        endpoint: &str,
        category_name: &str,
        model: Option<&str>,
    ) -> Result<StyleSuggestion, SuggestError> {
        let request = ProxyRequest {
            category_name: category_name.trim().to_string(),
            model: model.map(str::to_string),
        };
        let http = self.http.clone();
        let url = endpoint.to_string();
        let call = tokio::spawn(async move { call_gateway(&http, &url, &request).await });

        let response = match tokio::time::timeout(self.config.timeout(), call).await {
            Err(_) => return Err(UpstreamError::Timeout(self.config.timeout_ms).into()),
            Ok(Err(join_err)) => return Err(UpstreamError::Aborted(join_err.to_string()).into()),
            Ok(Ok(result)) => result?,
        };
        self.repair(category_name, response)
    }

    /**
     * \brief 修复网关响应：颜色无效时取预设颜色，图标为空时取词表图标；背景色始终重新推导。
     */
    fn repair(
        &self,
        category_name: &str,
        response: ProxyResponse,
    ) -> Result<StyleSuggestion, SuggestError> {
        let mut source = SuggestionSource::Gateway;

        let icon = if response.icon.trim().is_empty() {
            source = SuggestionSource::Repaired;
            self.resolver.fallback_icon(category_name).to_string()
        } else {
            response.icon
        };

        let color = if palette::is_hex_color(&response.color) {
            response.color
        } else {
            tracing::warn!(color = %response.color, "gateway returned an invalid color, using preset");
            source = SuggestionSource::Repaired;
            self.resolver.fallback_color(category_name)
        };

        let provider = response.provider.as_deref().unwrap_or("AI");
        let confidence = response.confidence.unwrap_or(REPORTED_CONFIDENCE);
        let reasoning = format!(
            "Suggested by {} with {}% confidence",
            provider,
            (confidence * 100.0).round() as i64
        );
        StyleSuggestion::from_color(icon, color, Some(reasoning), source)
    }
}

async fn call_gateway(
    http: &reqwest::Client,
    url: &str,
    request: &ProxyRequest,
) -> Result<ProxyResponse, SuggestError> {
    let resp = http.post(url).json(request).send().await.map_err(UpstreamError::from)?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let err = if status == StatusCode::TOO_MANY_REQUESTS {
            UpstreamError::RateLimited(body)
        } else {
            UpstreamError::Rejected {
                status: status.as_u16(),
                body,
            }
        };
        return Err(err.into());
    }
    Ok(resp.json::<ProxyResponse>().await.map_err(UpstreamError::from)?)
}
