use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::{DeploymentMode, GatewayConfig};
use crate::error::SuggestError;
use crate::gateway::ProviderGateway;
use crate::llm::{LanguageModel, OpenAiModel};
use crate::models::{ErrorResponse, ProxyRequest};
use crate::telemetry;

/** \brief 请求体上限（64KB）。 */
pub const MAX_BODY_SIZE: usize = 65_536;

const CORS_HEADERS: [(header::HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

/**
 * \brief 所有 handler 共享的状态。
 */
pub struct AppState<M> {
    pub gateway: Arc<ProviderGateway<M>>,
    pub mode: DeploymentMode,
}

impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            mode: self.mode,
        }
    }
}

/**
 * \brief 启动网关 HTTP 服务。
 * \param addr 监听地址，如 "127.0.0.1:8787"
 */
pub async fn run(addr: &str, config: GatewayConfig) -> Result<()> {
    let gateway = ProviderGateway::new(OpenAiModel::from_config(&config), &config);
    if !gateway.is_configured() {
        tracing::warn!("OPENAI_API_KEY not configured; suggestions will answer 503");
    }
    let app = router(gateway, config.mode);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {} failed", addr))?;
    tracing::info!("gateway listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/**
 * \brief 构造路由：`/suggest` 接受 POST/OPTIONS，`/health` 与 `/suggest/health` 为探活，不限方法。
 */
pub fn router<M: LanguageModel>(gateway: ProviderGateway<M>, mode: DeploymentMode) -> Router {
    let state = AppState {
        gateway: Arc::new(gateway),
        mode,
    };
    Router::new()
        .route("/suggest", any(handle_suggest::<M>))
        .route("/suggest/health", any(handle_health::<M>))
        .route("/health", any(handle_health::<M>))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .with_state(state)
}

/**
 * \brief 建议接口：按方法分派，错误统一为 `{ error, message, details? }`。
 */
pub async fn handle_suggest<M: LanguageModel>(
    State(state): State<AppState<M>>,
    method: Method,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return (StatusCode::OK, CORS_HEADERS).into_response();
    }
    if method != Method::POST {
        return error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Only POST method is supported".to_string(),
            None,
        );
    }

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message, None),
    };

    match state.gateway.handle(&request).await {
        Ok(suggestion) => json_response(StatusCode::OK, &suggestion),
        Err(err) => {
            let status = status_for(&err);
            tracing::warn!(status = status.as_u16(), "suggestion failed: {}", err);
            telemetry::log_error("server.suggest", &format!("status={} {}", status, err));
            let details = state.mode.is_development().then(|| format!("{:?}", err));
            error_response(status, err.to_string(), details)
        }
    }
}

/**
 * \brief 健康检查：报告凭据状态，不调用模型。
 */
pub async fn handle_health<M: LanguageModel>(State(state): State<AppState<M>>) -> Response {
    json_response(StatusCode::OK, &state.gateway.health())
}

fn parse_request(body: &[u8]) -> Result<ProxyRequest, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err("Missing request body".to_string());
    }
    serde_json::from_slice(body).map_err(|e| format!("Invalid request body: {}", e))
}

/**
 * \brief 错误到状态码的映射；上游错误按消息内容区分限流与凭据问题。
 */
pub fn status_for(err: &SuggestError) -> StatusCode {
    match err {
        SuggestError::BadRequest(_) | SuggestError::Format(_) => StatusCode::BAD_REQUEST,
        SuggestError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        SuggestError::Upstream(_) if err.is_rate_limited() => StatusCode::TOO_MANY_REQUESTS,
        SuggestError::Upstream(_) if err.is_credential_rejected() => StatusCode::SERVICE_UNAVAILABLE,
        SuggestError::Upstream(_) | SuggestError::Validation(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (status, CORS_HEADERS, Json(body)).into_response()
}

fn error_response(status: StatusCode, message: String, details: Option<String>) -> Response {
    let body = ErrorResponse {
        error: status
            .canonical_reason()
            .unwrap_or("Internal Server Error")
            .to_string(),
        message,
        details,
    };
    json_response(status, &body)
}
