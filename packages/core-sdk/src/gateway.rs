use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::config::{GatewayConfig, IconStyle};
use crate::error::SuggestError;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::{HealthReport, HealthStatus, ModelIdentifier, ProxyRequest, ProxyResponse};
use crate::telemetry;

/** \brief 模型不提供校准后的置信度，统一报告该常数。 */
pub const REPORTED_CONFIDENCE: f64 = 0.95;
pub const MAX_OUTPUT_TOKENS: u32 = 150;
pub const SAMPLING_TEMPERATURE: f64 = 0.7;
/** \brief 健康检查中报告的 provider。 */
pub const GATEWAY_PROVIDER: &str = "openai";

pub const EMPTY_NAME_MESSAGE: &str = "categoryName is required and cannot be empty";
pub const MISSING_KEY_MESSAGE: &str = "OPENAI_API_KEY not configured";

/**
 * \brief Provider 网关：组装提示词、调用模型一次、严格解析输出。不保存请求间状态。
 */
#[derive(Debug)]
pub struct ProviderGateway<M> {
    model: M,
    default_model: String,
    icon_style: IconStyle,
}

impl<M: LanguageModel> ProviderGateway<M> {
    pub fn new(model: M, config: &GatewayConfig) -> Self {
        Self {
            model,
            default_model: config.default_model().to_string(),
            icon_style: config.icon_style,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_configured()
    }

    #[cfg(test)]
    pub(crate) fn model(&self) -> &M {
        &self.model
    }

    /**
     * \brief HTTP 入口：先校验名称，再检查凭据，最后按请求或默认模型调用。
     */
    pub async fn handle(&self, request: &ProxyRequest) -> Result<ProxyResponse, SuggestError> {
        let name = validate_name(&request.category_name)?;
        let model_identifier = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str());
        self.suggest(name, model_identifier).await
    }

    /**
     * \brief 为分类名称生成图标与颜色；每次恰好一次模型调用，不重试。
     */
    pub async fn suggest(
        &self,
        category_name: &str,
        model_identifier: &str,
    ) -> Result<ProxyResponse, SuggestError> {
        let name = validate_name(category_name)?;
        if !self.model.is_configured() {
            return Err(SuggestError::Configuration(MISSING_KEY_MESSAGE.to_string()));
        }

        let identifier = ModelIdentifier::parse(model_identifier);
        let prompt = build_prompt(name, self.icon_style);
        tracing::info!(
            provider = %identifier.provider,
            model = %identifier.model,
            "generating category style suggestion"
        );

        let text = self
            .model
            .complete(CompletionRequest {
                model: &identifier.model,
                prompt: &prompt,
                max_tokens: MAX_OUTPUT_TOKENS,
                temperature: SAMPLING_TEMPERATURE,
            })
            .await
            .inspect_err(|e| {
                telemetry::log_error("gateway.suggest", &format!("upstream failed: {}", e));
            })?;

        let (icon, color) = parse_model_output(&text).inspect_err(|e| {
            tracing::warn!("unusable model output: {}", e);
            telemetry::log_error("gateway.suggest", &format!("format error: {}", e));
        })?;

        telemetry::log_event(
            "gateway.suggest",
            &format!("provider={} model={} icon={}", identifier.provider, identifier.model, icon),
        );
        Ok(ProxyResponse {
            icon,
            color,
            confidence: Some(REPORTED_CONFIDENCE),
            provider: Some(identifier.provider),
        })
    }

    /**
     * \brief 健康检查：仅报告凭据是否存在，绝不调用模型。
     */
    pub fn health(&self) -> HealthReport {
        let configured = self.model.is_configured();
        HealthReport {
            status: if configured {
                HealthStatus::Healthy
            } else {
                HealthStatus::NotConfigured
            },
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            provider: GATEWAY_PROVIDER.to_string(),
            configured,
            default_model: self.default_model.clone(),
        }
    }
}

fn validate_name(category_name: &str) -> Result<&str, SuggestError> {
    let name = category_name.trim();
    if name.is_empty() {
        return Err(SuggestError::BadRequest(EMPTY_NAME_MESSAGE.to_string()));
    }
    Ok(name)
}

/**
 * \brief 固定提示词模板，名称原样嵌入。
 */
pub fn build_prompt(category_name: &str, icon_style: IconStyle) -> String {
    let (naming_rule, examples) = match icon_style {
        IconStyle::Plain => (
            "The icon MUST be a valid Ionicons 7.x name without the \"ion-\" prefix and without the \"-outline\" suffix",
            "home, briefcase, fitness, restaurant, book, airplane, cart, medical, musical-notes, game-controller, school, wallet, heart, star, trophy",
        ),
        IconStyle::Outline => (
            "The icon MUST be a valid Ionicons 7.x name without the \"ion-\" prefix and ending with the \"-outline\" suffix",
            "home-outline, briefcase-outline, fitness-outline, restaurant-outline, book-outline, airplane-outline, cart-outline, medkit-outline, musical-notes-outline, game-controller-outline, school-outline, wallet-outline, heart-outline, star-outline, trophy-outline",
        ),
    };
    format!(
        r##"Suggest an Ionicons icon and a color for a task category named "{category_name}".

IMPORTANT RULES:
1. {naming_rule}
2. The color MUST be hexadecimal in the form #RRGGBB
3. Reply ONLY with JSON, no markdown and no explanations

Response format:
{{
  "icon": "icon-name",
  "color": "#hexcolor"
}}

Valid icon examples: {examples}

Reply ONLY with the JSON:"##
    )
}

/**
 * \brief 贪婪匹配：从第一个 `{` 到最后一个 `}`。
 */
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/**
 * \brief 解析模型文本，要求 icon 与 color 均为非空字符串。颜色格式由客户端负责校验。
 */
pub fn parse_model_output(text: &str) -> Result<(String, String), SuggestError> {
    let fragment = extract_json_object(text)
        .ok_or_else(|| SuggestError::Format("Invalid AI response format".to_string()))?;
    let value: Value = serde_json::from_str(fragment)
        .map_err(|e| SuggestError::Format(format!("Invalid AI response JSON: {}", e)))?;
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    match (field("icon"), field("color")) {
        (Some(icon), Some(color)) => Ok((icon, color)),
        _ => Err(SuggestError::Format(
            "Missing icon or color in AI response".to_string(),
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /** \brief 可编程的假模型，记录调用次数与最后一次请求。 */
    #[derive(Debug)]
    pub(crate) struct ScriptedModel {
        pub configured: bool,
        pub reply: Mutex<Result<String, String>>,
        pub calls: Arc<AtomicUsize>,
        pub last_model: Mutex<Option<String>>,
        pub last_prompt: Mutex<Option<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn replying(text: &str) -> Self {
            Self {
                configured: true,
                reply: Mutex::new(Ok(text.to_string())),
                calls: Arc::new(AtomicUsize::new(0)),
                last_model: Mutex::new(None),
                last_prompt: Mutex::new(None),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            let model = Self::replying("");
            *model.reply.lock().unwrap() = Err(message.to_string());
            model
        }

        pub(crate) fn unconfigured() -> Self {
            Self {
                configured: false,
                ..Self::replying("")
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LanguageModel for ScriptedModel {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_model.lock().unwrap() = Some(request.model.to_string());
            *self.last_prompt.lock().unwrap() = Some(request.prompt.to_string());
            assert_eq!(request.max_tokens, MAX_OUTPUT_TOKENS);
            assert_eq!(request.temperature, SAMPLING_TEMPERATURE);
            self.reply
                .lock()
                .unwrap()
                .clone()
                .map_err(UpstreamError::RateLimited)
        }
    }

    fn gateway(model: ScriptedModel) -> ProviderGateway<ScriptedModel> {
        ProviderGateway::new(model, &GatewayConfig::default())
    }

    #[test]
    fn extract_is_greedy_between_first_and_last_brace() {
        let text = "Sure! ```json\n{\"icon\": \"home\", \"color\": \"#007AFF\"}\n``` hope {it} helps";
        assert_eq!(
            extract_json_object(text),
            Some("{\"icon\": \"home\", \"color\": \"#007AFF\"}\n``` hope {it}")
        );
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn parse_accepts_json_wrapped_in_prose() {
        let (icon, color) =
            parse_model_output("Here you go:\n{\"icon\": \"cart-outline\", \"color\": \"#FF9500\"}")
                .unwrap();
        assert_eq!(icon, "cart-outline");
        assert_eq!(color, "#FF9500");
    }

    #[test]
    fn parse_keeps_color_unvalidated() {
        let (_, color) = parse_model_output("{\"icon\": \"home\", \"color\": \"blue\"}").unwrap();
        assert_eq!(color, "blue");
    }

    #[test]
    fn parse_rejects_missing_or_empty_fields() {
        for text in [
            "{\"icon\": \"home\"}",
            "{\"color\": \"#000000\"}",
            "{\"icon\": \"\", \"color\": \"#000000\"}",
            "{\"icon\": 3, \"color\": \"#000000\"}",
        ] {
            assert!(
                matches!(parse_model_output(text), Err(SuggestError::Format(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(matches!(
            parse_model_output("I cannot help with that."),
            Err(SuggestError::Format(ref m)) if m == "Invalid AI response format"
        ));
        assert!(matches!(
            parse_model_output("{icon: home}"),
            Err(SuggestError::Format(_))
        ));
    }

    #[test]
    fn prompt_embeds_name_and_naming_convention() {
        let outline = build_prompt("Gimnasio", IconStyle::Outline);
        assert!(outline.contains("named \"Gimnasio\""));
        assert!(outline.contains("ending with the \"-outline\" suffix"));
        assert!(outline.contains("#RRGGBB"));

        let plain = build_prompt("Casa", IconStyle::Plain);
        assert!(plain.contains("without the \"-outline\" suffix"));
        assert!(plain.contains("Reply ONLY with the JSON:"));
    }

    #[tokio::test]
    async fn suggest_attaches_confidence_and_provider() {
        let gw = gateway(ScriptedModel::replying(
            "{\"icon\": \"fitness-outline\", \"color\": \"#10B981\"}",
        ));
        let resp = gw.suggest("  Gimnasio ", "openai/gpt-4o-mini").await.unwrap();
        assert_eq!(resp.icon, "fitness-outline");
        assert_eq!(resp.color, "#10B981");
        assert_eq!(resp.confidence, Some(REPORTED_CONFIDENCE));
        assert_eq!(resp.provider.as_deref(), Some("openai"));
        assert_eq!(gw.model.calls(), 1);
        assert_eq!(gw.model.last_model.lock().unwrap().as_deref(), Some("gpt-4o-mini"));
        let prompt = gw.model.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("named \"Gimnasio\""));
    }

    #[tokio::test]
    async fn bare_model_name_is_passed_unchanged() {
        let gw = gateway(ScriptedModel::replying("{\"icon\": \"a\", \"color\": \"b\"}"));
        let resp = gw.suggest("Casa", "gpt-3.5-turbo").await.unwrap();
        assert_eq!(gw.model.last_model.lock().unwrap().as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(resp.provider.as_deref(), Some("openai"));
    }

    #[tokio::test]
    async fn handle_uses_default_model_when_request_has_none() {
        let gw = gateway(ScriptedModel::replying("{\"icon\": \"a\", \"color\": \"b\"}"));
        gw.handle(&ProxyRequest {
            category_name: "Casa".into(),
            model: Some("  ".into()),
        })
        .await
        .unwrap();
        assert_eq!(gw.model.last_model.lock().unwrap().as_deref(), Some("gpt-3.5-turbo"));
    }

    #[tokio::test]
    async fn empty_name_is_rejected_before_invocation() {
        let gw = gateway(ScriptedModel::replying("{}"));
        let err = gw.suggest("   ", "gpt-3.5-turbo").await.unwrap_err();
        assert!(matches!(err, SuggestError::BadRequest(ref m) if m == EMPTY_NAME_MESSAGE));
        assert_eq!(gw.model.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credential_is_configuration_error() {
        let gw = gateway(ScriptedModel::unconfigured());
        let err = gw.suggest("Casa", "gpt-3.5-turbo").await.unwrap_err();
        assert!(matches!(err, SuggestError::Configuration(ref m) if m == MISSING_KEY_MESSAGE));
        assert_eq!(gw.model.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_is_not_retried() {
        let gw = gateway(ScriptedModel::failing("too many requests"));
        let err = gw.suggest("Casa", "gpt-3.5-turbo").await.unwrap_err();
        assert!(matches!(err, SuggestError::Upstream(_)));
        assert!(err.is_rate_limited());
        assert_eq!(gw.model.calls(), 1);
    }

    #[tokio::test]
    async fn unparseable_output_is_format_error() {
        let gw = gateway(ScriptedModel::replying("I like blue"));
        let err = gw.suggest("Casa", "gpt-3.5-turbo").await.unwrap_err();
        assert!(matches!(err, SuggestError::Format(_)));
    }

    #[test]
    fn health_reports_without_invoking_model() {
        let gw = gateway(ScriptedModel::unconfigured());
        let report = gw.health();
        assert_eq!(report.status, HealthStatus::NotConfigured);
        assert!(!report.configured);
        assert_eq!(report.provider, "openai");
        assert_eq!(report.default_model, "gpt-3.5-turbo");
        assert!(OffsetDateTime::parse(&report.timestamp, &Rfc3339).is_ok());
        assert_eq!(gw.model.calls(), 0);

        let gw = gateway(ScriptedModel::replying(""));
        assert_eq!(gw.health().status, HealthStatus::Healthy);
    }
}
