use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::SuggestError;
use crate::palette::{self, ColorPreset};

/** \brief 未指定 provider 前缀时使用的 provider 标签。 */
pub const DEFAULT_PROVIDER: &str = "openai";

/**
 * \brief 建议来源，仅用于日志与测试断言，不参与序列化。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    /** \brief 网关返回且字段有效 */
    Gateway,
    /** \brief 网关返回但经过本地修复 */
    Repaired,
    /** \brief 本地确定性规则 */
    Local,
}

/**
 * \brief 分类样式建议。backgroundColor 只能由 color 推导，因此字段私有、仅通过构造函数创建。
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSuggestion {
    icon: String,
    color: String,
    background_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<String>,
    #[serde(skip)]
    source: SuggestionSource,
}

impl StyleSuggestion {
    /**
     * \brief 以任意颜色构造；颜色不合法时返回 Validation 错误。
     */
    pub fn from_color(
        icon: impl Into<String>,
        color: impl Into<String>,
        reasoning: Option<String>,
        source: SuggestionSource,
    ) -> Result<Self, SuggestError> {
        let color = color.into();
        let background_color = palette::lighten(&color)?;
        Ok(Self {
            icon: icon.into(),
            color,
            background_color,
            reasoning,
            source,
        })
    }

    /** \brief 以预设颜色构造，不会失败。 */
    pub fn from_preset(icon: impl Into<String>, preset: &ColorPreset, reasoning: String) -> Self {
        Self {
            icon: icon.into(),
            color: preset.color(),
            background_color: preset.background(),
            reasoning: Some(reasoning),
            source: SuggestionSource::Local,
        }
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn source(&self) -> SuggestionSource {
        self.source
    }
}

/**
 * \brief 客户端发往网关的请求体。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /** \brief 分类名称，网关会 trim 后校验非空；null 或非字符串按空串处理 */
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_name: String,
    /** \brief 可选模型标识，形如 `openai/gpt-4o-mini` */
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/**
 * \brief 网关成功响应体。icon/color 缺失时按空串处理，交由客户端修复。
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    pub icon: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/**
 * \brief 只接受 JSON 字符串；null、数字等其他类型视为空串，交给后续校验或修复。
 */
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/**
 * \brief 网关错误响应体；details 仅在开发模式下出现。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    NotConfigured,
}

/**
 * \brief 健康检查结果，不触发模型调用。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    pub provider: String,
    pub configured: bool,
    pub default_model: String,
}

/**
 * \brief 模型标识：`<provider>/<modelName>` 或裸模型名。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIdentifier {
    pub provider: String,
    pub model: String,
}

impl ModelIdentifier {
    /** \brief 按第一个 `/` 切分；无 `/` 时整体作为模型名。 */
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once('/') {
            Some((provider, model)) if !provider.is_empty() => Self {
                provider: provider.to_string(),
                model: model.to_string(),
            },
            Some((_, model)) => Self {
                provider: DEFAULT_PROVIDER.to_string(),
                model: model.to_string(),
            },
            None => Self {
                provider: DEFAULT_PROVIDER.to_string(),
                model: raw.to_string(),
            },
        }
    }
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user/assistant */
    pub role: String,
    /** \brief 内容 */
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/**
 * \brief 交给外部分类存储的新建分类草稿。
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    pub icon: String,
    pub color: String,
    pub background_color: String,
}

impl NewCategory {
    pub fn from_suggestion(name: &str, suggestion: &StyleSuggestion) -> Self {
        Self {
            name: name.trim().to_string(),
            icon: suggestion.icon().to_string(),
            color: suggestion.color().to_string(),
            background_color: suggestion.background_color().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn model_identifier_splits_on_first_slash() {
        let id = ModelIdentifier::parse("openai/gpt-4o-mini");
        assert_eq!(id.provider, "openai");
        assert_eq!(id.model, "gpt-4o-mini");

        let id = ModelIdentifier::parse("openrouter/openai/gpt-4o");
        assert_eq!(id.provider, "openrouter");
        assert_eq!(id.model, "openai/gpt-4o");
    }

    #[test]
    fn bare_model_name_is_used_unchanged() {
        let id = ModelIdentifier::parse("gpt-3.5-turbo");
        assert_eq!(id.provider, DEFAULT_PROVIDER);
        assert_eq!(id.model, "gpt-3.5-turbo");
    }

    #[test]
    fn suggestion_serializes_with_camel_case_and_derived_background() {
        let s = StyleSuggestion::from_color("home-outline", "#007AFF", None, SuggestionSource::Gateway)
            .unwrap();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(
            v,
            json!({"icon": "home-outline", "color": "#007AFF", "backgroundColor": "#cce4ff"})
        );
    }

    #[test]
    fn suggestion_rejects_invalid_color() {
        let err = StyleSuggestion::from_color("x", "blue", None, SuggestionSource::Gateway);
        assert!(matches!(err, Err(SuggestError::Validation(_))));
    }

    #[test]
    fn proxy_request_tolerates_missing_fields() {
        let req: ProxyRequest = serde_json::from_str("{}").unwrap();
        assert!(req.category_name.is_empty());
        assert!(req.model.is_none());

        let body = serde_json::to_value(ProxyRequest {
            category_name: "Casa".into(),
            model: None,
        })
        .unwrap();
        assert_eq!(body, json!({"categoryName": "Casa"}));
    }

    #[test]
    fn non_string_fields_read_as_empty() {
        let req: ProxyRequest = serde_json::from_str(r#"{"categoryName": null}"#).unwrap();
        assert!(req.category_name.is_empty());
        let req: ProxyRequest = serde_json::from_str(r#"{"categoryName": 42}"#).unwrap();
        assert!(req.category_name.is_empty());

        let resp: ProxyResponse =
            serde_json::from_str(r#"{"icon": "home-outline", "color": null}"#).unwrap();
        assert_eq!(resp.icon, "home-outline");
        assert!(resp.color.is_empty());
        let resp: ProxyResponse =
            serde_json::from_str(r#"{"icon": ["x"], "color": 255}"#).unwrap();
        assert!(resp.icon.is_empty());
        assert!(resp.color.is_empty());
    }

    #[test]
    fn health_status_uses_snake_case() {
        assert_eq!(
            serde_json::to_value(HealthStatus::NotConfigured).unwrap(),
            json!("not_configured")
        );
    }

    #[test]
    fn error_response_omits_absent_details() {
        let body = ErrorResponse {
            error: "Bad Request".into(),
            message: "m".into(),
            details: None,
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"error": "Bad Request", "message": "m"})
        );
    }
}
