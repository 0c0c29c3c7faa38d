use std::sync::Arc;

use crate::client::SuggestionClient;
use crate::flags::{FeatureGate, AI_SUGGESTIONS_ENABLED, AI_SUGGESTIONS_MODEL, MOCK_MODEL};
use crate::models::{NewCategory, StyleSuggestion};
use crate::resolver::DeterministicStyleResolver;

/**
 * \brief 分类表单的样式入口：按开关决定走 AI 建议还是本地确定性建议。
 */
#[derive(Clone)]
pub struct CategoryStyler {
    gate: Arc<dyn FeatureGate>,
    client: SuggestionClient,
    resolver: DeterministicStyleResolver,
}

impl CategoryStyler {
    pub fn new(gate: Arc<dyn FeatureGate>, client: SuggestionClient) -> Self {
        Self {
            gate,
            client,
            resolver: DeterministicStyleResolver,
        }
    }

    /**
     * \brief 为分类名称给出样式；永远有结果。
     */
    pub async fn style_for(&self, category_name: &str) -> StyleSuggestion {
        if let Err(err) = self.gate.refresh().await {
            tracing::debug!("using cached feature flags: {}", err);
        }

        if !self.gate.is_enabled(AI_SUGGESTIONS_ENABLED) {
            tracing::debug!("AI suggestions disabled by flag");
            return self.resolver.resolve(category_name);
        }

        let flagged = self.gate.get_string(AI_SUGGESTIONS_MODEL);
        let model = match flagged.trim() {
            "" | MOCK_MODEL => self.client.config().model.clone(),
            other => Some(other.to_string()),
        };
        self.client
            .suggest_with_model(category_name, model.as_deref())
            .await
    }

    /**
     * \brief 生成可直接保存的分类草稿。
     */
    pub async fn draft(&self, category_name: &str) -> NewCategory {
        let suggestion = self.style_for(category_name).await;
        NewCategory::from_suggestion(category_name, &suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, FlagsConfig};
    use crate::flags::{FlagValue, RemoteFlags, StaticFlags};
    use crate::models::SuggestionSource;
    use crate::palette::lighten;
    use serde_json::json;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SuggestionClient {
        SuggestionClient::new(ClientConfig {
            endpoint: Some(server.uri()),
            timeout_ms: 2_000,
            ..ClientConfig::default()
        })
    }

    #[tokio::test]
    async fn disabled_flag_uses_keyword_style_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let gate = StaticFlags::default().with(AI_SUGGESTIONS_ENABLED, FlagValue::Bool(false));
        let styler = CategoryStyler::new(Arc::new(gate), client_for(&server));
        let s = styler.style_for("Gimnasio").await;
        assert_eq!(s.icon(), "fitness-outline");
        assert_eq!(s.color(), "#10B981");
        assert_eq!(s.background_color(), "#cff1e6");
        assert_eq!(s.source(), SuggestionSource::Local);
    }

    #[tokio::test]
    async fn flagged_model_is_sent_to_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"categoryName": "Cine", "model": "openai/gpt-4o"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"icon": "film-outline", "color": "#EC4899"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gate = StaticFlags::default()
            .with(AI_SUGGESTIONS_MODEL, FlagValue::Text("openai/gpt-4o".into()));
        let styler = CategoryStyler::new(Arc::new(gate), client_for(&server));
        let s = styler.style_for("Cine").await;
        assert_eq!(s.icon(), "film-outline");
        assert_eq!(s.source(), SuggestionSource::Gateway);
    }

    #[tokio::test]
    async fn mock_model_flag_does_not_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"categoryName": "Cine"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"icon": "film-outline", "color": "#EC4899"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let styler = CategoryStyler::new(Arc::new(StaticFlags::default()), client_for(&server));
        styler.style_for("Cine").await;
    }

    #[tokio::test]
    async fn unreachable_flag_source_keeps_ai_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"categoryName": "Cine"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"icon": "film-outline", "color": "#EC4899"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gate = RemoteFlags::new(
            "http://127.0.0.1:9/flags",
            &FlagsConfig {
                fetch_timeout_ms: 2_000,
                ..FlagsConfig::default()
            },
        );
        let styler = CategoryStyler::new(Arc::new(gate), client_for(&server));
        let s = styler.style_for("Cine").await;
        assert_eq!(s.source(), SuggestionSource::Gateway);
        assert_eq!(s.icon(), "film-outline");
    }

    #[tokio::test]
    async fn draft_trims_name_and_carries_style() {
        let gate = StaticFlags::default().with(AI_SUGGESTIONS_ENABLED, FlagValue::Bool(false));
        let styler = CategoryStyler::new(Arc::new(gate), SuggestionClient::new(ClientConfig::default()));
        let draft = styler.draft("  Supermercado ").await;
        assert_eq!(draft.name, "Supermercado");
        assert_eq!(draft.icon, "cart-outline");
        assert_eq!(draft.background_color, lighten(&draft.color).unwrap());
    }
}
