pub mod client;
pub mod config;
pub mod error;
pub mod flags;
pub mod gateway;
pub mod llm;
pub mod models;
pub mod palette;
pub mod resolver;
pub mod server;
pub mod styler;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用类型。
 */
pub mod prelude {
    pub use crate::client::SuggestionClient;
    pub use crate::config::{AppConfig, ClientConfig, GatewayConfig};
    pub use crate::error::SuggestError;
    pub use crate::flags::{FeatureGate, RemoteFlags, StaticFlags};
    pub use crate::gateway::ProviderGateway;
    pub use crate::llm::{LanguageModel, OpenAiModel};
    pub use crate::models::{NewCategory, StyleSuggestion};
    pub use crate::resolver::DeterministicStyleResolver;
    pub use crate::styler::CategoryStyler;
    pub use crate::telemetry;
}
