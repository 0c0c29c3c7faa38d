use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tareas_core_sdk::config::{AppConfig, ClientConfig};
use tareas_core_sdk::flags::{
    FeatureGate, RemoteFlags, StaticFlags, AI_SUGGESTIONS_ENABLED, AI_SUGGESTIONS_MODEL,
};
use tareas_core_sdk::gateway::ProviderGateway;
use tareas_core_sdk::llm::OpenAiModel;
use tareas_core_sdk::resolver::DeterministicStyleResolver;
use tareas_core_sdk::styler::CategoryStyler;
use tareas_core_sdk::{client::SuggestionClient, server, telemetry};

/**
 * \brief CLI 程序入口：网关服务与分类样式建议。
 */
#[derive(Parser, Debug)]
#[command(name = "tareas", version, about = "Tareas category style suggestions")]
struct Cli {
    /** \brief TOML 配置文件，环境变量会覆盖其中的值 */
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /** \brief 将建议结果写入本地审计日志 */
    #[arg(long, global = true, default_value_t = false)]
    telemetry: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动 AI 建议网关。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787")]
        addr: String,
    },

    /**
     * \brief 按功能开关为分类名称请求样式建议。
     */
    Suggest {
        name: String,
        #[command(flatten)]
        client: ClientArgs,
        /** \brief 覆盖模型标识，例如 openai/gpt-4o-mini，跳过功能开关 */
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        flags_url: Option<String>,
        /** \brief 输出可保存的分类草稿而不是建议本身 */
        #[arg(long, default_value_t = false)]
        draft: bool,
    },

    /**
     * \brief 只使用本地确定性规则。
     */
    Resolve { name: String },

    /**
     * \brief 探测网关健康状态；未给出网关地址时打印本地网关配置状态（不会调用模型）。
     */
    Health {
        #[arg(long)]
        endpoint: Option<String>,
    },

    /**
     * \brief 刷新并打印功能开关。
     */
    Flags {
        #[arg(long)]
        flags_url: Option<String>,
    },
}

/**
 * \brief 覆盖客户端配置的命令行参数。
 */
#[derive(Args, Debug)]
struct ClientArgs {
    /** \brief 网关地址，例如 http://127.0.0.1:8787/suggest */
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    /** \brief 不访问网关，直接使用本地建议 */
    #[arg(long, default_value_t = false)]
    mock: bool,
}

impl ClientArgs {
    fn apply(self, config: &mut ClientConfig) {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = Some(endpoint);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if self.mock {
            config.use_mock = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("load config failed")?;
    telemetry::set_enabled(cli.telemetry || telemetry_from_env());

    match cli.command {
        Commands::Serve { addr } => {
            server::run(&addr, config.gateway).await?;
        }
        Commands::Suggest {
            name,
            client,
            model,
            flags_url,
            draft,
        } => {
            client.apply(&mut config.client);
            if flags_url.is_some() {
                config.flags.url = flags_url;
            }
            let client = SuggestionClient::new(config.client.clone());
            if let Some(model) = model {
                let suggestion = client.suggest_with_model(&name, Some(model.as_str())).await;
                print_json(&suggestion)?;
                return Ok(());
            }
            let styler = CategoryStyler::new(feature_gate(&config), client);
            if draft {
                print_json(&styler.draft(&name).await)?;
            } else {
                print_json(&styler.style_for(&name).await)?;
            }
        }
        Commands::Resolve { name } => {
            print_json(&DeterministicStyleResolver.resolve(&name))?;
        }
        Commands::Health { endpoint } => {
            if endpoint.is_some() {
                config.client.endpoint = endpoint;
            }
            if config.client.endpoint.is_some() {
                let report = SuggestionClient::new(config.client.clone())
                    .health()
                    .await
                    .context("gateway health probe failed")?;
                print_json(&report)?;
            } else {
                let gateway = ProviderGateway::new(
                    OpenAiModel::from_config(&config.gateway),
                    &config.gateway,
                );
                print_json(&gateway.health())?;
            }
        }
        Commands::Flags { flags_url } => {
            if flags_url.is_some() {
                config.flags.url = flags_url;
            }
            let gate = feature_gate(&config);
            if let Err(err) = gate.refresh().await {
                tracing::warn!("flag refresh failed: {}", err);
            }
            print_json(&serde_json::json!({
                AI_SUGGESTIONS_ENABLED: gate.is_enabled(AI_SUGGESTIONS_ENABLED),
                AI_SUGGESTIONS_MODEL: gate.get_string(AI_SUGGESTIONS_MODEL),
            }))?;
        }
    }

    Ok(())
}

fn telemetry_from_env() -> bool {
    std::env::var("TAREAS_TELEMETRY")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn feature_gate(config: &AppConfig) -> Arc<dyn FeatureGate> {
    match &config.flags.url {
        Some(url) => Arc::new(RemoteFlags::new(url.clone(), &config.flags)),
        None => Arc::new(StaticFlags::new(config.flags.values.clone())),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output failed")?;
    println!("{}", text);
    Ok(())
}
