use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use weft_agent_loop::{GenaiLlmExecutor, LlmExecutor};
use weft_contract::ConversationStore;
use weft_server::config::ServerConfig;
use weft_server::http;
use weft_server::service::{AppState, ChatService};
use weft_server::tools::demo_registry;
use weft_store_adapters::FileStore;

#[derive(Debug, Parser)]
#[command(name = "weft-server")]
struct Args {
    #[arg(long, env = "WEFT_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    #[arg(long, env = "WEFT_STORAGE_DIR", default_value = "./conversations")]
    storage_dir: PathBuf,

    #[arg(long, env = "WEFT_CONFIG")]
    config: Option<PathBuf>,

    /// Forecast API origin; overrides `weather_base_url` from the config file.
    #[arg(long, env = "WEFT_WEATHER_URL")]
    weather_url: Option<String>,
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = match args.config.as_deref() {
        Some(path) => ServerConfig::from_file(path).unwrap_or_else(|e| exit_with(e)),
        None => ServerConfig::default(),
    };
    if let Some(url) = args.weather_url {
        cfg.weather_base_url = url;
    }
    let tools_config = cfg.tools_config().unwrap_or_else(|e| exit_with(e));

    let llm: Arc<dyn LlmExecutor> = Arc::new(GenaiLlmExecutor::default());
    let tools = demo_registry(&tools_config, reqwest::Client::new(), llm.clone())
        .unwrap_or_else(|e| exit_with(format!("failed to register tools: {e}")));
    let chat = ChatService::new(cfg.agent_config().with_llm_executor(llm), tools)
        .with_persist(cfg.persist);

    let store: Arc<dyn ConversationStore> = Arc::new(FileStore::new(args.storage_dir));
    let app = http::router(
        AppState::new(chat, store).with_session_retention(cfg.completed_retention()),
    );

    let listener = match tokio::net::TcpListener::bind(&args.http_addr).await {
        Ok(listener) => listener,
        Err(e) => exit_with(format!("failed to bind {}: {e}", args.http_addr)),
    };
    tracing::info!(addr = %args.http_addr, model = %cfg.model, "weft server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    {
        exit_with(format!("http server crashed: {e}"));
    }
}
