use std::sync::Arc;

use chat_api::http::{AppState, RouterOptions, build_router};
use shared::chat::ChatService;
use shared::config::{ServiceConfig, load_dotenv};
use shared::llm::{BedrockAuth, BedrockGateway, BedrockGatewayConfig};
use shared::store::InMemoryConversationStore;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "chat_api=info,shared=info,tower_http=info".to_string()),
        )
        .init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to read config");
            std::process::exit(1);
        }
    };

    let auth = match BedrockAuth::resolve(&config).await {
        Ok(auth) => auth,
        Err(err) => {
            error!(error = %err, region = %config.region, "failed to resolve bedrock credentials");
            std::process::exit(1);
        }
    };
    let auth_kind = auth.kind();

    let gateway_config = BedrockGatewayConfig::from_service_config(&config);
    let gateway = match BedrockGateway::new(gateway_config, auth) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!(error = %err, "failed to initialize bedrock gateway");
            std::process::exit(1);
        }
    };
    info!(
        invoke_url = %gateway.invoke_url(),
        auth = auth_kind,
        "bedrock gateway ready"
    );

    let app = build_router(
        AppState {
            chat: ChatService::new(
                Arc::new(InMemoryConversationStore::new()),
                Arc::new(gateway),
            ),
        },
        RouterOptions {
            cors_enabled: config.cors_enabled,
        },
    );

    let bind_addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, bind_addr = %bind_addr, "failed to bind chat api listener");
            std::process::exit(1);
        }
    };

    let local_addr = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or(bind_addr);
    info!(
        bind_addr = %local_addr,
        model_id = %config.model_id,
        region = %config.region,
        cors_enabled = config.cors_enabled,
        "chat api listening"
    );

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "chat api server failed");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for sigterm");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
