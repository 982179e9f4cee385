//! Faucet bot binary

use anyhow::Context;
use clap::Parser;
use mission_control_common::logging::{init_logging, LoggingConfig};
use mission_control_faucet::discord::{self, FaucetBot};
use mission_control_faucet::reply::ReplyStyle;
use mission_control_faucet::{
    api, ConfigError, DispatcherSettings, FaucetConfig, FaucetDispatcher, JsonRpcClient,
    OperatorKey, SlackNotifier,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Faucet bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log format: pretty, compact or json
    #[arg(long, default_value = "pretty")]
    log_format: String,

    /// Bind address of the HTTP status server (overrides STATUS_ADDR)
    #[arg(long)]
    status_addr: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&LoggingConfig {
        level: if args.debug { "debug" } else { "info" }.to_string(),
        format: args.log_format.clone(),
        ..Default::default()
    })?;

    info!("Starting bot...");

    let mut config = match FaucetConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::Missing(missing)) => {
            for key in missing {
                error!("Missing {} env variables", key);
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Some(addr) = args.status_addr {
        config.status_addr = Some(addr);
    }

    info!("Configuration:");
    info!("  RPC URL: {}", config.rpc_url);
    info!("  Operator account: {}", config.account_id);
    info!("  Grant: {} {}", config.token_count, config.token_symbol);
    info!("  Cooldown: {}h", config.faucet_send_interval_hours);
    info!("  Alert threshold: {} {}", config.balance_alert_threshold, config.token_symbol);

    let operator = OperatorKey::from_hex(&config.account_key).context("Invalid ACCOUNT_KEY")?;
    if operator.address() != config.account_id {
        anyhow::bail!(
            "ACCOUNT_KEY controls {}, not ACCOUNT_ID {}",
            operator.address(),
            config.account_id
        );
    }

    let chain = Arc::new(JsonRpcClient::new(config.rpc_url.clone()));
    info!("Connecting to {}...", chain.url());
    let alerts = Arc::new(SlackNotifier::new(config.slack_webhook.clone())?);

    let settings = DispatcherSettings::from_config(&config)?;
    let dispatcher = Arc::new(FaucetDispatcher::new(settings, operator, chain, alerts)?);

    if let Some(addr) = &config.status_addr {
        let addr: SocketAddr = addr.parse().context("Invalid STATUS_ADDR")?;
        let app = api::router(dispatcher.clone()).layer(TraceLayer::new_for_http());
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Status server listening on {}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Status server stopped: {}", e);
            }
        });
    }

    let bot = FaucetBot::new(
        dispatcher,
        config.channels(),
        ReplyStyle {
            token_symbol: config.token_symbol.clone(),
            send_interval_hours: config.faucet_send_interval_hours,
        },
    );

    discord::run(&config.discord_token, bot, shutdown_signal()).await?;

    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
