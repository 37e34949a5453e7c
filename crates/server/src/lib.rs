pub mod bootstrap;
pub mod dispatcher;
pub mod rules;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use pulsebot_core::config::{AppConfig, LoadOptions};
use pulsebot_mattermost::client::{RestClient, SessionClient};
use pulsebot_mattermost::stream::{spawn_pump, WsEventStream};

use crate::dispatcher::Dispatcher;
use crate::rules::ReplyRules;

fn init_logging(config: &AppConfig) {
    use pulsebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let client = Arc::new(RestClient::new(config.server.base_url.clone()));
    let ready = bootstrap::bootstrap(client.as_ref(), &config).await?;

    let token = client
        .auth_token()
        .await
        .context("login did not produce a session token for the event stream")?;
    let stream = WsEventStream::connect(&config.server.websocket_url(), &token)
        .await
        .context("event stream connection failed")?;

    let cancel = CancellationToken::new();
    let events = spawn_pump(Box::new(stream), cancel.clone());

    let rules = ReplyRules::for_session(&ready);
    let dispatcher = Dispatcher::new(client.clone(), rules, events, cancel.clone());
    let dispatcher_task = tokio::spawn(dispatcher.run());

    tracing::info!(
        event_name = "bot.started",
        correlation_id = "bootstrap",
        server_version = %ready.server_version,
        team = %ready.team.name,
        "pulsebot started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "bot.stopping",
        correlation_id = "shutdown",
        "pulsebot stopping"
    );

    // Single shutdown pass: stop the pump (closing the stream), drain the
    // dispatcher, then say goodbye.
    cancel.cancel();
    let _ = dispatcher_task.await;
    bootstrap::announce(client.as_ref(), &ready, &bootstrap::stopped_message(&config)).await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
