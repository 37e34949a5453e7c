use thiserror::Error;
use tracing::{error, info};

use pulsebot_core::config::AppConfig;
use pulsebot_core::domain::channel::{Channel, NewChannel};
use pulsebot_core::domain::post::PostDraft;
use pulsebot_core::domain::team::Team;
use pulsebot_core::domain::user::UserProfile;
use pulsebot_core::errors::ClientError;
use pulsebot_mattermost::client::SessionClient;

/// Everything the event loop needs, resolved once at startup and read-only
/// afterwards. `log_channel` is `None` when channel resolution and creation
/// both failed (degraded mode: no announcements, no replies).
#[derive(Debug)]
pub struct ReadySession {
    pub bot: UserProfile,
    pub team: Team,
    pub log_channel: Option<Channel>,
    pub server_version: String,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("server liveness check failed")]
    Liveness(#[source] ClientError),
    #[error("bot login failed")]
    Login(#[source] ClientError),
    #[error("bot profile update failed")]
    ProfileUpdate(#[source] ClientError),
    #[error("team `{name}` could not be resolved")]
    TeamResolution {
        name: String,
        #[source]
        source: ClientError,
    },
}

/// Runs the fixed startup sequence: liveness check, login, identity
/// normalization, team resolution, logging-channel resolution and the
/// startup announcement. The first four steps are prerequisites and fail
/// the whole bootstrap; the last two degrade.
pub async fn bootstrap(
    client: &dyn SessionClient,
    config: &AppConfig,
) -> Result<ReadySession, BootstrapError> {
    info!(
        event_name = "bot.bootstrap.start",
        correlation_id = "bootstrap",
        "starting bot bootstrap"
    );

    let server = client.ping().await.map_err(|err| {
        log_client_error("server liveness check", &err);
        BootstrapError::Liveness(err)
    })?;
    info!(
        event_name = "bot.bootstrap.server_detected",
        correlation_id = "bootstrap",
        server_version = %server.version,
        "server detected and running"
    );

    let bot = client.login(&config.bot.email, &config.bot.password).await.map_err(|err| {
        log_client_error("bot login", &err);
        BootstrapError::Login(err)
    })?;
    info!(
        event_name = "bot.bootstrap.logged_in",
        correlation_id = "bootstrap",
        bot_user_id = %bot.id,
        "logged in as the bot account"
    );

    let bot = normalize_identity(client, config, bot).await?;

    let team = client.team_by_name(&config.team.name).await.map_err(|err| {
        log_client_error("team resolution", &err);
        BootstrapError::TeamResolution { name: config.team.name.clone(), source: err }
    })?;
    info!(
        event_name = "bot.bootstrap.team_resolved",
        correlation_id = "bootstrap",
        team = %team.name,
        team_id = %team.id,
        "team resolved"
    );

    let log_channel = resolve_or_create_channel(client, config, &team.id).await;

    let ready = ReadySession { bot, team, log_channel, server_version: server.version };
    announce(client, &ready, &started_message(config)).await;

    Ok(ready)
}

/// Compares the logged-in profile against the configured display identity
/// and pushes an update when they differ. Divergence here usually means the
/// very first run against a fresh account.
async fn normalize_identity(
    client: &dyn SessionClient,
    config: &AppConfig,
    bot: UserProfile,
) -> Result<UserProfile, BootstrapError> {
    let Some(desired) = bot.normalized_for(&config.bot) else {
        return Ok(bot);
    };

    match client.update_user(&desired).await {
        Ok(updated) => {
            info!(
                event_name = "bot.bootstrap.identity_updated",
                correlation_id = "bootstrap",
                bot_username = %updated.username,
                "looks like a first run; bot account settings were updated"
            );
            Ok(updated)
        }
        Err(err) => {
            log_client_error("bot profile update", &err);
            Err(BootstrapError::ProfileUpdate(err))
        }
    }
}

/// Looks the logging channel up by name; any lookup failure falls through to
/// creation. Both failing leaves the bot without a logging channel, which is
/// tolerated.
pub(crate) async fn resolve_or_create_channel(
    client: &dyn SessionClient,
    config: &AppConfig,
    team_id: &str,
) -> Option<Channel> {
    match client.channel_by_name(team_id, &config.channel.name).await {
        Ok(channel) => {
            info!(
                event_name = "bot.bootstrap.channel_resolved",
                correlation_id = "bootstrap",
                channel = %channel.name,
                channel_id = %channel.id,
                "logging channel resolved"
            );
            return Some(channel);
        }
        Err(err) => log_client_error("logging channel lookup", &err),
    }

    let draft = NewChannel::open(team_id, &config.channel);
    match client.create_channel(&draft).await {
        Ok(channel) => {
            info!(
                event_name = "bot.bootstrap.channel_created",
                correlation_id = "bootstrap",
                channel = %channel.name,
                channel_id = %channel.id,
                "looks like a first run; logging channel was created"
            );
            Some(channel)
        }
        Err(err) => {
            log_client_error("logging channel creation", &err);
            None
        }
    }
}

/// Posts a lifecycle announcement to the logging channel. Best-effort: a
/// missing channel or a failed send never propagates.
pub async fn announce(client: &dyn SessionClient, ready: &ReadySession, message: &str) {
    let Some(channel) = &ready.log_channel else {
        return;
    };

    let draft = PostDraft::new(channel.id.clone(), message);
    if let Err(err) = client.create_post(&draft).await {
        log_client_error("lifecycle announcement", &err);
    }
}

pub fn started_message(config: &AppConfig) -> String {
    format!("_{} has **started** running_", config.bot.display_name)
}

pub fn stopped_message(config: &AppConfig) -> String {
    format!("_{} has **stopped** running_", config.bot.display_name)
}

/// Prints the structured error block the operator sees for every failed
/// server call: message, stable error id, detailed diagnostic.
pub(crate) fn log_client_error(operation: &str, err: &ClientError) {
    match err.detail() {
        Some(detail) => error!(
            error = %err,
            error_id = %detail.id,
            detailed_error = %detail.detailed_error,
            status_code = detail.status_code,
            "{operation} failed"
        ),
        None => error!(error = %err, "{operation} failed"),
    }
}
