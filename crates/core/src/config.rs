use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub bot: BotConfig,
    pub team: TeamConfig,
    pub channel: ChannelConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub base_url: String,
    pub ws_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub email: String,
    pub password: SecretString,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
}

#[derive(Clone, Debug)]
pub struct TeamConfig {
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub name: String,
    pub display_name: String,
    pub purpose: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub server_base_url: Option<String>,
    pub server_ws_url: Option<String>,
    pub bot_email: Option<String>,
    pub bot_password: Option<String>,
    pub team_name: Option<String>,
    pub channel_name: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { base_url: "http://localhost:8065".to_string(), ws_url: None },
            bot: BotConfig {
                email: String::new(),
                password: String::new().into(),
                username: "pulsebot".to_string(),
                first_name: "Pulse".to_string(),
                last_name: "Bot".to_string(),
                display_name: "Pulse Bot".to_string(),
            },
            team: TeamConfig { name: "localteam".to_string() },
            channel: ChannelConfig {
                name: "pulsebot-status".to_string(),
                display_name: "Pulse Bot Status".to_string(),
                purpose: "Pulse Bot lifecycle announcements and keyword replies".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl ServerConfig {
    /// The websocket endpoint for the event stream. When `ws_url` is not set
    /// explicitly it is derived from `base_url` by scheme substitution.
    pub fn websocket_url(&self) -> String {
        if let Some(ws_url) = &self.ws_url {
            return ws_url.clone();
        }

        if let Some(rest) = self.base_url.strip_prefix("https://") {
            return format!("wss://{rest}");
        }
        if let Some(rest) = self.base_url.strip_prefix("http://") {
            return format!("ws://{rest}");
        }
        self.base_url.clone()
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pulsebot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(base_url) = server.base_url {
                self.server.base_url = base_url;
            }
            if let Some(ws_url) = server.ws_url {
                self.server.ws_url = Some(ws_url);
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(email) = bot.email {
                self.bot.email = email;
            }
            if let Some(password_value) = bot.password {
                self.bot.password = secret_value(password_value);
            }
            if let Some(username) = bot.username {
                self.bot.username = username;
            }
            if let Some(first_name) = bot.first_name {
                self.bot.first_name = first_name;
            }
            if let Some(last_name) = bot.last_name {
                self.bot.last_name = last_name;
            }
            if let Some(display_name) = bot.display_name {
                self.bot.display_name = display_name;
            }
        }

        if let Some(team) = patch.team {
            if let Some(name) = team.name {
                self.team.name = name;
            }
        }

        if let Some(channel) = patch.channel {
            if let Some(name) = channel.name {
                self.channel.name = name;
            }
            if let Some(display_name) = channel.display_name {
                self.channel.display_name = display_name;
            }
            if let Some(purpose) = channel.purpose {
                self.channel.purpose = purpose;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PULSEBOT_SERVER_BASE_URL") {
            self.server.base_url = value;
        }
        if let Some(value) = read_env("PULSEBOT_SERVER_WS_URL") {
            self.server.ws_url = Some(value);
        }

        if let Some(value) = read_env("PULSEBOT_BOT_EMAIL") {
            self.bot.email = value;
        }
        if let Some(value) = read_env("PULSEBOT_BOT_PASSWORD") {
            self.bot.password = secret_value(value);
        }
        if let Some(value) = read_env("PULSEBOT_BOT_USERNAME") {
            self.bot.username = value;
        }
        if let Some(value) = read_env("PULSEBOT_BOT_FIRST_NAME") {
            self.bot.first_name = value;
        }
        if let Some(value) = read_env("PULSEBOT_BOT_LAST_NAME") {
            self.bot.last_name = value;
        }
        if let Some(value) = read_env("PULSEBOT_BOT_DISPLAY_NAME") {
            self.bot.display_name = value;
        }

        if let Some(value) = read_env("PULSEBOT_TEAM_NAME") {
            self.team.name = value;
        }

        if let Some(value) = read_env("PULSEBOT_CHANNEL_NAME") {
            self.channel.name = value;
        }
        if let Some(value) = read_env("PULSEBOT_CHANNEL_DISPLAY_NAME") {
            self.channel.display_name = value;
        }
        if let Some(value) = read_env("PULSEBOT_CHANNEL_PURPOSE") {
            self.channel.purpose = value;
        }

        let log_level =
            read_env("PULSEBOT_LOGGING_LEVEL").or_else(|| read_env("PULSEBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PULSEBOT_LOGGING_FORMAT").or_else(|| read_env("PULSEBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(server_base_url) = overrides.server_base_url {
            self.server.base_url = server_base_url;
        }
        if let Some(server_ws_url) = overrides.server_ws_url {
            self.server.ws_url = Some(server_ws_url);
        }
        if let Some(bot_email) = overrides.bot_email {
            self.bot.email = bot_email;
        }
        if let Some(bot_password) = overrides.bot_password {
            self.bot.password = secret_value(bot_password);
        }
        if let Some(team_name) = overrides.team_name {
            self.team.name = team_name;
        }
        if let Some(channel_name) = overrides.channel_name {
            self.channel.name = channel_name;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_bot(&self.bot)?;
        validate_team(&self.team)?;
        validate_channel(&self.channel)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pulsebot.toml"), PathBuf::from("config/pulsebot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    let base_url = server.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "server.base_url must start with http:// or https://".to_string(),
        ));
    }

    if let Some(ws_url) = &server.ws_url {
        let ws_url = ws_url.trim();
        if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
            return Err(ConfigError::Validation(
                "server.ws_url must start with ws:// or wss://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    let email = bot.email.trim();
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "bot.email is required. Set it in pulsebot.toml or via PULSEBOT_BOT_EMAIL".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(ConfigError::Validation(format!(
            "bot.email `{email}` does not look like an email address"
        )));
    }

    if bot.password.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "bot.password is required. Set it in pulsebot.toml or via PULSEBOT_BOT_PASSWORD"
                .to_string(),
        ));
    }

    let username = bot.username.trim();
    if username.is_empty() {
        return Err(ConfigError::Validation("bot.username must not be empty".to_string()));
    }
    let valid_handle = username
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '-' | '_'));
    if !valid_handle {
        return Err(ConfigError::Validation(format!(
            "bot.username `{username}` must contain only lowercase letters, digits, `.`, `-` or `_`"
        )));
    }

    if bot.display_name.trim().is_empty() {
        return Err(ConfigError::Validation("bot.display_name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_team(team: &TeamConfig) -> Result<(), ConfigError> {
    if team.name.trim().is_empty() {
        return Err(ConfigError::Validation("team.name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_channel(channel: &ChannelConfig) -> Result<(), ConfigError> {
    let name = channel.name.trim();
    if name.is_empty() {
        return Err(ConfigError::Validation("channel.name must not be empty".to_string()));
    }
    if !name.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-') {
        return Err(ConfigError::Validation(format!(
            "channel.name `{name}` must be a URL-safe handle (lowercase letters, digits, dashes)"
        )));
    }

    if channel.display_name.trim().is_empty() {
        return Err(ConfigError::Validation("channel.display_name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    bot: Option<BotPatch>,
    team: Option<TeamPatch>,
    channel: Option<ChannelPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    base_url: Option<String>,
    ws_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    email: Option<String>,
    password: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TeamPatch {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelPatch {
    name: Option<String>,
    display_name: Option<String>,
    purpose: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
