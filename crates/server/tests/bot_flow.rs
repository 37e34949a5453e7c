//! End-to-end scenarios: bootstrap against an in-memory server, feed frames
//! through the real decoder and pump, and observe the replies the bot posts.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use pulsebot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use pulsebot_core::domain::channel::{Channel, ChannelType, NewChannel};
use pulsebot_core::domain::post::{Post, PostDraft};
use pulsebot_core::domain::team::Team;
use pulsebot_core::domain::user::UserProfile;
use pulsebot_core::errors::{ClientError, ErrorDetail};
use pulsebot_mattermost::client::{ServerInfo, SessionClient};
use pulsebot_mattermost::events::{decode_event, EventEnvelope};
use pulsebot_mattermost::stream::{spawn_pump, EventStream, StreamError};
use pulsebot_server::bootstrap::{self, stopped_message};
use pulsebot_server::dispatcher::Dispatcher;
use pulsebot_server::rules::ReplyRules;

const BOT_USER: &str = "u-bot";

fn test_config() -> AppConfig {
    AppConfig::load(LoadOptions {
        overrides: ConfigOverrides {
            bot_email: Some("bot@example.com".to_string()),
            bot_password: Some("hunter2".to_string()),
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    })
    .expect("test config should validate")
}

#[derive(Default)]
struct ServerState {
    channels: HashMap<String, Channel>,
    posts: Vec<PostDraft>,
}

/// In-memory stand-in for the chat server's REST surface.
#[derive(Default)]
struct InMemoryServer {
    state: Mutex<ServerState>,
}

impl InMemoryServer {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn posts(&self) -> Vec<PostDraft> {
        self.state.lock().expect("state lock").posts.clone()
    }
}

#[async_trait]
impl SessionClient for InMemoryServer {
    async fn ping(&self) -> Result<ServerInfo, ClientError> {
        Ok(ServerInfo { version: "9.11.0".to_string() })
    }

    async fn login(
        &self,
        email: &str,
        _password: &SecretString,
    ) -> Result<UserProfile, ClientError> {
        Ok(UserProfile {
            id: BOT_USER.to_string(),
            username: "pulsebot".to_string(),
            email: email.to_string(),
            first_name: "Pulse".to_string(),
            last_name: "Bot".to_string(),
        })
    }

    async fn update_user(&self, user: &UserProfile) -> Result<UserProfile, ClientError> {
        Ok(user.clone())
    }

    async fn team_by_name(&self, name: &str) -> Result<Team, ClientError> {
        Ok(Team { id: "t-1".to_string(), name: name.to_string(), display_name: String::new() })
    }

    async fn channel_by_name(&self, _team_id: &str, name: &str) -> Result<Channel, ClientError> {
        self.state.lock().expect("state lock").channels.get(name).cloned().ok_or_else(|| {
            ClientError::NotFound(ErrorDetail::from_message(
                format!("channel `{name}` does not exist"),
                404,
            ))
        })
    }

    async fn create_channel(&self, draft: &NewChannel) -> Result<Channel, ClientError> {
        let mut state = self.state.lock().expect("state lock");
        let channel = Channel {
            id: format!("c-{}", state.channels.len() + 1),
            team_id: draft.team_id.clone(),
            name: draft.name.clone(),
            display_name: draft.display_name.clone(),
            purpose: draft.purpose.clone(),
            channel_type: ChannelType::Open,
        };
        state.channels.insert(channel.name.clone(), channel.clone());
        Ok(channel)
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, ClientError> {
        let mut state = self.state.lock().expect("state lock");
        state.posts.push(draft.clone());
        Ok(Post {
            id: format!("p-out-{}", state.posts.len()),
            channel_id: draft.channel_id.clone(),
            user_id: BOT_USER.to_string(),
            message: draft.message.clone(),
            root_id: draft.root_id.clone().unwrap_or_default(),
        })
    }

    async fn auth_token(&self) -> Option<String> {
        Some("token-1".to_string())
    }
}

struct ScriptedStream {
    events: VecDeque<Result<Option<EventEnvelope>, StreamError>>,
    close_calls: Arc<AtomicUsize>,
}

impl ScriptedStream {
    fn new(
        events: Vec<Result<Option<EventEnvelope>, StreamError>>,
        close_calls: Arc<AtomicUsize>,
    ) -> Self {
        Self { events: events.into(), close_calls }
    }
}

#[async_trait]
impl EventStream for ScriptedStream {
    async fn next_event(&mut self) -> Result<Option<EventEnvelope>, StreamError> {
        match self.events.pop_front() {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A raw `posted` frame the way the server wires it: the post record is a
/// JSON string inside `data.post`.
fn posted_frame(channel_id: &str, author: &str, message: &str, post_id: &str) -> EventEnvelope {
    let post = serde_json::json!({
        "id": post_id,
        "channel_id": channel_id,
        "user_id": author,
        "message": message,
        "root_id": "",
    });
    let frame = serde_json::json!({
        "event": "posted",
        "seq": 7,
        "data": { "post": post.to_string() },
        "broadcast": { "channel_id": channel_id },
    });
    decode_event(&frame.to_string()).expect("frame should decode")
}

#[tokio::test]
async fn keyword_message_in_the_logging_channel_gets_the_status_reply() {
    let server = InMemoryServer::new();
    let config = test_config();

    let ready = bootstrap::bootstrap(server.as_ref(), &config).await.expect("bootstrap");
    let channel_id =
        ready.log_channel.as_ref().map(|channel| channel.id.clone()).expect("logging channel");

    let close_calls = Arc::new(AtomicUsize::new(0));
    let stream = ScriptedStream::new(
        vec![
            Ok(Some(posted_frame(&channel_id, "u-human", "is the bot alive", "p-1"))),
            Ok(None),
        ],
        close_calls,
    );

    let cancel = CancellationToken::new();
    let events = spawn_pump(Box::new(stream), cancel.clone());
    let rules = ReplyRules::for_session(&ready);
    Dispatcher::new(server.clone(), rules, events, cancel).run().await;

    let posts = server.posts();
    assert_eq!(posts.len(), 2, "startup announcement plus one reply");
    assert_eq!(posts[0].message, "_Pulse Bot has **started** running_");
    assert_eq!(posts[1].message, "Yes I'm running");
    assert_eq!(posts[1].root_id.as_deref(), Some("p-1"));
    assert_eq!(posts[1].channel_id, channel_id);
}

#[tokio::test]
async fn unrecognized_message_gets_the_fallback_reply() {
    let server = InMemoryServer::new();
    let config = test_config();

    let ready = bootstrap::bootstrap(server.as_ref(), &config).await.expect("bootstrap");
    let channel_id =
        ready.log_channel.as_ref().map(|channel| channel.id.clone()).expect("logging channel");

    let close_calls = Arc::new(AtomicUsize::new(0));
    let stream = ScriptedStream::new(
        vec![Ok(Some(posted_frame(&channel_id, "u-human", "goodnight", "p-2"))), Ok(None)],
        close_calls,
    );

    let cancel = CancellationToken::new();
    let events = spawn_pump(Box::new(stream), cancel.clone());
    let rules = ReplyRules::for_session(&ready);
    Dispatcher::new(server.clone(), rules, events, cancel).run().await;

    let posts = server.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].message, "I did not understand you!");
    assert_eq!(posts[1].root_id.as_deref(), Some("p-2"));
}

#[tokio::test]
async fn shutdown_closes_the_stream_and_announces_the_stop() {
    let server = InMemoryServer::new();
    let config = test_config();

    let ready = bootstrap::bootstrap(server.as_ref(), &config).await.expect("bootstrap");

    let close_calls = Arc::new(AtomicUsize::new(0));
    let stream = ScriptedStream::new(vec![], close_calls.clone());

    let cancel = CancellationToken::new();
    let events = spawn_pump(Box::new(stream), cancel.clone());
    let rules = ReplyRules::for_session(&ready);
    let dispatcher_task =
        tokio::spawn(Dispatcher::new(server.clone(), rules, events, cancel.clone()).run());

    // The interrupt path: cancel, drain the dispatcher, say goodbye.
    cancel.cancel();
    dispatcher_task.await.expect("dispatcher should stop cleanly");
    bootstrap::announce(server.as_ref(), &ready, &stopped_message(&config)).await;

    // The pump closes the stream from its own task.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(close_calls.load(Ordering::SeqCst), 1, "stream must be closed on shutdown");
    let posts = server.posts();
    assert_eq!(posts.last().map(|post| post.message.as_str()),
        Some("_Pulse Bot has **stopped** running_"));
}
