use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use pulsebot_core::domain::post::PostDraft;
use pulsebot_mattermost::client::SessionClient;
use pulsebot_mattermost::events::{ChatEvent, EventEnvelope};

use crate::bootstrap::log_client_error;
use crate::rules::ReplyRules;

/// Single consumer of the event queue. Events are handled strictly in
/// arrival order; nothing here retries and nothing here terminates the
/// process - the loop ends when the queue closes or shutdown is signalled.
pub struct Dispatcher {
    client: Arc<dyn SessionClient>,
    rules: Option<ReplyRules>,
    events: mpsc::Receiver<EventEnvelope>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn SessionClient>,
        rules: Option<ReplyRules>,
        events: mpsc::Receiver<EventEnvelope>,
        cancel: CancellationToken,
    ) -> Self {
        Self { client, rules, events, cancel }
    }

    pub async fn run(mut self) {
        info!(
            event_name = "bot.dispatch.start",
            correlation_id = "dispatch",
            "event dispatcher started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(
                        event_name = "bot.dispatch.stop",
                        correlation_id = "shutdown",
                        "event dispatcher stopping on shutdown signal"
                    );
                    break;
                }
                maybe_event = self.events.recv() => {
                    let Some(envelope) = maybe_event else {
                        info!(
                            event_name = "bot.dispatch.stream_closed",
                            correlation_id = "dispatch",
                            "event queue closed; dispatcher stopping"
                        );
                        break;
                    };
                    self.handle(envelope).await;
                }
            }
        }
    }

    async fn handle(&self, envelope: EventEnvelope) {
        let EventEnvelope { channel_id, event, .. } = envelope;

        let post = match event {
            ChatEvent::Posted(post) => post,
            ChatEvent::Unsupported { event_type } => {
                debug!(event_type = %event_type, "discarding unsupported event");
                return;
            }
        };

        let Some(rules) = &self.rules else {
            // Degraded mode: no logging channel was resolved at bootstrap.
            return;
        };
        let Some(reply) = rules.evaluate(&channel_id, &post) else {
            return;
        };

        debug!(
            event_name = "bot.dispatch.replying",
            correlation_id = %post.id,
            "responding to logging channel message"
        );

        let draft = PostDraft::new(channel_id, reply.body).in_reply_to(reply.parent_id);
        if let Err(err) = self.client.create_post(&draft).await {
            log_client_error("keyword reply", &err);
        }
    }
}
