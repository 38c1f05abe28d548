//! Chat service — multi-channel messaging inside a room.
//!
//! `send_message` runs the full pipeline: rate limit → content validation →
//! filter → permission check → routing + append. A failed message is never
//! appended and never delivered. The room owns the lock around the game
//! state; this service is called under it and returns the routing decision
//! for the room to broadcast.

pub mod filter;
pub mod rate;

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use wr_domain::config::ChatConfig;
use wr_domain::{
    ChannelKind, ChatMessage, Error, GameState, Participant, Result, SYSTEM_USER,
};

use filter::ContentFilter;
use rate::RateLimiter;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Requests & routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub user_id: String,
    pub content: String,
    pub channel: ChannelKind,
    pub recipients: Option<Vec<String>>,
    pub entity_id: Option<String>,
}

/// Who the room should deliver the message to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// All subscribers of the room.
    Room,
    /// Exactly these users (already includes the sender where due).
    Users(Vec<String>),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ChatService {
    config: ChatConfig,
    limiter: RateLimiter,
    filter: Option<ContentFilter>,
}

impl ChatService {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let filter = if config.filter_enabled {
            Some(ContentFilter::new(
                &config.filter_patterns,
                &config.filter_replacement,
            )?)
        } else {
            None
        };
        let limiter = RateLimiter::new(config.rate_limit_per_minute);
        Ok(Self {
            config,
            limiter,
            filter,
        })
    }

    /// Run the send pipeline. On success the message has been appended to
    /// `state.chat_log` (trimmed to the history bound) and the returned
    /// [`Delivery`] tells the caller who to broadcast it to.
    pub fn send_message(
        &self,
        state: &mut GameState,
        participants: &HashMap<String, Participant>,
        request: SendRequest,
    ) -> Result<(ChatMessage, Delivery)> {
        // 1. Rate limit. The synthetic system principal is exempt — its
        //    messages originate server-side.
        if request.user_id != SYSTEM_USER && !self.limiter.check(&request.user_id) {
            return Err(Error::RateLimited(format!(
                "user {} exceeded {} messages per minute",
                request.user_id, self.config.rate_limit_per_minute
            )));
        }

        // 2. Content validation.
        let content = request.content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("message content is empty".to_owned()));
        }
        if content.chars().count() > self.config.max_message_length {
            return Err(Error::InvalidInput(format!(
                "message exceeds {} characters",
                self.config.max_message_length
            )));
        }

        // 3. Filter; the filtered text replaces the original.
        let content = match &self.filter {
            Some(filter) => filter.apply(content),
            None => content.to_owned(),
        };

        // 4. Construct.
        let message = ChatMessage {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            entity_id: request.entity_id.clone(),
            content,
            channel: request.channel,
            recipients: request.recipients.clone(),
            timestamp: Utc::now(),
        };

        // 5. Permissions.
        self.validate_chat_permissions(&message, participants)?;

        // 6. Routing + append.
        let delivery = route(&message);
        state.chat_log.push_back(message.clone());
        while state.chat_log.len() > self.config.max_history {
            state.chat_log.pop_front();
        }
        state.touch();

        Ok((message, delivery))
    }

    /// Sender and all private recipients must be room participants; only
    /// the synthetic `system` principal may author `system` messages.
    fn validate_chat_permissions(
        &self,
        message: &ChatMessage,
        participants: &HashMap<String, Participant>,
    ) -> Result<()> {
        if message.channel == ChannelKind::System {
            if !message.is_system() {
                return Err(Error::PermissionDenied(
                    "only the system principal may send system messages".to_owned(),
                ));
            }
        } else if !participants.contains_key(&message.user_id) {
            return Err(Error::PermissionDenied(format!(
                "{} is not a participant of this interaction",
                message.user_id
            )));
        }

        if message.channel == ChannelKind::Private {
            let recipients = message
                .recipients
                .as_deref()
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    Error::InvalidInput("private messages require recipients".to_owned())
                })?;
            for recipient in recipients {
                if !participants.contains_key(recipient) {
                    return Err(Error::PermissionDenied(format!(
                        "recipient {recipient} is not a participant"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Visibility-filtered history, newest first.
    pub fn history(
        &self,
        state: &GameState,
        user_id: &str,
        channel: Option<ChannelKind>,
        limit: usize,
    ) -> Vec<ChatMessage> {
        state
            .chat_log
            .iter()
            .rev()
            .filter(|m| channel.map(|c| m.channel == c).unwrap_or(true))
            .filter(|m| m.visible_to(user_id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Total messages visible to the user (before the limit).
    pub fn visible_count(
        &self,
        state: &GameState,
        user_id: &str,
        channel: Option<ChannelKind>,
    ) -> usize {
        state
            .chat_log
            .iter()
            .filter(|m| channel.map(|c| m.channel == c).unwrap_or(true))
            .filter(|m| m.visible_to(user_id))
            .count()
    }

    /// Periodic housekeeping hook for the limiter map.
    pub fn prune_rate_windows(&self) {
        self.limiter.prune();
    }
}

fn route(message: &ChatMessage) -> Delivery {
    match message.channel {
        ChannelKind::Party | ChannelKind::Dm => Delivery::Room,
        ChannelKind::Private => {
            let mut users = vec![message.user_id.clone()];
            if let Some(recipients) = &message.recipients {
                for recipient in recipients {
                    if !users.contains(recipient) {
                        users.push(recipient.clone());
                    }
                }
            }
            Delivery::Users(users)
        }
        ChannelKind::System => match &message.recipients {
            Some(recipients) if !recipients.is_empty() => Delivery::Users(recipients.clone()),
            _ => Delivery::Room,
        },
    }
}
