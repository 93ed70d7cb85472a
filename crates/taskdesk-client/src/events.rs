//! Session lifecycle events.
//!
//! The UI layer subscribes here to learn that a session has ended and the
//! user has to log in again. What it does in response (navigation, prompts)
//! is up to the subscriber.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a session ended without the user logging out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// The refresh endpoint rejected the refresh token.
    RefreshRejected,
    /// An authorization failure arrived but no refresh token was stored.
    MissingRefreshToken,
}

impl SessionEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefreshRejected => "refresh token rejected",
            Self::MissingRefreshToken => "no refresh token stored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A login stored a fresh credential record.
    SessionStarted { generation: u64 },
    /// The access token was replaced after a successful refresh.
    AccessTokenRefreshed { generation: u64 },
    /// The session could not be recovered. The credential store has already
    /// been cleared when this is published.
    SessionEnded { reason: SessionEndReason },
}

impl SessionEvent {
    pub fn description(&self) -> String {
        match self {
            Self::SessionStarted { generation } => {
                format!("Session started (generation {})", generation)
            }
            Self::AccessTokenRefreshed { generation } => {
                format!("Access token refreshed (generation {})", generation)
            }
            Self::SessionEnded { reason } => format!("Session ended: {}", reason.as_str()),
        }
    }

    #[inline]
    pub fn is_session_ended(&self) -> bool {
        matches!(self, Self::SessionEnded { .. })
    }
}

/// Default channel capacity for session events.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Broadcaster for session events.
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    ///
    /// Returns the number of receivers that received the event, 0 when
    /// nobody is subscribed.
    pub fn publish(&self, event: SessionEvent) -> usize {
        tracing::debug!("Publishing session event: {}", event.description());
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let events = SessionEvents::new();
        assert_eq!(events.publish(SessionEvent::SessionStarted { generation: 1 }), 0);

        let mut rx = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);
        let delivered = events.publish(SessionEvent::SessionEnded {
            reason: SessionEndReason::RefreshRejected,
        });
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert!(event.is_session_ended());
        assert_eq!(event.description(), "Session ended: refresh token rejected");
    }
}
