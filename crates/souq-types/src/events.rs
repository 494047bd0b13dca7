use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway. Real-time delivery is a
/// best-effort notification layer on top of the durable message log;
/// clients must not treat it as a delivery guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, full_name: String },

    /// A new message was posted in a conversation
    MessageNew {
        id: Uuid,
        conversation_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        body: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A user started typing in a conversation
    TypingStart {
        conversation_id: Uuid,
        user_id: Uuid,
        full_name: String,
    },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        online: bool,
    },

    /// A campaign application changed state (targeted at the creator)
    ApplicationUpdate {
        application_id: Uuid,
        campaign_id: Uuid,
        status: String,
    },
}

impl GatewayEvent {
    /// Returns the conversation_id if this event is scoped to a specific
    /// conversation. Events that return `None` are global and are
    /// delivered to all (or targeted) clients.
    pub fn conversation_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageNew { conversation_id, .. } => Some(*conversation_id),
            Self::TypingStart { conversation_id, .. } => Some(*conversation_id),
            // Ready, PresenceUpdate, ApplicationUpdate are not conversation-scoped
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Subscribe to events for specific conversations. The server only
    /// forwards conversation-scoped events for subscribed rooms.
    Subscribe { conversation_ids: Vec<Uuid> },

    /// Indicate typing in a conversation
    StartTyping { conversation_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_events_are_conversation_scoped() {
        let cid = Uuid::new_v4();
        let event = GatewayEvent::TypingStart {
            conversation_id: cid,
            user_id: Uuid::new_v4(),
            full_name: "Amina".into(),
        };
        assert_eq!(event.conversation_id(), Some(cid));

        let presence = GatewayEvent::PresenceUpdate {
            user_id: Uuid::new_v4(),
            online: true,
        };
        assert_eq!(presence.conversation_id(), None);
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let raw = r#"{"type":"Identify","data":{"token":"abc"}}"#;
        match serde_json::from_str::<GatewayCommand>(raw).unwrap() {
            GatewayCommand::Identify { token } => assert_eq!(token, "abc"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
