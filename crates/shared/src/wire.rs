//! Request bodies and response envelopes for the two remote endpoints.
//!
//! The resource endpoint wraps every payload in a single named field
//! (`{"servers": [...]}`, `{"message": {...}}`); the gateway unwraps the
//! field rather than deserializing the raw body.

use serde::{Deserialize, Serialize};

use crate::domain::{Channel, ChannelId, Member, Message, Server};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthAction {
    Register,
    Login,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub action: AuthAction,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

/// Error body returned by either endpoint on a non-success status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub channel_id: ChannelId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServersEnvelope {
    pub servers: Vec<Server>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEnvelope {
    pub server: Server,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsEnvelope {
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesEnvelope {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersEnvelope {
    pub members: Vec<Member>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_request_omits_absent_username() {
        let body = AuthRequest {
            action: AuthAction::Login,
            email: "a@b.c".to_string(),
            username: None,
            password: "pw".to_string(),
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["action"], "login");
        assert!(json.get("username").is_none());
    }

    #[test]
    fn servers_envelope_unwraps_named_field() {
        let envelope: ServersEnvelope = serde_json::from_str(
            r#"{"servers":[{"id":"s1","name":"home","icon":"🚀","owner_id":1,"created_at":null}]}"#,
        )
        .expect("envelope json");
        assert_eq!(envelope.servers.len(), 1);
        assert_eq!(envelope.servers[0].name, "home");
    }
}
