//! Remote resource gateway: one operation per resource kind against the two
//! fixed service endpoints.
//!
//! The auth endpoint is a single POST whose `action` body field selects
//! register or login. The resource endpoint is one URL where a `path` query
//! parameter selects the resource kind; every authenticated request carries
//! the session token in the `X-Auth-Token` header.

use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    domain::{AuthSession, Channel, ChannelId, Member, Message, Server, ServerId},
    wire::{
        AuthAction, AuthRequest, ChannelsEnvelope, CreateServerRequest, ErrorBody,
        MembersEnvelope, MessageEnvelope, MessagesEnvelope, SendMessageRequest, ServerEnvelope,
        ServersEnvelope,
    },
};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::credentials::CredentialStore;

pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

const REGISTER_REJECTED_DEFAULT: &str = "Registration failed";
const LOGIN_REJECTED_DEFAULT: &str = "Login failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    ListServers,
    CreateServer,
    ListChannels,
    ListMessages,
    SendMessage,
    ListMembers,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Register => "register",
            Operation::Login => "log in",
            Operation::ListServers => "load servers",
            Operation::CreateServer => "create server",
            Operation::ListChannels => "load channels",
            Operation::ListMessages => "load messages",
            Operation::SendMessage => "send message",
            Operation::ListMembers => "load members",
        };
        f.write_str(label)
    }
}

/// Failure taxonomy for every gateway operation.
///
/// `RequestFailed` deliberately collapses 4xx, 5xx and transport-level
/// failures into one undifferentiated case; the service offers no contract
/// worth distinguishing them by.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No credential is present; the network call was never issued.
    #[error("not authenticated")]
    Unauthenticated,
    /// The auth endpoint refused the register/login exchange. The message is
    /// the service's own wording when it supplied one.
    #[error("{0}")]
    AuthRejected(String),
    #[error("failed to {0}")]
    RequestFailed(Operation),
}

#[async_trait]
pub trait ResourceGateway: Send + Sync {
    async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthSession, GatewayError>;
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, GatewayError>;
    async fn list_servers(&self) -> Result<Vec<Server>, GatewayError>;
    async fn create_server(&self, name: &str, icon: &str) -> Result<Server, GatewayError>;
    async fn list_channels(&self, server_id: &ServerId) -> Result<Vec<Channel>, GatewayError>;
    async fn list_messages(&self, channel_id: &ChannelId) -> Result<Vec<Message>, GatewayError>;
    async fn send_message(
        &self,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<Message, GatewayError>;
    async fn list_members(&self, server_id: &ServerId) -> Result<Vec<Member>, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub auth_url: Url,
    pub api_url: Url,
}

impl GatewayConfig {
    pub fn new(auth_url: &str, api_url: &str) -> Result<Self> {
        Ok(Self {
            auth_url: Url::parse(auth_url)
                .with_context(|| format!("invalid auth endpoint url '{auth_url}'"))?,
            api_url: Url::parse(api_url)
                .with_context(|| format!("invalid api endpoint url '{api_url}'"))?,
        })
    }
}

pub struct HttpGateway {
    http: Client,
    config: GatewayConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            http: Client::new(),
            config,
            credentials,
        }
    }

    async fn auth_token(&self, operation: Operation) -> Result<String, GatewayError> {
        let token = self.credentials.get().await.map_err(|err| {
            warn!(error = %err, %operation, "credential store read failed");
            GatewayError::Unauthenticated
        })?;
        token.ok_or(GatewayError::Unauthenticated)
    }

    fn api_url_for(&self, path: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.config.api_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("path", path);
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    async fn get_resource<T: DeserializeOwned>(
        &self,
        operation: Operation,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let token = self.auth_token(operation).await?;
        let response = self
            .http
            .get(self.api_url_for(path, params))
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|err| request_failed(operation, &err))?;
        decode_resource(operation, response).await
    }

    async fn post_resource<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: Operation,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let token = self.auth_token(operation).await?;
        let response = self
            .http
            .post(self.api_url_for(path, &[]))
            .header(AUTH_TOKEN_HEADER, token)
            .json(body)
            .send()
            .await
            .map_err(|err| request_failed(operation, &err))?;
        decode_resource(operation, response).await
    }

    async fn auth_exchange(
        &self,
        operation: Operation,
        body: &AuthRequest,
        rejected_default: &str,
    ) -> Result<AuthSession, GatewayError> {
        let response = self
            .http
            .post(self.config.auth_url.clone())
            .json(body)
            .send()
            .await
            .map_err(|err| request_failed(operation, &err))?;

        if response.status().is_success() {
            return response
                .json::<AuthSession>()
                .await
                .map_err(|err| request_failed(operation, &err));
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => rejected_default.to_string(),
        };
        Err(GatewayError::AuthRejected(message))
    }
}

async fn decode_resource<T: DeserializeOwned>(
    operation: Operation,
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    if !response.status().is_success() {
        warn!(%operation, status = %response.status(), "resource endpoint returned non-success");
        return Err(GatewayError::RequestFailed(operation));
    }
    response
        .json::<T>()
        .await
        .map_err(|err| request_failed(operation, &err))
}

fn request_failed(operation: Operation, err: &dyn fmt::Display) -> GatewayError {
    warn!(%operation, error = %err, "gateway request failed");
    GatewayError::RequestFailed(operation)
}

#[async_trait]
impl ResourceGateway for HttpGateway {
    async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthSession, GatewayError> {
        self.auth_exchange(
            Operation::Register,
            &AuthRequest {
                action: AuthAction::Register,
                email: email.to_string(),
                username: Some(username.to_string()),
                password: password.to_string(),
            },
            REGISTER_REJECTED_DEFAULT,
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, GatewayError> {
        self.auth_exchange(
            Operation::Login,
            &AuthRequest {
                action: AuthAction::Login,
                email: email.to_string(),
                username: None,
                password: password.to_string(),
            },
            LOGIN_REJECTED_DEFAULT,
        )
        .await
    }

    async fn list_servers(&self) -> Result<Vec<Server>, GatewayError> {
        let envelope: ServersEnvelope = self
            .get_resource(Operation::ListServers, "servers", &[])
            .await?;
        Ok(envelope.servers)
    }

    async fn create_server(&self, name: &str, icon: &str) -> Result<Server, GatewayError> {
        let envelope: ServerEnvelope = self
            .post_resource(
                Operation::CreateServer,
                "servers",
                &CreateServerRequest {
                    name: name.to_string(),
                    icon: icon.to_string(),
                },
            )
            .await?;
        Ok(envelope.server)
    }

    async fn list_channels(&self, server_id: &ServerId) -> Result<Vec<Channel>, GatewayError> {
        let envelope: ChannelsEnvelope = self
            .get_resource(
                Operation::ListChannels,
                "channels",
                &[("server_id", server_id.0.as_str())],
            )
            .await?;
        Ok(envelope.channels)
    }

    async fn list_messages(&self, channel_id: &ChannelId) -> Result<Vec<Message>, GatewayError> {
        let envelope: MessagesEnvelope = self
            .get_resource(
                Operation::ListMessages,
                "messages",
                &[("channel_id", channel_id.0.as_str())],
            )
            .await?;
        Ok(envelope.messages)
    }

    async fn send_message(
        &self,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<Message, GatewayError> {
        let envelope: MessageEnvelope = self
            .post_resource(
                Operation::SendMessage,
                "messages",
                &SendMessageRequest {
                    channel_id: channel_id.clone(),
                    content: content.to_string(),
                },
            )
            .await?;
        Ok(envelope.message)
    }

    async fn list_members(&self, server_id: &ServerId) -> Result<Vec<Member>, GatewayError> {
        let envelope: MembersEnvelope = self
            .get_resource(
                Operation::ListMembers,
                "members",
                &[("server_id", server_id.0.as_str())],
            )
            .await?;
        Ok(envelope.members)
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
