//! Client-side data layer for the chat service.
//!
//! [`ChatClient`] owns the session lifecycle and the four resource
//! collections (servers, channels, messages, members), reacting to user
//! intents by issuing the correct cascade of gateway fetches: session
//! established loads servers, selecting a server loads its channels and
//! members, selecting a channel loads its messages. Locally-originated
//! mutations merge the service's confirmed result into state instead of
//! re-fetching the owning collection. Presentation layers never mutate
//! state directly; they dispatch intents and render broadcast events.

use std::sync::Arc;

use anyhow::Result;
use shared::domain::{
    AuthSession, Channel, ChannelId, ChannelKind, Member, Message, Server, ServerId, User,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod credentials;
pub mod gateway;
pub mod notify;

pub use credentials::{CredentialStore, DurableCredentialStore, MemoryCredentialStore};
pub use gateway::{GatewayConfig, GatewayError, HttpGateway, Operation, ResourceGateway};
pub use notify::{Notice, NoticeContext};

/// Icon applied when a create-server form leaves the icon blank; matches the
/// service-side default.
const DEFAULT_SERVER_ICON: &str = "🚀";

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// `user` is `None` when the session was resumed from a stored credential
    /// rather than a fresh register/login exchange.
    SessionEstablished { user: Option<User> },
    SessionCleared,
    ServersUpdated(Vec<Server>),
    ChannelsUpdated(Vec<Channel>),
    MessagesUpdated(Vec<Message>),
    MembersUpdated(Vec<Member>),
    ServerSelected(Option<ServerId>),
    ChannelSelected(Option<ChannelId>),
    MessageAppended(Message),
    ServerCreated(Server),
    Notice(Notice),
}

#[derive(Default)]
struct ClientState {
    user: Option<User>,
    selected_server: Option<ServerId>,
    selected_channel: Option<ChannelId>,
    servers: Vec<Server>,
    channels: Vec<Channel>,
    messages: Vec<Message>,
    members: Vec<Member>,
    // Fence counters: a fetch only commits if the epoch it captured at
    // dispatch still matches, so responses from superseded selections are
    // discarded instead of overwriting newer state.
    server_epoch: u64,
    channel_epoch: u64,
}

/// Read-only copy of the client state for rendering.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub user: Option<User>,
    pub selected_server: Option<ServerId>,
    pub selected_channel: Option<ChannelId>,
    pub servers: Vec<Server>,
    pub channels: Vec<Channel>,
    pub messages: Vec<Message>,
    pub members: Vec<Member>,
}

pub struct ChatClient {
    gateway: Arc<dyn ResourceGateway>,
    credentials: Arc<dyn CredentialStore>,
    inner: Mutex<ClientState>,
    events: broadcast::Sender<ClientEvent>,
}

impl ChatClient {
    pub fn new(gateway: Arc<dyn ResourceGateway>, credentials: Arc<dyn CredentialStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            gateway,
            credentials,
            inner: Mutex::new(ClientState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let guard = self.inner.lock().await;
        StateSnapshot {
            user: guard.user.clone(),
            selected_server: guard.selected_server.clone(),
            selected_channel: guard.selected_channel.clone(),
            servers: guard.servers.clone(),
            channels: guard.channels.clone(),
            messages: guard.messages.clone(),
            members: guard.members.clone(),
        }
    }

    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<()> {
        let session = match self.gateway.register(email, username, password).await {
            Ok(session) => session,
            Err(err) => {
                self.report_failure(&err);
                return Err(err.into());
            }
        };
        self.install_session(session).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let session = match self.gateway.login(email, password).await {
            Ok(session) => session,
            Err(err) => {
                self.report_failure(&err);
                return Err(err.into());
            }
        };
        self.install_session(session).await
    }

    /// Re-enter an authenticated session from a credential persisted by an
    /// earlier run. Returns `false` when no credential is stored.
    pub async fn resume(&self) -> Result<bool> {
        if self.credentials.get().await?.is_none() {
            return Ok(false);
        }
        info!("resuming session from stored credential");
        let _ = self
            .events
            .send(ClientEvent::SessionEstablished { user: None });
        self.establish_session().await?;
        Ok(true)
    }

    async fn install_session(&self, session: AuthSession) -> Result<()> {
        self.credentials.set(&session.token).await?;
        {
            let mut guard = self.inner.lock().await;
            guard.user = Some(session.user.clone());
        }
        info!(user = %session.user.username, "session established");
        let _ = self.events.send(ClientEvent::SessionEstablished {
            user: Some(session.user),
        });
        self.establish_session().await
    }

    /// Session-established transition: load the server list and, when nothing
    /// is selected yet, select the first server in list order.
    ///
    /// A failed list load tears the whole session down. The service does not
    /// distinguish an expired credential from a transient fault here, so any
    /// failure is treated as session expiry.
    async fn establish_session(&self) -> Result<()> {
        let servers = match self.gateway.list_servers().await {
            Ok(servers) => servers,
            Err(err) => {
                warn!(error = %err, "server list load failed; tearing down session");
                self.report_failure(&err);
                self.force_logout().await?;
                return Ok(());
            }
        };

        let default_server = {
            let mut guard = self.inner.lock().await;
            guard.servers = servers.clone();
            if guard.selected_server.is_none() {
                servers.first().map(|server| server.id.clone())
            } else {
                None
            }
        };
        let _ = self.events.send(ClientEvent::ServersUpdated(servers));

        if let Some(server_id) = default_server {
            self.select_server(server_id).await?;
        }
        Ok(())
    }

    /// Server-selected transition: drop state tied to the previous server,
    /// then load the new server's channel and member lists concurrently.
    /// The two legs commit and fail independently of each other.
    pub async fn select_server(&self, server_id: ServerId) -> Result<()> {
        let epoch = {
            let mut guard = self.inner.lock().await;
            guard.server_epoch += 1;
            guard.channel_epoch += 1;
            guard.selected_server = Some(server_id.clone());
            guard.selected_channel = None;
            guard.channels.clear();
            guard.members.clear();
            guard.messages.clear();
            guard.server_epoch
        };
        let _ = self
            .events
            .send(ClientEvent::ServerSelected(Some(server_id.clone())));
        let _ = self.events.send(ClientEvent::ChannelSelected(None));

        let (channels, members) = tokio::join!(
            self.gateway.list_channels(&server_id),
            self.gateway.list_members(&server_id),
        );

        match members {
            Ok(members) => self.commit_members(epoch, members).await,
            Err(err) => self.report_failure(&err),
        }

        let default_channel = match channels {
            Ok(channels) => self.commit_channels(epoch, channels).await,
            Err(err) => {
                self.report_failure(&err);
                None
            }
        };

        if let Some(channel_id) = default_channel {
            self.select_channel(channel_id).await?;
        }
        Ok(())
    }

    /// Commits a channel list and returns the default selection: the first
    /// text channel, or none. Voice channels are never auto-selected.
    async fn commit_channels(&self, epoch: u64, channels: Vec<Channel>) -> Option<ChannelId> {
        let default = {
            let mut guard = self.inner.lock().await;
            if guard.server_epoch != epoch {
                debug!(epoch, "discarding stale channel list response");
                return None;
            }
            guard.channels = channels.clone();
            channels
                .iter()
                .find(|channel| channel.kind == ChannelKind::Text)
                .map(|channel| channel.id.clone())
        };
        let _ = self.events.send(ClientEvent::ChannelsUpdated(channels));
        default
    }

    async fn commit_members(&self, epoch: u64, members: Vec<Member>) {
        {
            let mut guard = self.inner.lock().await;
            if guard.server_epoch != epoch {
                debug!(epoch, "discarding stale member list response");
                return;
            }
            guard.members = members.clone();
        }
        let _ = self.events.send(ClientEvent::MembersUpdated(members));
    }

    /// Channel-selected transition: replace the message collection with the
    /// chosen channel's messages. Ids outside the current server's channel
    /// list are ignored.
    pub async fn select_channel(&self, channel_id: ChannelId) -> Result<()> {
        let epoch = {
            let mut guard = self.inner.lock().await;
            if !guard.channels.iter().any(|channel| channel.id == channel_id) {
                debug!(channel = %channel_id.0, "ignoring selection of unknown channel");
                return Ok(());
            }
            guard.channel_epoch += 1;
            guard.selected_channel = Some(channel_id.clone());
            guard.messages.clear();
            guard.channel_epoch
        };
        let _ = self
            .events
            .send(ClientEvent::ChannelSelected(Some(channel_id.clone())));

        match self.gateway.list_messages(&channel_id).await {
            Ok(messages) => {
                let committed = {
                    let mut guard = self.inner.lock().await;
                    if guard.channel_epoch != epoch {
                        debug!(epoch, "discarding stale message list response");
                        false
                    } else {
                        guard.messages = messages.clone();
                        true
                    }
                };
                if committed {
                    let _ = self.events.send(ClientEvent::MessagesUpdated(messages));
                }
            }
            Err(err) => self.report_failure(&err),
        }
        Ok(())
    }

    /// Explicit logout. A no-op when already unauthenticated.
    pub async fn logout(&self) -> Result<()> {
        info!("logging out");
        self.force_logout().await
    }

    async fn force_logout(&self) -> Result<()> {
        self.credentials.clear().await?;
        {
            let mut guard = self.inner.lock().await;
            // Epochs keep counting up so in-flight fetches from the dead
            // session can never commit.
            let server_epoch = guard.server_epoch + 1;
            let channel_epoch = guard.channel_epoch + 1;
            *guard = ClientState {
                server_epoch,
                channel_epoch,
                ..ClientState::default()
            };
        }
        let _ = self.events.send(ClientEvent::SessionCleared);
        Ok(())
    }

    /// Create-server mutation: on success the created server is appended to
    /// the local list and selected; the list is not re-fetched.
    pub async fn create_server(&self, name: &str, icon: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            self.report_validation("server name is required");
            return Ok(());
        }
        let icon = if icon.trim().is_empty() {
            DEFAULT_SERVER_ICON
        } else {
            icon
        };

        match self.gateway.create_server(name, icon).await {
            Ok(server) => {
                let server_id = self.apply_created_server(server).await;
                self.select_server(server_id).await?;
            }
            Err(err) => self.report_failure(&err),
        }
        Ok(())
    }

    /// Send-message mutation: the confirmed message is appended at the end of
    /// the current collection; no re-fetch occurs.
    pub async fn send_message(&self, content: &str) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            self.report_validation("message text is required");
            return Ok(());
        }
        let (channel_id, epoch) = {
            let guard = self.inner.lock().await;
            (guard.selected_channel.clone(), guard.channel_epoch)
        };
        let Some(channel_id) = channel_id else {
            self.report_validation("no channel selected");
            return Ok(());
        };

        match self.gateway.send_message(&channel_id, content).await {
            Ok(message) => self.apply_sent_message(epoch, message).await,
            Err(err) => self.report_failure(&err),
        }
        Ok(())
    }

    // The two apply functions below are the single seam through which
    // mutation results enter local state; a reconciling re-fetch could be
    // substituted here without touching call sites.

    async fn apply_created_server(&self, server: Server) -> ServerId {
        let servers = {
            let mut guard = self.inner.lock().await;
            guard.servers.push(server.clone());
            guard.servers.clone()
        };
        let _ = self.events.send(ClientEvent::ServerCreated(server.clone()));
        let _ = self.events.send(ClientEvent::ServersUpdated(servers));
        server.id
    }

    async fn apply_sent_message(&self, epoch: u64, message: Message) {
        {
            let mut guard = self.inner.lock().await;
            if guard.channel_epoch != epoch {
                debug!(message = %message.id.0, "dropping send result for a superseded channel selection");
                return;
            }
            guard.messages.push(message.clone());
        }
        let _ = self.events.send(ClientEvent::MessageAppended(message));
    }

    fn report_failure(&self, err: &GatewayError) {
        warn!(error = %err, "gateway call failed");
        let _ = self
            .events
            .send(ClientEvent::Notice(Notice::from_gateway_failure(err)));
    }

    fn report_validation(&self, text: &str) {
        let _ = self
            .events
            .send(ClientEvent::Notice(Notice::validation(text)));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
