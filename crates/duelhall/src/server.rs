//! `DuelhallServer` builder and accept loop.
//!
//! This is the entry point for running a venue server. It ties together
//! all the layers: WebSocket → protocol → orchestrator → lobby / matches.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use duelhall_broadcast::ChannelHub;
use duelhall_lobby::LobbyConfig;
use duelhall_match::MatchConfig;
use duelhall_protocol::JsonCodec;
use duelhall_session::{AdminGate, Authenticator, StaticAdminKey};
use duelhall_store::Store;
use tokio::net::TcpListener;

use crate::handler::handle_connection;
use crate::{DuelError, Orchestrator, ServerConfig, config};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S: Store, A: Authenticator, G: AdminGate> {
    pub(crate) orchestrator: Orchestrator<S, ChannelHub>,
    pub(crate) hub: Arc<ChannelHub>,
    pub(crate) auth: A,
    pub(crate) admin: G,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Duelhall server.
///
/// # Example
///
/// ```rust,ignore
/// use duelhall::prelude::*;
///
/// let server = DuelhallServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(store, NumericTokenAuthenticator, StaticAdminKey::new("secret"))
///     .await?;
/// server.run().await
/// ```
pub struct DuelhallServerBuilder {
    bind_addr: String,
    lobby: LobbyConfig,
    matches: MatchConfig,
    idle_timeout: Duration,
}

impl DuelhallServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: config::DEFAULT_BIND.to_string(),
            lobby: LobbyConfig::default(),
            matches: MatchConfig::default(),
            idle_timeout: config::DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Starts from a loaded [`ServerConfig`]. The admin key is applied by
    /// [`build_with_config`](Self::build_with_config).
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind.clone(),
            lobby: config.lobby.clone(),
            matches: config.matches.clone(),
            idle_timeout: config.idle_timeout,
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby = config;
        self
    }

    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.matches = config;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and wires the engine to `store`.
    pub async fn build<S, A, G>(
        self,
        store: Arc<S>,
        auth: A,
        admin: G,
    ) -> Result<DuelhallServer<S, A, G>, DuelError>
    where
        S: Store,
        A: Authenticator,
        G: AdminGate,
    {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "listening");

        let hub = Arc::new(ChannelHub::new());
        let state = Arc::new(ServerState {
            orchestrator: Orchestrator::new(store, Arc::clone(&hub), self.lobby, self.matches),
            hub,
            auth,
            admin,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(DuelhallServer { listener, state })
    }

    /// [`build`](Self::build) with the admin key from `config`.
    pub async fn build_with_config<S, A>(
        self,
        config: &ServerConfig,
        store: Arc<S>,
        auth: A,
    ) -> Result<DuelhallServer<S, A, StaticAdminKey>, DuelError>
    where
        S: Store,
        A: Authenticator,
    {
        self.build(store, auth, StaticAdminKey::new(config.admin_key.clone()))
            .await
    }
}

impl Default for DuelhallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Duelhall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DuelhallServer<S: Store, A: Authenticator, G: AdminGate> {
    listener: TcpListener,
    state: Arc<ServerState<S, A, G>>,
}

impl<S, A, G> DuelhallServer<S, A, G>
where
    S: Store,
    A: Authenticator,
    G: AdminGate,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the expiry sweeper and the accept loop until the process is
    /// terminated.
    ///
    /// Each connection gets its own task; the WebSocket upgrade happens
    /// there so a slow client cannot stall the loop.
    pub async fn run(self) -> Result<(), DuelError> {
        let _sweeper = SweeperGuard(self.state.orchestrator.spawn_sweeper());
        tracing::info!("duelhall server running");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, state).await {
                            tracing::debug!(%addr, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Stops the sweeper when `run` is dropped.
struct SweeperGuard(tokio::task::JoinHandle<()>);

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
