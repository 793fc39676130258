//! Per-connection handler: handshake, role checks, and action routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Upgrade to WebSocket
//!   2. Receive `Hello` or `AdminHello` → resolve the caller's role
//!   3. Send `Welcome`
//!   4. Loop: client frames → orchestrator → `Reply`/`Error`; events from
//!      subscribed channels → `Event` frames; close when idle

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use duelhall_broadcast::{ChannelHub, EventSender, SubscriberId};
use duelhall_lobby::Decision;
use duelhall_protocol::{
    Action, ClientFrame, Codec, ParticipantId, ProtocolError, Reply, ServerFrame,
};
use duelhall_session::{AdminGate, Authenticator};
use duelhall_store::Store;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::DuelError;
use crate::server::{PROTOCOL_VERSION, ServerState};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a connection in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Who is on the other end, decided by the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Caller {
    Participant(ParticipantId),
    Admin,
}

impl Caller {
    fn participant(self) -> Result<ParticipantId, DuelError> {
        match self {
            Self::Participant(id) => Ok(id),
            Self::Admin => Err(DuelError::Forbidden("participant connections only")),
        }
    }

    fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

/// Drops every channel subscription of the connection when the handler
/// exits, panics included.
struct SubscriptionGuard {
    id: SubscriberId,
    hub: Arc<ChannelHub>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe_all(self.id);
    }
}

/// What one WebSocket message amounts to.
enum Incoming {
    Frame(Vec<u8>),
    /// Ping, pong, and raw frames; tungstenite answers pings itself.
    Skip,
    Closed,
}

impl Incoming {
    fn from_ws(msg: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>) -> Result<Self, DuelError> {
        match msg {
            Some(Ok(Message::Text(text))) => Ok(Self::Frame(text.as_bytes().to_vec())),
            Some(Ok(Message::Binary(data))) => Ok(Self::Frame(data.to_vec())),
            Some(Ok(Message::Close(_))) | None => Ok(Self::Closed),
            Some(Ok(_)) => Ok(Self::Skip),
            Some(Err(e)) => Err(e.into()),
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, A, G>(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState<S, A, G>>,
) -> Result<(), DuelError>
where
    S: Store,
    A: Authenticator,
    G: AdminGate,
{
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let conn_id = ConnectionId::next();
    tracing::debug!(%conn_id, %addr, "accepted WebSocket connection");
    let (mut sink, mut source) = ws.split();

    // --- Step 1: Handshake ---
    let caller = perform_handshake(&mut sink, &mut source, &state).await?;
    tracing::info!(%conn_id, ?caller, "connection authenticated");

    let registration = state.hub.register();
    let subscriber = registration.id;
    let _guard = SubscriptionGuard {
        id: subscriber,
        hub: Arc::clone(&state.hub),
    };
    let (events_tx, mut events_rx) = mpsc::channel(state.hub.buffer());

    // --- Step 2: Message loop ---
    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            msg = source.next() => {
                let data = match Incoming::from_ws(msg) {
                    Ok(Incoming::Frame(data)) => data,
                    Ok(Incoming::Skip) => continue,
                    Ok(Incoming::Closed) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + state.idle_timeout);

                let frame: ClientFrame = match state.codec.decode(&data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode frame");
                        send_error(&mut sink, &state, 0, &e.into()).await?;
                        continue;
                    }
                };

                let id = frame.id;
                let out = match dispatch(&state, caller, subscriber, &events_tx, frame.action).await {
                    Ok(body) => ServerFrame::Reply { id, body },
                    Err(e) => {
                        tracing::debug!(%conn_id, id, error = %e, "action rejected");
                        error_frame(id, &e)
                    }
                };
                send_frame(&mut sink, &state, &out).await?;
            }
            Some((channel, event)) = events_rx.recv() => {
                send_frame(&mut sink, &state, &ServerFrame::Event { channel, event }).await?;
            }
            () = registration.evicted() => {
                tracing::warn!(%conn_id, "client not reading events, closing connection");
                break;
            }
            () = &mut idle => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        }
    }

    let _ = sink.close().await;
    // _guard drops here → subscriptions released.
    Ok(())
}

/// Receives the first frame and resolves it into a [`Caller`].
///
/// Anything but a valid `Hello`/`AdminHello` gets an `Error` frame and
/// ends the connection.
async fn perform_handshake<S, A, G>(
    sink: &mut WsSink,
    source: &mut WsSource,
    state: &Arc<ServerState<S, A, G>>,
) -> Result<Caller, DuelError>
where
    S: Store,
    A: Authenticator,
    G: AdminGate,
{
    let data = loop {
        let msg = tokio::time::timeout(state.idle_timeout, source.next())
            .await
            .map_err(|_| ProtocolError::InvalidMessage("handshake timed out".into()))?;
        match Incoming::from_ws(msg)? {
            Incoming::Frame(data) => break data,
            Incoming::Skip => continue,
            Incoming::Closed => {
                return Err(
                    ProtocolError::InvalidMessage("connection closed before handshake".into()).into(),
                );
            }
        }
    };

    let frame: ClientFrame = match state.codec.decode(&data) {
        Ok(frame) => frame,
        Err(e) => {
            let e = DuelError::from(e);
            send_error(sink, state, 0, &e).await?;
            return Err(e);
        }
    };

    let result = resolve_caller(state, frame.action).await;
    let caller = match result {
        Ok(caller) => caller,
        Err(e) => {
            tracing::warn!(error = %e, "handshake rejected");
            send_error(sink, state, frame.id, &e).await?;
            return Err(e);
        }
    };

    let welcome = Reply::Welcome {
        participant: caller.participant().ok(),
        admin: caller.is_admin(),
        server_time: Utc::now().timestamp_millis(),
    };
    send_frame(sink, state, &ServerFrame::Reply { id: frame.id, body: welcome }).await?;
    Ok(caller)
}

async fn resolve_caller<S, A, G>(
    state: &ServerState<S, A, G>,
    action: Action,
) -> Result<Caller, DuelError>
where
    S: Store,
    A: Authenticator,
    G: AdminGate,
{
    match action {
        Action::Hello { version, token } => {
            check_version(version)?;
            let participant = state.auth.authenticate(&token).await?;
            Ok(Caller::Participant(participant))
        }
        Action::AdminHello { version, key } => {
            check_version(version)?;
            state.admin.verify(&key)?;
            Ok(Caller::Admin)
        }
        _ => Err(ProtocolError::InvalidMessage(
            "first frame must be Hello or AdminHello".into(),
        )
        .into()),
    }
}

fn check_version(version: u32) -> Result<(), DuelError> {
    if version == PROTOCOL_VERSION {
        Ok(())
    } else {
        Err(ProtocolError::InvalidMessage(format!(
            "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
        ))
        .into())
    }
}

/// Routes one action to the orchestrator or the hub.
async fn dispatch<S, A, G>(
    state: &ServerState<S, A, G>,
    caller: Caller,
    subscriber: SubscriberId,
    events: &EventSender,
    action: Action,
) -> Result<Reply, DuelError>
where
    S: Store,
    A: Authenticator,
    G: AdminGate,
{
    if action.requires_admin() && !caller.is_admin() {
        return Err(DuelError::Forbidden("admin connections only"));
    }
    let orch = &state.orchestrator;

    let reply = match action {
        Action::Hello { .. } | Action::AdminHello { .. } => {
            return Err(ProtocolError::InvalidMessage("handshake already done".into()).into());
        }
        Action::Ping => Reply::Pong,
        Action::Subscribe { channel } => {
            state.hub.attach(channel, subscriber, events.clone());
            Reply::Subscribed { channel }
        }
        Action::Unsubscribe { channel } => {
            state.hub.unsubscribe(channel, subscriber);
            Reply::Unsubscribed { channel }
        }
        Action::ListGames => Reply::Games {
            games: orch.list_games(),
        },
        Action::CheckIn { qr_token } => {
            let check_in = orch.check_in(caller.participant()?, &qr_token).await?;
            Reply::CheckedIn {
                session: check_in.session,
                table: check_in.table,
            }
        }
        Action::CheckOut { session_id } => {
            orch.check_out(caller.participant()?, session_id).await?;
            Reply::CheckedOut
        }
        Action::CreateRequest { session_id, variant } => Reply::Request {
            request: orch
                .create_request(caller.participant()?, session_id, variant)
                .await?,
        },
        Action::AcceptRequest {
            request_id,
            session_id,
        } => Reply::Request {
            request: orch
                .accept_request(caller.participant()?, request_id, session_id)
                .await?,
        },
        Action::ListRequests { venue_id } => Reply::Requests {
            requests: orch.list_active_requests(venue_id).await?,
        },
        Action::ListAwaitingAdmin => Reply::Requests {
            requests: orch.list_awaiting_admin().await?,
        },
        Action::Decide {
            request_id,
            approve,
        } => match orch.decide(request_id, approve).await? {
            Decision::Approved(record) => Reply::Match { record },
            Decision::Denied(request_id) => Reply::Denied { request_id },
        },
        Action::ReflexReady { match_id } => {
            orch.reflex_ready(caller.participant()?, match_id).await?;
            Reply::Ack
        }
        Action::ReflexTap { match_id } => {
            orch.reflex_tap(caller.participant()?, match_id).await?;
            Reply::Ack
        }
        Action::QuizReady { match_id } => {
            orch.quiz_ready(caller.participant()?, match_id).await?;
            Reply::Ack
        }
        Action::QuizAnswer {
            match_id,
            index,
            value,
        } => {
            orch.quiz_answer(caller.participant()?, match_id, index, value)
                .await?;
            Reply::Ack
        }
        Action::Leaderboard { period } => Reply::Leaderboard {
            entries: orch.leaderboard(period).await?,
        },
    };
    Ok(reply)
}

fn error_frame(id: u64, err: &DuelError) -> ServerFrame {
    ServerFrame::Error {
        id,
        code: err.code(),
        message: err.to_string(),
    }
}

async fn send_error<S, A, G>(
    sink: &mut WsSink,
    state: &ServerState<S, A, G>,
    id: u64,
    err: &DuelError,
) -> Result<(), DuelError>
where
    S: Store,
    A: Authenticator,
    G: AdminGate,
{
    send_frame(sink, state, &error_frame(id, err)).await
}

/// Encodes a frame and writes it as a text message.
async fn send_frame<S, A, G>(
    sink: &mut WsSink,
    state: &ServerState<S, A, G>,
    frame: &ServerFrame,
) -> Result<(), DuelError>
where
    S: Store,
    A: Authenticator,
    G: AdminGate,
{
    let bytes = state.codec.encode(frame)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| ProtocolError::InvalidMessage(format!("frame is not UTF-8: {e}")))?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}
