//! Integration tests for the WebSocket gateway: handshake, role checks,
//! wire format, channel fan-out, and the idle timeout.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use duelhall::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

const ADMIN_KEY: &str = "letmein";

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port with one venue of two tables.
async fn start_server(idle_timeout: Duration) -> String {
    let store = Arc::new(MemoryStore::new());
    let venue = store.add_venue("Corner Cafe");
    store.add_table(venue, "Table 1", "qr-1");
    store.add_table(venue, "Table 2", "qr-2");

    let server = DuelhallServerBuilder::new()
        .bind("127.0.0.1:0")
        .idle_timeout(idle_timeout)
        .build(store, NumericTokenAuthenticator, StaticAdminKey::new(ADMIN_KEY))
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

/// A test client that keeps events arriving between replies.
struct Client {
    ws: ClientWs,
    events: VecDeque<Value>,
    next_id: u64,
}

impl Client {
    async fn connect(addr: &str) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("should connect");
        Self {
            ws,
            events: VecDeque::new(),
            next_id: 1,
        }
    }

    async fn participant(addr: &str, id: u64) -> Self {
        let mut client = Self::connect(addr).await;
        let welcome = client
            .call(json!({"type": "Hello", "version": 1, "token": id.to_string()}))
            .await;
        assert_eq!(welcome["type"], "Reply", "{welcome}");
        client
    }

    async fn admin(addr: &str) -> Self {
        let mut client = Self::connect(addr).await;
        let welcome = client
            .call(json!({"type": "AdminHello", "version": 1, "key": ADMIN_KEY}))
            .await;
        assert_eq!(welcome["body"]["admin"], true, "{welcome}");
        client
    }

    async fn send_raw(&mut self, text: String) {
        self.ws.send(Message::Text(text.into())).await.unwrap();
    }

    /// Next server frame, or `None` once the server closed the socket.
    async fn read(&mut self) -> Option<Value> {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
                .await
                .expect("server should answer");
            match msg {
                Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).unwrap()),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Sends an action and returns the matching Reply or Error frame.
    async fn call(&mut self, action: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send_raw(json!({"id": id, "action": action}).to_string())
            .await;
        loop {
            let frame = self.read().await.expect("connection closed before reply");
            if frame["type"] == "Event" {
                self.events.push_back(frame);
            } else {
                assert_eq!(frame["id"], id, "{frame}");
                return frame;
            }
        }
    }

    /// Next event frame, buffered or fresh.
    async fn event(&mut self) -> Value {
        if let Some(event) = self.events.pop_front() {
            return event;
        }
        let frame = self.read().await.expect("connection closed before event");
        assert_eq!(frame["type"], "Event", "{frame}");
        frame
    }
}

fn event_name(frame: &Value) -> &str {
    frame["event"]["event"].as_str().unwrap_or_default()
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_hello_returns_welcome() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::connect(&addr).await;

    let frame = client
        .call(json!({"type": "Hello", "version": 1, "token": "42"}))
        .await;
    assert_eq!(frame["type"], "Reply");
    assert_eq!(frame["body"]["kind"], "Welcome");
    assert_eq!(frame["body"]["participant"], 42);
    assert_eq!(frame["body"]["admin"], false);
    assert!(frame["body"]["server_time"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_first_frame_not_hello_is_rejected_and_closed() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::connect(&addr).await;

    let frame = client.call(json!({"type": "Ping"})).await;
    assert_eq!(frame["type"], "Error");
    assert_eq!(frame["code"], "VALIDATION");
    assert!(client.read().await.is_none());
}

#[tokio::test]
async fn test_version_mismatch_is_rejected() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::connect(&addr).await;

    let frame = client
        .call(json!({"type": "Hello", "version": 99, "token": "1"}))
        .await;
    assert_eq!(frame["code"], "VALIDATION");
    assert!(frame["message"].as_str().unwrap().contains("version"));
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::connect(&addr).await;

    let frame = client
        .call(json!({"type": "Hello", "version": 1, "token": "not-a-number"}))
        .await;
    assert_eq!(frame["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_wrong_admin_key_is_unauthorized() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::connect(&addr).await;

    let frame = client
        .call(json!({"type": "AdminHello", "version": 1, "key": "guess"}))
        .await;
    assert_eq!(frame["type"], "Error");
    assert_eq!(frame["code"], "UNAUTHORIZED");
    assert!(client.read().await.is_none());
}

// =========================================================================
// Routing and roles
// =========================================================================

#[tokio::test]
async fn test_ping_and_list_games() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::participant(&addr, 7).await;

    let pong = client.call(json!({"type": "Ping"})).await;
    assert_eq!(pong["body"]["kind"], "Pong");

    let games = client.call(json!({"type": "ListGames"})).await;
    let variants: Vec<&str> = games["body"]["games"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["variant"].as_str().unwrap())
        .collect();
    assert_eq!(variants, vec!["reflex", "quiz"]);
}

#[tokio::test]
async fn test_malformed_frame_gets_error_and_connection_survives() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::participant(&addr, 7).await;

    client.send_raw("{not json".into()).await;
    let frame = client.read().await.unwrap();
    assert_eq!(frame["type"], "Error");
    assert_eq!(frame["code"], "VALIDATION");

    let pong = client.call(json!({"type": "Ping"})).await;
    assert_eq!(pong["body"]["kind"], "Pong");
}

#[tokio::test]
async fn test_participant_cannot_use_admin_actions() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::participant(&addr, 7).await;

    let frame = client
        .call(json!({"type": "Decide", "request_id": 1, "approve": true}))
        .await;
    assert_eq!(frame["code"], "UNAUTHORIZED");

    let frame = client.call(json!({"type": "ListAwaitingAdmin"})).await;
    assert_eq!(frame["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_admin_cannot_play() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut admin = Client::admin(&addr).await;

    let frame = admin.call(json!({"type": "CheckIn", "qr_token": "qr-1"})).await;
    assert_eq!(frame["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_qr_is_validation() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::participant(&addr, 7).await;

    let frame = client.call(json!({"type": "CheckIn", "qr_token": "qr-404"})).await;
    assert_eq!(frame["code"], "VALIDATION");
}

#[tokio::test]
async fn test_second_hello_is_validation() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut client = Client::participant(&addr, 7).await;

    let frame = client
        .call(json!({"type": "Hello", "version": 1, "token": "8"}))
        .await;
    assert_eq!(frame["code"], "VALIDATION");
}

// =========================================================================
// Full flow
// =========================================================================

#[tokio::test]
async fn test_full_flow_request_to_settled_quiz() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut alice = Client::participant(&addr, 3001).await;
    let mut bob = Client::participant(&addr, 3002).await;
    let mut admin = Client::admin(&addr).await;

    // Check in and watch the venue.
    let checked_in = alice.call(json!({"type": "CheckIn", "qr_token": "qr-1"})).await;
    assert_eq!(checked_in["body"]["kind"], "CheckedIn", "{checked_in}");
    assert_eq!(checked_in["body"]["table"]["venue_name"], "Corner Cafe");
    let alice_session = checked_in["body"]["session"]["id"].clone();
    let venue_id = checked_in["body"]["session"]["venue_id"].as_u64().unwrap();
    let venue_channel = format!("venue:{venue_id}");

    let subscribed = alice
        .call(json!({"type": "Subscribe", "channel": venue_channel}))
        .await;
    assert_eq!(subscribed["body"]["kind"], "Subscribed");

    let checked_in = bob.call(json!({"type": "CheckIn", "qr_token": "qr-2"})).await;
    let bob_session = checked_in["body"]["session"]["id"].clone();

    // Propose, accept, approve.
    let created = alice
        .call(json!({"type": "CreateRequest", "session_id": alice_session, "variant": "quiz"}))
        .await;
    assert_eq!(created["body"]["request"]["status"], "PENDING");
    let request_id = created["body"]["request"]["id"].clone();

    let listed = bob
        .call(json!({"type": "ListRequests", "venue_id": venue_id}))
        .await;
    assert_eq!(listed["body"]["requests"].as_array().unwrap().len(), 1);

    let accepted = bob
        .call(json!({"type": "AcceptRequest", "request_id": request_id, "session_id": bob_session}))
        .await;
    assert_eq!(accepted["body"]["request"]["status"], "AWAIT_ADMIN");

    let waiting = admin.call(json!({"type": "ListAwaitingAdmin"})).await;
    assert_eq!(waiting["body"]["requests"][0]["id"], request_id);

    let decided = admin
        .call(json!({"type": "Decide", "request_id": request_id, "approve": true}))
        .await;
    assert_eq!(decided["body"]["kind"], "Match", "{decided}");
    let match_id = decided["body"]["match"]["id"].clone();

    // The venue channel saw the lifecycle in order.
    let names = [
        event_name(&alice.event().await).to_string(),
        event_name(&alice.event().await).to_string(),
        event_name(&alice.event().await).to_string(),
    ];
    assert_eq!(names, ["request.created", "request.accepted", "request.approved"]);

    // Play: both watch the match, Alice answers everything right.
    let match_channel = format!("match:{match_id}");
    alice
        .call(json!({"type": "Subscribe", "channel": match_channel}))
        .await;
    bob.call(json!({"type": "Subscribe", "channel": match_channel}))
        .await;

    let ack = alice.call(json!({"type": "QuizReady", "match_id": match_id})).await;
    assert_eq!(ack["body"]["kind"], "Ack");
    let questions = alice.event().await;
    assert_eq!(event_name(&questions), "quiz.questions");
    let questions = questions["event"]["payload"]["questions"].as_array().unwrap().clone();
    assert_eq!(questions.len(), 5);
    assert!(questions[0].get("answer").is_none());

    for q in &questions {
        let (lhs, rhs) = (q["lhs"].as_i64().unwrap(), q["rhs"].as_i64().unwrap());
        let value = match q["op"].as_str().unwrap() {
            "add" => lhs + rhs,
            "sub" => lhs - rhs,
            _ => lhs * rhs,
        };
        let ack = alice
            .call(json!({"type": "QuizAnswer", "match_id": match_id, "index": q["index"], "value": value}))
            .await;
        assert_eq!(ack["body"]["kind"], "Ack", "{ack}");
    }

    let ended = bob.event().await;
    let ended = if event_name(&ended) == "quiz.questions" {
        bob.event().await
    } else {
        ended
    };
    assert_eq!(event_name(&ended), "match.ended");
    assert_eq!(ended["channel"], match_channel);
    assert_eq!(ended["event"]["payload"]["result"], "P1_WIN");
    assert_eq!(ended["event"]["payload"]["scores"]["p1"], 5);

    let board = bob.call(json!({"type": "Leaderboard", "period": "daily"})).await;
    assert_eq!(board["body"]["entries"][0]["participant"], 3001);
    assert_eq!(board["body"]["entries"][0]["wins"], 1);
}

#[tokio::test]
async fn test_unsubscribe_stops_events() {
    let addr = start_server(Duration::from_secs(30)).await;
    let mut alice = Client::participant(&addr, 4001).await;

    let checked_in = alice.call(json!({"type": "CheckIn", "qr_token": "qr-1"})).await;
    let session = checked_in["body"]["session"]["id"].clone();
    let channel = format!("venue:{}", checked_in["body"]["session"]["venue_id"]);

    alice.call(json!({"type": "Subscribe", "channel": channel})).await;
    let left = alice.call(json!({"type": "Unsubscribe", "channel": channel})).await;
    assert_eq!(left["body"]["kind"], "Unsubscribed");

    alice
        .call(json!({"type": "CreateRequest", "session_id": session, "variant": "reflex"}))
        .await;
    let pong = alice.call(json!({"type": "Ping"})).await;
    assert_eq!(pong["body"]["kind"], "Pong");
    assert!(alice.events.is_empty());
}

// =========================================================================
// Idle timeout
// =========================================================================

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let addr = start_server(Duration::from_millis(200)).await;
    let mut client = Client::participant(&addr, 7).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let pong = client.call(json!({"type": "Ping"})).await;
    assert_eq!(pong["body"]["kind"], "Pong");

    assert!(client.read().await.is_none());
}
