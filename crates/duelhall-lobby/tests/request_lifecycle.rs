//! Integration tests for the request lifecycle against the in-memory
//! store and a real channel hub.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use duelhall_broadcast::{ChannelHub, Subscription};
use duelhall_lobby::{Decision, LobbyConfig, LobbyError, RequestManager};
use duelhall_protocol::{
    Channel, ErrorCode, Event, GameVariant, ParticipantId, RequestStatus,
    SessionId, TableId, VenueId,
};
use duelhall_session::CheckInDesk;
use duelhall_store::{MemoryStore, NewMatch, Store};

// =========================================================================
// Fixture: one venue with three tables, a second venue with one table.
// =========================================================================

const ALICE: ParticipantId = ParticipantId(1001);
const BOB: ParticipantId = ParticipantId(1002);
const CAROL: ParticipantId = ParticipantId(1003);
const DAVE: ParticipantId = ParticipantId(1004);

struct Lobby {
    store: Arc<MemoryStore>,
    hub: Arc<ChannelHub>,
    manager: Arc<RequestManager<MemoryStore, ChannelHub>>,
    venue: VenueId,
    venue_events: Subscription,
    alice: SessionId,
    bob: SessionId,
    carol: SessionId,
    dave: SessionId,
}

async fn lobby_with(config: LobbyConfig) -> Lobby {
    let store = Arc::new(MemoryStore::new());
    let venue = store.add_venue("Corner Cafe");
    let elsewhere = store.add_venue("Harbor Bar");
    store.add_table(venue, "Table A", "qr-a");
    store.add_table(venue, "Table B", "qr-b");
    store.add_table(venue, "Table C", "qr-c");
    store.add_table(elsewhere, "Table D", "qr-d");

    let desk = CheckInDesk::new(Arc::clone(&store));
    let alice = desk.check_in(ALICE, "qr-a").await.unwrap().session.id;
    let bob = desk.check_in(BOB, "qr-b").await.unwrap().session.id;
    let carol = desk.check_in(CAROL, "qr-c").await.unwrap().session.id;
    let dave = desk.check_in(DAVE, "qr-d").await.unwrap().session.id;

    let hub = Arc::new(ChannelHub::new());
    let venue_events = hub.subscribe(Channel::Venue(venue));
    let manager = Arc::new(RequestManager::new(
        Arc::clone(&store),
        Arc::clone(&hub),
        config,
    ));

    Lobby {
        store,
        hub,
        manager,
        venue,
        venue_events,
        alice,
        bob,
        carol,
        dave,
    }
}

async fn lobby() -> Lobby {
    lobby_with(LobbyConfig::default()).await
}

fn zero_request_ttl() -> LobbyConfig {
    LobbyConfig {
        request_ttl: Duration::ZERO,
        ..LobbyConfig::default()
    }
}

fn names(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(Event::name).collect()
}

// =========================================================================
// create
// =========================================================================

#[tokio::test]
async fn test_create_opens_pending_request_and_publishes() {
    let mut l = lobby().await;
    let before = Utc::now();
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();

    assert_eq!(req.status, RequestStatus::Pending);
    assert_eq!(req.venue_id, l.venue);
    assert_eq!(req.from_participant, ALICE);
    assert!(req.expires_at >= before + chrono::Duration::seconds(119));
    assert_eq!(
        l.venue_events.drain(),
        vec![Event::RequestCreated { request: req }]
    );
}

#[tokio::test]
async fn test_create_with_unknown_session_is_validation() {
    let l = lobby().await;
    let err = l
        .manager
        .create(ALICE, SessionId(9_999), GameVariant::Quiz)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[tokio::test]
async fn test_create_with_foreign_session_is_unauthorized() {
    let l = lobby().await;
    let err = l
        .manager
        .create(ALICE, l.bob, GameVariant::Quiz)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[tokio::test]
async fn test_create_over_daily_quota_rejected() {
    let l = lobby().await;
    for _ in 0..10 {
        l.store
            .insert_match(NewMatch {
                venue_id: l.venue,
                variant: GameVariant::Reflex,
                p1: ALICE,
                p1_table_id: TableId(1),
                p2: BOB,
                p2_table_id: TableId(2),
                started_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let err = l
        .manager
        .create(ALICE, l.alice, GameVariant::Reflex)
        .await
        .unwrap_err();
    assert!(matches!(err, LobbyError::QuotaExceeded { played: 10, quota: 10, .. }));
    assert_eq!(err.code(), ErrorCode::QuotaExceeded);
    assert!(l.store.list_open_requests(None).await.unwrap().is_empty());
}

// =========================================================================
// accept
// =========================================================================

#[tokio::test]
async fn test_accept_moves_to_await_admin() {
    let mut l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    let accepted = l.manager.accept(BOB, req.id, l.bob).await.unwrap();

    assert_eq!(accepted.status, RequestStatus::AwaitAdmin);
    assert_eq!(accepted.accepted_by, Some(BOB));
    assert!(accepted.admin_expires_at.is_some());
    assert_eq!(
        names(&l.venue_events.drain()),
        vec!["request.created", "request.accepted"]
    );
}

#[tokio::test]
async fn test_accept_already_accepted_is_invalid_state() {
    let l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    l.manager.accept(BOB, req.id, l.bob).await.unwrap();

    let err = l.manager.accept(CAROL, req.id, l.carol).await.unwrap_err();
    assert!(matches!(
        err,
        LobbyError::InvalidState { actual: RequestStatus::AwaitAdmin, .. }
    ));
    let stored = l.manager.find(req.id).await.unwrap();
    assert_eq!(stored.accepted_by, Some(BOB));
}

#[tokio::test]
async fn test_accept_concurrent_exactly_one_wins() {
    let l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Quiz).await.unwrap();

    let (bob, carol) = tokio::join!(
        l.manager.accept(BOB, req.id, l.bob),
        l.manager.accept(CAROL, req.id, l.carol),
    );
    let wins = [bob.is_ok(), carol.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(wins, 1);
    let loser = bob.err().or(carol.err()).unwrap();
    assert_eq!(loser.code(), ErrorCode::InvalidState);
}

#[tokio::test]
async fn test_accept_from_own_table_is_self_accept() {
    let l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();

    let err = l.manager.accept(ALICE, req.id, l.alice).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SelfAccept);
    assert_eq!(l.manager.find(req.id).await.unwrap().status, RequestStatus::Pending);
}

#[tokio::test]
async fn test_accept_from_other_venue_is_wrong_venue() {
    let l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();

    let err = l.manager.accept(DAVE, req.id, l.dave).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::WrongVenue);
}

#[tokio::test]
async fn test_accept_unknown_request_is_not_found() {
    let l = lobby().await;
    let err = l
        .manager
        .accept(BOB, duelhall_protocol::RequestId(404), l.bob)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_accept_lapsed_request_expires_it() {
    let mut l = lobby_with(zero_request_ttl()).await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();

    let err = l.manager.accept(BOB, req.id, l.bob).await.unwrap_err();
    assert!(matches!(
        err,
        LobbyError::InvalidState { actual: RequestStatus::Expired, .. }
    ));
    assert_eq!(
        names(&l.venue_events.drain()),
        vec!["request.created", "request.expired"]
    );
}

#[tokio::test]
async fn test_expired_request_stays_expired() {
    let mut l = lobby_with(zero_request_ttl()).await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    assert_eq!(l.manager.expire_lapsed().await.unwrap(), 1);

    assert!(l.manager.accept(BOB, req.id, l.bob).await.is_err());
    assert!(l.manager.decide(req.id, true).await.is_err());
    assert_eq!(l.manager.expire_lapsed().await.unwrap(), 0);
    assert_eq!(l.manager.find(req.id).await.unwrap().status, RequestStatus::Expired);

    let expired = l
        .venue_events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, Event::RequestExpired { .. }))
        .count();
    assert_eq!(expired, 1, "request.expired is published once");
}

// =========================================================================
// decide
// =========================================================================

#[tokio::test]
async fn test_decide_approve_creates_match() {
    let mut l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Quiz).await.unwrap();
    l.manager.accept(BOB, req.id, l.bob).await.unwrap();

    let Decision::Approved(record) = l.manager.decide(req.id, true).await.unwrap() else {
        panic!("expected approval");
    };
    assert_eq!(record.p1, ALICE);
    assert_eq!(record.p2, BOB);
    assert_eq!(record.variant, GameVariant::Quiz);
    assert!(!record.is_settled());
    assert_eq!(l.manager.find(req.id).await.unwrap().status, RequestStatus::Approved);

    let events = l.venue_events.drain();
    assert_eq!(
        events.last(),
        Some(&Event::RequestApproved {
            request_id: req.id,
            record,
        })
    );
}

#[tokio::test]
async fn test_decide_twice_second_is_invalid_state() {
    let l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Quiz).await.unwrap();
    l.manager.accept(BOB, req.id, l.bob).await.unwrap();
    l.manager.decide(req.id, true).await.unwrap();

    let err = l.manager.decide(req.id, false).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(l.store.match_count(), 1);
}

#[tokio::test]
async fn test_decide_approve_store_failure_can_be_retried() {
    let mut l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    l.manager.accept(BOB, req.id, l.bob).await.unwrap();
    l.venue_events.drain();
    l.store.inject_approval_faults(1);

    let err = l.manager.decide(req.id, true).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);
    assert_eq!(l.manager.find(req.id).await.unwrap().status, RequestStatus::AwaitAdmin);
    assert_eq!(l.store.match_count(), 0);
    assert!(l.venue_events.drain().is_empty());

    let Decision::Approved(record) = l.manager.decide(req.id, true).await.unwrap() else {
        panic!("expected approval on retry");
    };
    assert_eq!(l.store.match_count(), 1);
    assert_eq!(
        names(&l.venue_events.drain()),
        vec!["request.approved"]
    );
    assert_eq!(record.p2, BOB);
}

#[tokio::test]
async fn test_decide_concurrent_approvals_create_one_match() {
    let l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Quiz).await.unwrap();
    l.manager.accept(BOB, req.id, l.bob).await.unwrap();

    let (first, second) = tokio::join!(
        l.manager.decide(req.id, true),
        l.manager.decide(req.id, true),
    );
    assert!(first.is_ok() ^ second.is_ok());
    assert_eq!(l.store.match_count(), 1);
}

#[tokio::test]
async fn test_decide_deny_publishes_denied() {
    let mut l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    l.manager.accept(BOB, req.id, l.bob).await.unwrap();

    assert_eq!(
        l.manager.decide(req.id, false).await.unwrap(),
        Decision::Denied(req.id)
    );
    assert_eq!(l.manager.find(req.id).await.unwrap().status, RequestStatus::Denied);
    assert_eq!(
        l.venue_events.drain().last(),
        Some(&Event::RequestDenied { request_id: req.id })
    );
    assert_eq!(l.store.match_count(), 0);
}

#[tokio::test]
async fn test_decide_pending_request_is_invalid_state() {
    let l = lobby().await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    let err = l.manager.decide(req.id, true).await.unwrap_err();
    assert!(matches!(
        err,
        LobbyError::InvalidState { actual: RequestStatus::Pending, expected: RequestStatus::AwaitAdmin, .. }
    ));
}

#[tokio::test]
async fn test_decide_after_admin_window_expires_request() {
    let l = lobby_with(LobbyConfig {
        admin_ttl: Duration::ZERO,
        ..LobbyConfig::default()
    })
    .await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    l.manager.accept(BOB, req.id, l.bob).await.unwrap();

    let err = l.manager.decide(req.id, true).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(l.manager.find(req.id).await.unwrap().status, RequestStatus::Expired);
    assert_eq!(l.store.match_count(), 0);
}

// =========================================================================
// listings and expiry sweep
// =========================================================================

#[tokio::test]
async fn test_list_active_newest_first_with_countdown() {
    let l = lobby().await;
    let first = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    let second = l.manager.create(BOB, l.bob, GameVariant::Quiz).await.unwrap();
    let denied = l.manager.create(CAROL, l.carol, GameVariant::Quiz).await.unwrap();
    l.manager.accept(ALICE, denied.id, l.alice).await.unwrap();
    l.manager.decide(denied.id, false).await.unwrap();

    let active = l.manager.list_active(l.venue).await.unwrap();
    let ids: Vec<_> = active.iter().map(|a| a.request.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(active.iter().all(|a| a.remaining_ms > 0 && a.remaining_ms <= 120_000));
}

#[tokio::test]
async fn test_list_active_skips_and_expires_lapsed() {
    let l = lobby_with(zero_request_ttl()).await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();

    assert!(l.manager.list_active(l.venue).await.unwrap().is_empty());
    assert_eq!(l.manager.find(req.id).await.unwrap().status, RequestStatus::Expired);
}

#[tokio::test]
async fn test_list_awaiting_admin_only_accepted() {
    let l = lobby().await;
    let waiting = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();
    l.manager.accept(BOB, waiting.id, l.bob).await.unwrap();
    l.manager.create(CAROL, l.carol, GameVariant::Quiz).await.unwrap();

    let listed = l.manager.list_awaiting_admin().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].request.id, waiting.id);
    assert!(listed[0].remaining_ms <= 60_000);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_expires_unread_requests() {
    let mut l = lobby_with(zero_request_ttl()).await;
    let req = l.manager.create(ALICE, l.alice, GameVariant::Reflex).await.unwrap();

    let sweeper = RequestManager::spawn_sweeper(Arc::clone(&l.manager));
    tokio::time::sleep(l.manager.config().sweep_interval).await;
    sweeper.abort();

    let stored = l.store.find_request_by_id(req.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Expired);
    assert_eq!(
        names(&l.venue_events.drain()),
        vec!["request.created", "request.expired"]
    );
    assert_eq!(l.hub.subscriber_count(Channel::Venue(l.venue)), 1);
}
