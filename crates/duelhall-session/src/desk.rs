//! Table check-in: QR token → check-in session.

use std::sync::Arc;

use chrono::Utc;
use duelhall_protocol::{CheckInSession, ParticipantId, SessionId, TableInfo};
use duelhall_store::{NewSession, Store};
use rand::Rng;

use crate::SessionError;

const PUBLIC_ID_LEN: usize = 6;
const PUBLIC_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A completed check-in: the new session plus the table it binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub session: CheckInSession,
    pub table: TableInfo,
}

/// Creates and ends check-in sessions.
pub struct CheckInDesk<S> {
    store: Arc<S>,
}

impl<S: Store> CheckInDesk<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Binds `participant` to the table whose QR code carries `qr_token`.
    ///
    /// Every check-in gets a fresh session and public handle; earlier
    /// sessions of the same participant stay as they are.
    ///
    /// # Errors
    /// - [`SessionError::UnknownTable`] if no table has this token
    pub async fn check_in(
        &self,
        participant: ParticipantId,
        qr_token: &str,
    ) -> Result<CheckIn, SessionError> {
        let table = self
            .store
            .find_table_by_qr(qr_token)
            .await?
            .ok_or(SessionError::UnknownTable)?;

        let session = self
            .store
            .insert_session(NewSession {
                participant,
                venue_id: table.venue_id,
                table_id: table.table_id,
                public_id: generate_public_id(),
                started_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            %participant,
            session_id = %session.id,
            table_id = %table.table_id,
            public_id = %session.public_id,
            "checked in"
        );
        Ok(CheckIn { session, table })
    }

    /// Ends a session owned by `participant`.
    pub async fn check_out(
        &self,
        participant: ParticipantId,
        session_id: SessionId,
    ) -> Result<(), SessionError> {
        owned_session(self.store.as_ref(), participant, session_id).await?;
        self.store.end_session(session_id).await?;
        tracing::info!(%participant, %session_id, "checked out");
        Ok(())
    }
}

/// Loads an active session and checks that `participant` owns it.
///
/// # Errors
/// - [`SessionError::InvalidSession`] if it is unknown or ended
/// - [`SessionError::NotOwner`] if another participant owns it
pub async fn owned_session<S: Store>(
    store: &S,
    participant: ParticipantId,
    session_id: SessionId,
) -> Result<CheckInSession, SessionError> {
    let session = store
        .find_active_session_by_id(session_id)
        .await?
        .ok_or(SessionError::InvalidSession(session_id))?;
    if session.participant != participant {
        return Err(SessionError::NotOwner {
            session: session_id,
            participant,
        });
    }
    Ok(session)
}

/// `u` followed by six base-36 characters, e.g. `u3k9x2a`.
fn generate_public_id() -> String {
    let mut rng = rand::rng();
    let mut id = String::with_capacity(PUBLIC_ID_LEN + 1);
    id.push('u');
    for _ in 0..PUBLIC_ID_LEN {
        let idx = rng.random_range(0..PUBLIC_ID_ALPHABET.len());
        id.push(char::from(PUBLIC_ID_ALPHABET[idx]));
    }
    id
}

#[cfg(test)]
mod tests {
    use duelhall_protocol::ErrorCode;
    use duelhall_store::MemoryStore;

    use super::*;

    fn desk_with_table() -> (CheckInDesk<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let venue = store.add_venue("Corner Cafe");
        store.add_table(venue, "Table 1", "qr-1");
        (CheckInDesk::new(Arc::clone(&store)), store)
    }

    #[test]
    fn test_generate_public_id_format() {
        for _ in 0..100 {
            let id = generate_public_id();
            assert_eq!(id.len(), 7);
            assert!(id.starts_with('u'));
            assert!(id[1..].bytes().all(|b| PUBLIC_ID_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_check_in_creates_active_session() {
        let (desk, store) = desk_with_table();
        let checked = desk.check_in(ParticipantId(5), "qr-1").await.unwrap();

        assert_eq!(checked.table.venue_name, "Corner Cafe");
        assert_eq!(checked.session.table_id, checked.table.table_id);
        assert_eq!(checked.session.participant, ParticipantId(5));
        let found = store
            .find_active_session_by_id(checked.session.id)
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_check_in_unknown_qr_is_validation() {
        let (desk, _) = desk_with_table();
        let err = desk.check_in(ParticipantId(5), "nope").await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownTable));
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_check_out_by_other_participant_unauthorized() {
        let (desk, _) = desk_with_table();
        let checked = desk.check_in(ParticipantId(5), "qr-1").await.unwrap();

        let err = desk
            .check_out(ParticipantId(6), checked.session.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_check_out_twice_is_invalid_session() {
        let (desk, _) = desk_with_table();
        let checked = desk.check_in(ParticipantId(5), "qr-1").await.unwrap();

        desk.check_out(ParticipantId(5), checked.session.id).await.unwrap();
        let err = desk
            .check_out(ParticipantId(5), checked.session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidSession(_)));
    }
}
