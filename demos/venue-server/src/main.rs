//! A single-venue demo server backed by the in-memory store.
//!
//! ```text
//! DUELHALL_ADMIN_KEY=secret cargo run -p venue-server
//! ```
//!
//! Participants connect with `Hello { version: 1, token: "<number>" }`
//! and check in with one of the QR tokens printed at startup.

use std::sync::Arc;

use duelhall::logging;
use duelhall::prelude::*;

const TABLES: usize = 4;

/// One venue with `TABLES` tables; QR tokens are `qr-t1`, `qr-t2`, ...
fn seed(store: &MemoryStore) -> VenueId {
    let venue = store.add_venue("Demo Venue");
    for n in 1..=TABLES {
        store.add_table(venue, &format!("Table {n}"), &format!("qr-t{n}"));
    }
    venue
}

#[tokio::main]
async fn main() -> Result<(), DuelError> {
    // .env is optional
    let _ = dotenvy::dotenv();
    logging::init();

    let config = ServerConfig::from_env()?;
    let store = Arc::new(MemoryStore::new());
    let venue = seed(&store);
    tracing::info!(%venue, tables = TABLES, "seeded demo venue");

    let server = DuelhallServerBuilder::from_config(&config)
        .build_with_config(&config, store, NumericTokenAuthenticator)
        .await?;
    server.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_registers_scannable_tables() {
        let store = MemoryStore::new();
        let venue = seed(&store);

        for n in 1..=TABLES {
            let table = store
                .find_table_by_qr(&format!("qr-t{n}"))
                .await
                .unwrap()
                .expect("table should resolve");
            assert_eq!(table.venue_id, venue);
            assert_eq!(table.label, format!("Table {n}"));
        }
        assert!(store.find_table_by_qr("qr-t0").await.unwrap().is_none());
    }
}
