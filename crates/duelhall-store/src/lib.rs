//! Storage collaborator for Duelhall.
//!
//! The engine never talks to a database directly. It goes through the
//! [`Store`] trait, which names exactly the reads and writes the engine
//! needs. [`MemoryStore`] implements it in process; a SQL-backed store
//! would implement the same trait.
//!
//! Request status changes go through a compare-and-set
//! ([`Store::update_request_status`]): the write only lands if the stored
//! status is still the one the caller saw. That is what makes "first
//! accept wins" hold when two tables race.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod model;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{NewMatch, NewRequest, NewSession, RequestUpdate, Settlement};
pub use store::Store;
