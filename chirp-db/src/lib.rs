//! Record store for chirp: the [`RecordStore`](store::RecordStore) trait, a
//! Postgres implementation and an in-process one.

pub mod client;
pub mod memory;
mod record;
pub mod store;
