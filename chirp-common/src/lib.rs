//! Domain model shared by the chirp api, store and client.

pub mod model;
pub mod snowflake;
pub mod util;
