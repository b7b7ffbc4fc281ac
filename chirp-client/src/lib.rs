//! Client side of chirp: a typed HTTP client plus the state that keeps a
//! rendered timeline consistent with the server without refetching.

pub mod cache;
pub mod client;
pub mod compose;
pub mod feed;
pub mod format;

#[cfg(test)]
pub(crate) mod fake;
