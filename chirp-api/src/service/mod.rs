//! Procedures behind the HTTP routes. Each takes the store and the caller's
//! identity explicitly so it can be driven without a running server.

pub mod mutation;
pub mod timeline;
