//! Control-plane API clients.

pub mod http;
pub mod routes;
