//! Read-only HTTP API over the policy index.
//!
//! Enforcing proxies resolve their policy by the selector hash of their own selection key:
//!
//! ```text
//! GET /api/policies?hash=<selector hash>  -> 200 DnsPolicy | 400 | 404 | 405
//! GET /healthz                            -> 200 {"status":"ok","indexed_policies":N}
//! ```
//!
//! The [`QueryService`] only reads the index; it never blocks on anything but the index lock.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod server;
mod service;


pub use self::{
    server::{Server, Timeouts},
    service::QueryService,
};
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}
