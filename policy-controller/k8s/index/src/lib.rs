//! DNS Policy Index
//!
//! Holds the reconciled `DnsPolicy` resources keyed two ways:
//!
//! ```text
//! [ selector hash ] -> [ DnsPolicy snapshot ]
//! [ namespace/name ] -> [ selector hash ]
//! ```
//!
//! Enforcing proxies look policies up by the fingerprint of their own selection key, so the forward
//! map answers every read. The reverse map lets the controller move or drop a policy's entry when
//! its selection key changes or the resource is deleted. Both maps sit behind a single lock so a
//! reader never observes one without the other.
//!
//! A hash is owned by at most one policy. The controller checks for conflicts before indexing, and
//! [`PolicyIndex::upsert`] refuses to take over a hash that another policy already owns.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod index;
pub mod metrics;

#[cfg(test)]
mod tests;

pub use self::index::{HashConflict, PolicyIndex};
