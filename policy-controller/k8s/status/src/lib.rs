//! Reconciles `DnsPolicy` resources into the policy index.
//!
//! The [`Reconciler`] is invoked once per change notification for a single policy. It re-reads the
//! policy from a [`PolicyStore`], drives it through the [`State`] machine, updates the shared
//! index, and writes the derived fields back to the policy's status.
//!
//! Invocations for the same policy are expected to be serialized by the caller (e.g. the
//! `kube::runtime::Controller` queue); invocations for different policies may run concurrently.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod error;
mod metrics;
mod reconcile;
mod state;
mod store;


pub use self::{
    error::{Error, StoreOp},
    metrics::ReconcileMetrics,
    reconcile::{Outcome, Reconciler, READY},
    state::State,
    store::{Event, EventSink, EventType, PolicyStore},
};
