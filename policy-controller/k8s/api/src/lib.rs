#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod condition;
pub mod finalizer;
pub mod policy;

pub use self::{
    condition::{Condition, ConditionStatus, Conditions},
    policy::{DnsPolicy, DnsPolicySpec, DnsPolicyStatus},
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
pub use kube::{
    api::{Api, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    runtime::{events, watcher},
    Client, Error, Resource,
};

/// Label/subject mappings as they appear on the wire.
pub type Map = std::collections::BTreeMap<String, String>;
