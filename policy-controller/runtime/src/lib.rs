#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use dns_policy_controller_core as core;
pub use dns_policy_controller_http as http;
pub use dns_policy_controller_k8s_api as k8s;
pub use dns_policy_controller_k8s_index as index;
pub use dns_policy_controller_k8s_status as status;

mod admission;
mod args;
mod controller;
mod store;
mod validation;

pub use self::args::Args;
