#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod hash;
mod id;
mod selection;

pub use self::{
    hash::{selector_hash, spec_hash, HashError},
    id::PolicyId,
    selection::{InvalidSelection, SelectionKey},
};
