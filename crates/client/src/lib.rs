//! Client code for edgeside.
//!
//! This crate provides the HTTP side of the edge: fetching documents from
//! route backends and fetching `<esi:include>` targets.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig};
