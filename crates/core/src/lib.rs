//! Core types and shared functionality for edgeside.
//!
//! This crate provides:
//! - ESI marker scanning and the chunk-by-chunk transducer
//! - Response cache policy and the in-memory store
//! - The ordered route table
//! - The edge pipeline tying them together
//! - Unified error types and configuration

pub mod cache;
pub mod config;
pub mod edge;
pub mod error;
pub mod esi;
pub mod route;

pub use cache::{CacheStore, MemoryStore};
pub use config::AppConfig;
pub use edge::{ByteStream, CacheStatus, Edge, EdgeOptions, EdgeResponse, FragmentClient, OriginClient, OriginResponse};
pub use error::Error;
pub use route::{Backend, RouteResolver, RouteTable};
