//! HTTP backend for browsing and editing MongoDB deployments
//!
//! The heart of the crate is [`cache::ConnectionCache`]: one live driver
//! client per saved connection, built on first use, shared by concurrent
//! requests and closed once idle.

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
mod error;
pub mod gateway;
pub mod observability;
pub mod server;
pub mod store;

pub use cache::{ConnectionCache, EvictionPolicy};
pub use client::{ConnectionConfig, MongoClientFactory};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, ErrorResponse, Result};
pub use server::AppState;
