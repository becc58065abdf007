//! Interaction log ingestion API library.

pub mod config;
pub mod http;
pub mod ingest;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;

pub use config::schema::ApiConfig;
pub use http::HttpServer;
pub use lifecycle::{ServiceContext, Shutdown};
