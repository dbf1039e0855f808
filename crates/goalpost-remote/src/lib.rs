//! Wire models and the remote gateway for the goalpost service.
//!
//! The core never talks HTTP directly: it sees the [`gateway::RemoteGateway`]
//! trait. [`http::HttpGateway`] is the production implementation used by the
//! CLI.

pub mod config;
pub mod gateway;
pub mod http;
pub mod models;

pub use config::RemoteConfig;
pub use gateway::{GatewayError, RemoteGateway};
pub use http::HttpGateway;
