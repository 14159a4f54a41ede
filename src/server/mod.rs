//! Broadcast server.
//!
//! This module provides:
//! - The broadcast hub holding the connection table and latest snapshot
//! - The websocket endpoint consumers subscribe to
//! - Health, registry and metrics endpoints
//! - Tracing setup and graceful shutdown

mod app;
mod hub;
pub mod metrics;
pub mod observability;
mod rest;
mod ws;

pub use app::{shutdown_signal, App, ServerConfig};
pub use hub::{BroadcastHub, ConnectionId, Frame};
pub use metrics::init_metrics;
pub use observability::init_tracing;
pub use rest::{create_rest_router, HealthResponse};
pub use ws::create_ws_router;
