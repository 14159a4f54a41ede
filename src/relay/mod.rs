//! Relay agent: one upstream connection, many local display surfaces.
//!
//! This module provides:
//! - A reconnecting websocket client for the broadcast endpoint
//! - A wholesale-swapped registry cache with a non-blocking query
//! - A surface table for pushing updates to display agents

mod agent;
mod surfaces;

pub use agent::RelayAgent;
pub use surfaces::{Subscription, SurfaceId, SurfaceTable};
