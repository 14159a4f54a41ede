//! Classwatch
//!
//! Live registry of style-class identifiers used across a source tree.
//! A builder scans source files, a websocket server broadcasts every rebuilt
//! registry, a relay caches the latest one, and display agents validate a
//! rendered surface against it.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod display;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
