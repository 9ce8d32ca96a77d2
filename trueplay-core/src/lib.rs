//! # trueplay-core
//!
//! Core library for the trueplay script playground.
//!
//! This crate provides configuration loading, the bundled template scripts,
//! the [`Playground`] facade wiring a config to a network client and script
//! runner, and the helpers used to present a run's results.

pub mod config;
pub mod playground;
pub mod results;
pub mod templates;

pub use config::{Config, ConfigError, RunnerConfig};
pub use playground::{Playground, PlaygroundError};
pub use results::{RunStatus, Table};
pub use templates::Template;
