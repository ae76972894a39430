//! # jut-cli
//!
//! Command-line interface for the Jut data service.
//!
//! Provides commands for:
//! - Running juttle programs and streaming their output
//! - Listing, attaching to and killing jobs
//! - Managing stored account configurations
//!
//! Streaming is delegated to [`jut_client::StreamReader`]; this crate owns
//! argument parsing, the configuration store and output formatting.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, PointFormat};
pub use config::{ConfigStore, Configuration, Selector};
pub use error::CliError;
pub use output::{EventPrinter, OutputFormat};
