//! ringvm CLI library.
//!
//! Configuration, logging and command implementations shared by the
//! `ringvm` binary and its tests.

pub mod colors;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod phases;

pub use config::RingvmConfig;
pub use error::CliError;
