//! Library interface for switchboard-cli
//!
//! Exposes argument parsing and command handlers for integration testing

/// Command-line argument definitions
pub mod cli;
/// Command handlers
pub mod handlers;
