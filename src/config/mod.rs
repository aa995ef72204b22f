//! Server configuration.
//!
//! - [`cors`]: allowed origins for browser clients
//! - [`server`]: command line arguments (bind address, cache backend)
//!
//! Cache settings live in the `outcache-config` crate.

pub mod cors;
pub mod server;
