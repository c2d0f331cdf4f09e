//! CLI command implementations.
//!
//! - [`get`] - single location fix
//! - [`watch`] - stream fixes until a count is reached or Ctrl-C

pub mod common;
pub mod get;
pub mod watch;
