//! Core library for the `pullstress` CLI.
//!
//! Simulates many clients pulling the same container image: each attempt
//! fetches a bearer token and then the image manifest, with a bounded number
//! of attempts in flight and paced launches. The primary interface is the
//! `pullstress` binary; library APIs may evolve with it.
pub mod args;
pub mod config;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod progress;
pub mod registry;
pub mod shutdown;
pub mod summary;

mod logger;

#[cfg(test)]
mod test_support;
