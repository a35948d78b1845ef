// crates/quarry/src/lib.rs
// Quarry - hybrid document + SQL question answering

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod reasoning;
pub mod retrieval;
pub mod store;
pub mod trace;
pub mod utils;

pub use error::{QuarryError, Result};
