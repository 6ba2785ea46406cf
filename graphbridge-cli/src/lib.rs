//! Graphbridge CLI library.
//!
//! Configuration, output and engine wiring shared by the `graphbridge` binary.

pub mod app;
pub mod config;
pub mod output;
