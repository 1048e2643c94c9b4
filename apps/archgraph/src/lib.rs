//! # archgraph
//!
//! Command-line query surface over `archgraph-core`.
//!
//! - [`project`] reads a project directory into engine input
//! - [`cli`] parses arguments and runs commands

pub mod cli;
pub mod project;
