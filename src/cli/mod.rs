//! Command Line Interface (CLI) layer for EOPREP.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for catalog queries and product
//! processing. It wires user-provided options to the library functionality
//! exposed via `eoprep::api`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
