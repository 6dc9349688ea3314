//! Testing utilities and mock implementations
//!
//! Lets the pipeline, presentation shim and web layer be exercised without
//! an LLM endpoint or search API.

pub mod mocks;

pub use mocks::*;
