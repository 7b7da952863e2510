//! Integration and unit tests for the MediChat backend.
//!
//! This module organizes the router-level test suites; per-component unit
//! tests live next to the code they cover in `#[cfg(test)]` blocks.
//!
//! ## Test Modules
//!
//! - **pipeline_tests**: Full security pipeline driven through the router
//! - **config_tests**: Configuration loading and validation tests
//! - **error_tests**: Error display and wire format tests
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod error_tests;
pub mod pipeline_tests;
