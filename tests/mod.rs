//! Integration tests for StreamDebrid
//!
//! Tests are organized by component:
//! - torbox_test: Torbox client against a mocked API
//! - realdebrid_test: Real-Debrid client against a mocked API
//! - hybrid_test: Merge/fallback policy with fake providers
//! - cli_test: Argument parsing and command handlers

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
