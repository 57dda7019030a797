//! Integration test suite for the script bridge
//!
//! These tests drive the engine the way an embedding application does,
//! across the `core_types` / `script_engine` boundary.

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use script_engine;
}
