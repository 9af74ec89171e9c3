//! Configuration Management
//!
//! Hierarchical resolution, later sources win:
//! 1. Built-in defaults
//! 2. Global config (~/.config/bpmn-lens/config.toml)
//! 3. Project config (.bpmn-lens/config.toml)
//! 4. Environment variables (BPMN_LENS_*, nested keys split on `__`)
//! 5. CLI arguments

mod loader;
mod types;

pub use loader::{ConfigFormat, ConfigLoader};
pub use types::*;
