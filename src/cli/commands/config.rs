//! Config Command
//!
//! Usage:
//!   bpmn-lens config show [-f toml|json]
//!   bpmn-lens config path

use crate::config::{ConfigFormat, ConfigLoader};
use crate::types::Result;

/// Print the merged effective configuration
pub fn show(format: ConfigFormat) -> Result<()> {
    let config = ConfigLoader::load()?;
    println!("{}", ConfigLoader::render(&config, format)?);
    Ok(())
}

/// Print configuration sources
pub fn path() -> Result<()> {
    println!("Configuration paths:");
    println!();
    for line in ConfigLoader::describe_paths() {
        println!("  {}", line);
    }
    Ok(())
}
