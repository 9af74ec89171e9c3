//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/bpmn-lens/config.toml)
//! 3. Project config (.bpmn-lens/config.toml)
//! 4. Environment variables (BPMN_LENS_* prefix, `__` between nested keys)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Config;
use crate::types::{LensError, Result};

const ENV_PREFIX: &str = "BPMN_LENS_";

/// Output format for `config show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_from(
            Self::global_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Same chain with explicit file locations. Missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // e.g. BPMN_LENS_LLM__OLLAMA__MODEL -> llm.ollama.model
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| LensError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| LensError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/bpmn-lens/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("bpmn-lens"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".bpmn-lens/config.toml")
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Lines describing where configuration is read from
    pub fn describe_paths() -> Vec<String> {
        let mut lines = Vec::new();

        match Self::global_config_path() {
            Some(global) => {
                let exists = if global.exists() { "✓" } else { "✗" };
                lines.push(format!("Global:  {} {}", exists, global.display()));
            }
            None => lines.push("Global:  (not available)".to_string()),
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        lines.push(format!("Project: {} {}", exists, project.display()));
        lines.push(format!("Env:     {}*", ENV_PREFIX));
        lines
    }

    /// Effective configuration as text. API keys are never included.
    pub fn render(config: &Config, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(config)?),
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| LensError::Config(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_yield_defaults() {
        let dir = TempDir::new().unwrap();
        let config =
            ConfigLoader::load_from(None, &dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.analysis.max_concurrent_phases, 8);
    }

    #[test]
    fn test_project_overrides_global() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("project.toml");
        fs::write(
            &global,
            "[llm]\ntimeout_secs = 120\nproviders = [\"ollama\"]\n",
        )
        .unwrap();
        fs::write(
            &project,
            "[llm]\ntimeout_secs = 60\n\n[analysis]\nphases = [\"STRUCTURE\", \"LOGIC\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from(Some(&global), &project).unwrap();
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.llm.providers, vec!["ollama"]);
        assert_eq!(config.analysis.phase_set().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_file_value_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[analysis]\nmax_concurrent_phases = 0\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(LensError::Config(_))
        ));
    }

    #[test]
    fn test_env_override() {
        let dir = TempDir::new().unwrap();
        // SAFETY: no other test reads this variable
        unsafe {
            env::set_var("BPMN_LENS_LLM__OLLAMA__MODEL", "env-model");
        }
        let config = ConfigLoader::load_from(None, &dir.path().join("absent.toml"));
        unsafe {
            env::remove_var("BPMN_LENS_LLM__OLLAMA__MODEL");
        }
        assert_eq!(config.unwrap().llm.ollama.model.as_deref(), Some("env-model"));
    }

    #[test]
    fn test_render_formats() {
        let config = Config::default();
        let toml = ConfigLoader::render(&config, ConfigFormat::Toml).unwrap();
        assert!(toml.contains("[llm]"));
        let json = ConfigLoader::render(&config, ConfigFormat::Json).unwrap();
        assert!(json.contains("\"max_tokens\": 3000"));
    }
}
