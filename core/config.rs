use crate::error::{AppError, Result};
use crate::rules::presets::PresetCatalog;
use crate::rules::{ExclusionRules, FilterMode};
use crate::weave::DEFAULT_OUTPUT_FILENAME;
use indexmap::IndexMap;
use log;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = ".contextweaver";
pub const DEFAULT_CONFIG_FILENAME: &str = "contextweaver.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub presets: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default)]
    pub filter_mode: FilterMode,
    #[serde(default)]
    pub flat_view: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_preset: Option<String>,
}

/// Entries appended to the built-in exclusion rule sets.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    #[serde(default)]
    pub exclude_names: Vec<String>,
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    #[serde(default)]
    pub smart_exclude: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_filename")]
    pub filename: PathBuf,
}

fn default_output_filename() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILENAME)
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            filename: default_output_filename(),
        }
    }
}

impl Config {
    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules::builtin().extended(
            &self.filters.exclude_names,
            &self.filters.exclude_extensions,
            &self.filters.smart_exclude,
        )
    }

    pub fn preset_catalog(&self) -> PresetCatalog {
        PresetCatalog::with_custom(&self.presets)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        path_to_resolve
            .canonicalize()
            .map_err(|e| AppError::Scan {
                path: path_to_resolve.clone(),
                source: e,
            })
    }

    /// Finds the config file to load. `--config` accepts either a path or a
    /// bare name looked up as `<root>/.contextweaver/<name>.toml`; without it
    /// the default file is used when present.
    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }
        let config_dir = project_root.join(DEFAULT_CONFIG_DIR);

        let Some(requested) = cli_config_file else {
            let default_path = config_dir.join(DEFAULT_CONFIG_FILENAME);
            return Ok(default_path.exists().then_some(default_path));
        };

        let expanded = PathBuf::from(shellexpand::tilde(requested).as_ref());
        let candidate = if expanded.components().count() > 1 || expanded.is_absolute() {
            expanded
        } else {
            config_dir.join(expanded).with_extension("toml")
        };
        if !candidate.is_file() {
            return Err(AppError::Config(format!(
                "Config file not found: {}",
                candidate.display()
            )));
        }
        log::debug!("Using config file: {}", candidate.display());
        Ok(Some(candidate))
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        let config = toml::from_str::<Config>(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.general.default_preset {
            if self.preset_catalog().get(name).is_none() {
                return Err(AppError::Config(format!(
                    "default_preset '{}' does not name a known preset",
                    name
                )));
            }
        }
        Ok(())
    }
}
