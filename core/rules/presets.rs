// Named selection presets: literal, case-insensitive name suffixes.
use crate::error::{AppError, Result};
use indexmap::IndexMap;
use log;
use once_cell::sync::Lazy;
use serde::Serialize;

pub const DEFAULT_PRESET: &str = "code";

static BUILTIN_PRESETS: Lazy<IndexMap<String, Vec<String>>> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../data/presets.yaml"));
    serde_yml::from_str(yaml_content).expect("Failed to parse embedded data/presets.yaml")
});

pub fn get_builtin_presets() -> &'static IndexMap<String, Vec<String>> {
    &BUILTIN_PRESETS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preset {
    name: String,
    suffixes: Vec<String>,
}

impl Preset {
    pub fn new(name: impl Into<String>, suffixes: &[String]) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(suffixes.len());
        for suffix in suffixes {
            let s = suffix.trim().to_lowercase();
            if !s.is_empty() && !normalized.contains(&s) {
                normalized.push(s);
            }
        }
        Self {
            name: name.into(),
            suffixes: normalized,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// True when the lower-cased file name ends with any suffix.
    pub fn matches(&self, file_name: &str) -> bool {
        let lower_name = file_name.to_lowercase();
        self.suffixes
            .iter()
            .any(|suffix| lower_name.ends_with(suffix.as_str()))
    }
}

/// Built-in presets merged with the ones defined in configuration.
#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    presets: IndexMap<String, Preset>,
}

impl PresetCatalog {
    pub fn builtin() -> Self {
        Self::with_custom(&IndexMap::new())
    }

    /// Custom presets replace built-ins of the same name.
    pub fn with_custom(custom: &IndexMap<String, Vec<String>>) -> Self {
        let mut presets = IndexMap::new();
        for (name, suffixes) in get_builtin_presets().iter().chain(custom.iter()) {
            if suffixes.is_empty() {
                log::trace!("Skipping empty preset: {}", name);
                continue;
            }
            presets.insert(name.clone(), Preset::new(name.clone(), suffixes));
        }
        log::debug!("Preset catalog: {:?}", presets.keys().collect::<Vec<_>>());
        Self { presets }
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }

    /// Looks `selector` up by name, falling back to reading it as a
    /// comma-separated suffix list such as `.rs,.toml,Makefile`.
    pub fn resolve(&self, selector: &str) -> Result<Preset> {
        if let Some(preset) = self.get(selector.trim()) {
            return Ok(preset.clone());
        }
        let suffixes: Vec<String> = selector
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if suffixes.is_empty() {
            return Err(AppError::InvalidArgument(format!(
                "Preset '{}' is neither a known preset nor a suffix list.",
                selector
            )));
        }
        log::debug!("Using ad-hoc preset from suffix list: {:?}", suffixes);
        Ok(Preset::new("custom", &suffixes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_code_preset_is_available() {
        let catalog = PresetCatalog::builtin();
        let code = catalog.get(DEFAULT_PRESET).expect("code preset");
        assert!(code.matches("main.py"));
        assert!(code.matches("Dockerfile"));
        assert!(code.matches("lib.RS"));
        assert!(!code.matches("photo.png"));
    }

    #[test]
    fn custom_presets_override_builtins() {
        let mut custom = IndexMap::new();
        custom.insert("docs".to_string(), vec![".org".to_string()]);
        custom.insert("web".to_string(), vec![".html".to_string(), ".css".to_string()]);
        let catalog = PresetCatalog::with_custom(&custom);

        let docs = catalog.get("docs").unwrap();
        assert!(docs.matches("notes.org"));
        assert!(!docs.matches("README.md"));
        assert!(catalog.get("web").unwrap().matches("index.HTML"));
    }

    #[test]
    fn resolve_accepts_suffix_lists() {
        let catalog = PresetCatalog::builtin();
        let preset = catalog.resolve(".rs, Makefile").unwrap();
        assert_eq!(preset.suffixes(), &[".rs".to_string(), "makefile".to_string()]);
        assert!(preset.matches("Makefile"));
        assert!(catalog.resolve(" , ").is_err());
    }
}
