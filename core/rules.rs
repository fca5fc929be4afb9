use crate::error::{AppError, Result};
use crate::gather::EntryKind;
use log;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub mod presets;

/// Which noise filtering applies on top of the unconditional exclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Also prunes VCS, IDE, build and cache directories by name.
    #[default]
    Smart,
    /// Shows everything except always-excluded content.
    AllFiles,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Smart => f.write_str("smart"),
            FilterMode::AllFiles => f.write_str("all_files"),
        }
    }
}

impl FromStr for FilterMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "smart" => Ok(FilterMode::Smart),
            "all" | "all_files" => Ok(FilterMode::AllFiles),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown filter mode '{}'. Use 'smart' or 'all-files'.",
                other
            ))),
        }
    }
}

/// The three exclusion rule sets consulted while scanning.
///
/// `names` and `extensions` apply in every mode and are matched against the
/// lower-cased file name. `smart` applies only in [`FilterMode::Smart`], is
/// matched case-sensitively, and covers directories as well as files.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExclusionRules {
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    smart: Vec<String>,
}

static BUILTIN_EXCLUSIONS: Lazy<ExclusionRules> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../data/exclusions.yaml"
    ));
    let raw: ExclusionRules =
        serde_yml::from_str(yaml_content).expect("Failed to parse embedded data/exclusions.yaml");
    ExclusionRules::default().extended(&raw.names, &raw.extensions, &raw.smart)
});

impl ExclusionRules {
    pub fn builtin() -> &'static ExclusionRules {
        &BUILTIN_EXCLUSIONS
    }

    /// Returns a copy with extra entries appended to each rule set.
    /// Duplicates are dropped and the first occurrence keeps its position.
    pub fn extended(&self, names: &[String], extensions: &[String], smart: &[String]) -> Self {
        let mut rules = self.clone();
        for name in names {
            push_unique(&mut rules.names, name.trim().to_lowercase());
        }
        for ext in extensions {
            push_unique(&mut rules.extensions, ext.trim().to_lowercase());
        }
        for item in smart {
            push_unique(&mut rules.smart, item.trim().to_string());
        }
        rules
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn smart(&self) -> &[String] {
        &self.smart
    }

    /// Decides whether `path` is hidden from the tree under `mode`.
    ///
    /// Looks at the filesystem once to learn whether the path is a regular
    /// file; a path that cannot be inspected is judged by its name alone.
    pub fn should_exclude(&self, path: &Path, mode: FilterMode) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        let kind = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => EntryKind::File,
            _ => EntryKind::Directory,
        };
        self.should_exclude_entry(&name, kind, mode)
    }

    /// Pure form of [`should_exclude`](Self::should_exclude) for callers that
    /// already know the entry kind. First matching rule wins.
    pub fn should_exclude_entry(&self, name: &str, kind: EntryKind, mode: FilterMode) -> bool {
        if kind == EntryKind::File {
            let lower_name = name.to_lowercase();
            if self.names.iter().any(|n| *n == lower_name) {
                log::trace!("Excluded by file name rule: {}", name);
                return true;
            }
            if self.extensions.iter().any(|ext| lower_name.ends_with(ext.as_str())) {
                log::trace!("Excluded by extension rule: {}", name);
                return true;
            }
        }

        if mode == FilterMode::Smart && self.smart.iter().any(|item| item == name) {
            log::trace!("Excluded by smart rule: {}", name);
            return true;
        }

        false
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(".env")]
    #[case("package-lock.json")]
    #[case("Cargo.lock")]
    #[case("YARN.LOCK")]
    #[case("logo.png")]
    #[case("app.jar")]
    #[case("server.log")]
    #[case("Photo.JPEG")]
    fn always_excluded_files_in_every_mode(#[case] name: &str) {
        let rules = ExclusionRules::builtin();
        for mode in [FilterMode::Smart, FilterMode::AllFiles] {
            assert!(
                rules.should_exclude_entry(name, EntryKind::File, mode),
                "{} should be excluded in {}",
                name,
                mode
            );
        }
    }

    #[rstest]
    #[case("node_modules")]
    #[case(".git")]
    #[case("target")]
    #[case("__pycache__")]
    #[case(".venv")]
    fn smart_directories_only_in_smart_mode(#[case] name: &str) {
        let rules = ExclusionRules::builtin();
        assert!(rules.should_exclude_entry(name, EntryKind::Directory, FilterMode::Smart));
        assert!(!rules.should_exclude_entry(name, EntryKind::Directory, FilterMode::AllFiles));
    }

    #[test]
    fn smart_names_are_case_sensitive() {
        let rules = ExclusionRules::builtin();
        assert!(!rules.should_exclude_entry("Target", EntryKind::Directory, FilterMode::Smart));
        assert!(!rules.should_exclude_entry(
            "Node_Modules",
            EntryKind::Directory,
            FilterMode::Smart
        ));
    }

    #[test]
    fn smart_names_apply_to_files_too() {
        let rules = ExclusionRules::builtin();
        assert!(rules.should_exclude_entry("build", EntryKind::File, FilterMode::Smart));
        assert!(!rules.should_exclude_entry("build", EntryKind::File, FilterMode::AllFiles));
    }

    #[test]
    fn file_rules_do_not_touch_directories() {
        let rules = ExclusionRules::builtin();
        // A directory that happens to look like an archive or a lockfile stays visible.
        assert!(!rules.should_exclude_entry(
            "assets.zip",
            EntryKind::Directory,
            FilterMode::AllFiles
        ));
        assert!(!rules.should_exclude_entry(".env", EntryKind::Directory, FilterMode::AllFiles));
    }

    #[test]
    fn ordinary_sources_are_kept() {
        let rules = ExclusionRules::builtin();
        for name in ["main.rs", "README.md", ".env.example", "Dockerfile", "settings.py"] {
            assert!(!rules.should_exclude_entry(name, EntryKind::File, FilterMode::Smart));
        }
    }

    #[test]
    fn decision_is_deterministic() {
        let rules = ExclusionRules::builtin();
        let first = rules.should_exclude_entry("dist", EntryKind::Directory, FilterMode::Smart);
        for _ in 0..10 {
            assert_eq!(
                rules.should_exclude_entry("dist", EntryKind::Directory, FilterMode::Smart),
                first
            );
        }
    }

    #[test]
    fn extended_rules_normalize_and_dedup() {
        let rules = ExclusionRules::builtin().extended(
            &["Secrets.TXT".to_string(), ".env".to_string()],
            &[".CSV".to_string()],
            &["generated".to_string()],
        );
        assert!(rules.names().iter().filter(|n| *n == ".env").count() == 1);
        assert!(rules.should_exclude_entry("secrets.txt", EntryKind::File, FilterMode::AllFiles));
        assert!(rules.should_exclude_entry("data.csv", EntryKind::File, FilterMode::AllFiles));
        assert!(rules.should_exclude_entry("generated", EntryKind::Directory, FilterMode::Smart));
        assert!(!ExclusionRules::builtin().should_exclude_entry(
            "data.csv",
            EntryKind::File,
            FilterMode::AllFiles
        ));
    }

    #[test]
    fn should_exclude_inspects_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let lock_dir = dir.path().join("yarn.lock");
        fs::create_dir(&lock_dir).unwrap();
        let lock_file = dir.path().join("package-lock.json");
        fs::write(&lock_file, "{}").unwrap();

        let rules = ExclusionRules::builtin();
        assert!(!rules.should_exclude(&lock_dir, FilterMode::AllFiles));
        assert!(rules.should_exclude(&lock_file, FilterMode::AllFiles));
    }

    #[test]
    fn parses_filter_modes() {
        assert_eq!("smart".parse::<FilterMode>().unwrap(), FilterMode::Smart);
        assert_eq!("all-files".parse::<FilterMode>().unwrap(), FilterMode::AllFiles);
        assert_eq!("ALL_FILES".parse::<FilterMode>().unwrap(), FilterMode::AllFiles);
        assert!("everything".parse::<FilterMode>().is_err());
    }
}
