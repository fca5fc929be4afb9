use crate::error::{AppError, Result};
use crate::rules::{ExclusionRules, FilterMode};
use log;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One scanned filesystem entry. The kind is decided once, at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSystemEntry {
    path: PathBuf,
    #[serde(rename = "type")]
    kind: EntryKind,
    name: String,
}

impl FileSystemEntry {
    pub fn new(path: PathBuf, kind: EntryKind) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, kind, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Shared selection state of one file.
///
/// Clones point at the same flag, so a proxy node holding a clone reads and
/// writes the same bit as the node it was cloned from.
#[derive(Debug, Clone, Default)]
pub struct SelectionFlag(Arc<AtomicBool>);

impl SelectionFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, selected: bool) {
        self.0.store(selected, Ordering::Release);
    }

    pub fn is_linked_to(&self, other: &SelectionFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A node of the scanned project tree.
///
/// Directories own their children and never report as selected. Cloning a
/// node keeps the selection flags of every file shared with the original.
#[derive(Debug, Clone)]
pub struct TreeNode {
    entry: FileSystemEntry,
    children: Vec<TreeNode>,
    selected: SelectionFlag,
}

impl TreeNode {
    pub fn file(path: PathBuf) -> Self {
        Self {
            entry: FileSystemEntry::new(path, EntryKind::File),
            children: Vec::new(),
            selected: SelectionFlag::default(),
        }
    }

    pub fn directory(path: PathBuf, children: Vec<TreeNode>) -> Self {
        Self {
            entry: FileSystemEntry::new(path, EntryKind::Directory),
            children,
            selected: SelectionFlag::default(),
        }
    }

    /// A file node sharing `source`'s selection flag.
    pub(crate) fn linked_proxy(source: &TreeNode) -> Self {
        Self {
            entry: source.entry.clone(),
            children: Vec::new(),
            selected: source.selected.clone(),
        }
    }

    pub fn entry(&self) -> &FileSystemEntry {
        &self.entry
    }

    pub fn path(&self) -> &Path {
        self.entry.path()
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn is_file(&self) -> bool {
        self.entry.is_file()
    }

    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    pub fn is_selected(&self) -> bool {
        self.is_file() && self.selected.get()
    }

    /// Sets the flag of a file node. Directories ignore the call.
    pub fn set_selected(&self, selected: bool) {
        if self.is_file() {
            self.selected.set(selected);
        }
    }

    pub fn selection_flag(&self) -> &SelectionFlag {
        &self.selected
    }

    /// Pre-order iterator over this node and all descendants.
    pub fn iter(&self) -> TreeIter<'_> {
        TreeIter { stack: vec![self] }
    }

    /// Pre-order iterator over file nodes only.
    pub fn files(&self) -> impl Iterator<Item = &TreeNode> {
        self.iter().filter(|node| node.is_file())
    }

    pub fn find(&self, path: &Path) -> Option<&TreeNode> {
        self.iter().find(|node| node.path() == path)
    }
}

pub struct TreeIter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

impl Serialize for TreeNode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("TreeNode", 5)?;
        state.serialize_field("name", self.entry.name())?;
        state.serialize_field("type", &self.entry.kind())?;
        state.serialize_field("path", self.entry.path())?;
        if self.is_file() {
            state.serialize_field("selected", &self.is_selected())?;
        } else {
            state.skip_field("selected")?;
        }
        if self.children.is_empty() {
            state.skip_field("children")?;
        } else {
            state.serialize_field("children", &self.children)?;
        }
        state.end()
    }
}

/// Scans `project_root` into the master tree.
///
/// Children are listed in ordinal name order and filtered before descent,
/// so an excluded directory is never opened. A nested directory that cannot
/// be listed becomes a childless node; a root that cannot be listed fails
/// the whole build.
pub fn build_tree(
    project_root: &Path,
    mode: FilterMode,
    rules: &ExclusionRules,
) -> Result<TreeNode> {
    let root = project_root.canonicalize().map_err(|e| AppError::Scan {
        path: project_root.to_path_buf(),
        source: e,
    })?;
    let meta = fs::metadata(&root).map_err(|e| AppError::Scan {
        path: root.clone(),
        source: e,
    })?;
    if !meta.is_dir() {
        return Err(AppError::Scan {
            path: root,
            source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        });
    }
    fs::read_dir(&root).map_err(|e| AppError::Scan {
        path: root.clone(),
        source: e,
    })?;

    log::info!("Scanning project directory: {} (mode: {})", root.display(), mode);

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            match classify(entry) {
                Some(kind) => {
                    !rules.should_exclude_entry(&entry.file_name().to_string_lossy(), kind, mode)
                }
                None => false,
            }
        });

    // stack[d] is the open directory at depth d.
    let mut stack: Vec<TreeNode> = vec![TreeNode::directory(root.clone(), Vec::new())];
    let mut visited = 0usize;

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!(
                    "Skipping unreadable entry during scan: {} (at {})",
                    e,
                    e.path()
                        .map_or_else(|| "unknown path".into(), |p| p.display().to_string())
                );
                continue;
            }
        };
        let depth = entry.depth();
        if depth == 0 {
            continue;
        }
        while stack.len() > depth {
            close_directory(&mut stack);
        }
        let Some(kind) = classify(&entry) else {
            continue;
        };
        visited += 1;
        let descends = entry.file_type().is_dir();
        let path = entry.into_path();
        match kind {
            EntryKind::Directory if descends => {
                log::trace!("Entering directory: {}", path.display());
                stack.push(TreeNode::directory(path, Vec::new()));
            }
            EntryKind::Directory => {
                // Symlinked directory: shown, never descended.
                if let Some(parent) = stack.last_mut() {
                    parent.push_child(TreeNode::directory(path, Vec::new()));
                }
            }
            EntryKind::File => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_child(TreeNode::file(path));
                }
            }
        }
    }

    while stack.len() > 1 {
        close_directory(&mut stack);
    }
    let tree = stack.pop().unwrap_or_else(|| TreeNode::directory(root, Vec::new()));
    log::info!("Scan complete. {} entries kept.", visited);
    Ok(tree)
}

fn close_directory(stack: &mut Vec<TreeNode>) {
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.push_child(done);
        }
    }
}

fn classify(entry: &DirEntry) -> Option<EntryKind> {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        Some(EntryKind::Directory)
    } else if file_type.is_file() {
        Some(EntryKind::File)
    } else if file_type.is_symlink() {
        match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => Some(EntryKind::File),
            Ok(meta) if meta.is_dir() => Some(EntryKind::Directory),
            _ => None,
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_project() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "b.py", "print(2)");
        write(root, "a.py", "print(1)");
        write(root, ".env", "SECRET=1");
        write(root, "package-lock.json", "{}");
        write(root, "logo.png", "");
        write(root, "app.log", "");
        write(root, "lib.jar", "");
        write(root, "src/main.rs", "fn main() {}");
        write(root, "src/util/mod.rs", "");
        write(root, "node_modules/left-pad/index.js", "");
        write(root, "node_modules/left-pad/deep/x.js", "");
        write(root, "target/debug/out.txt", "");
        dir
    }

    fn relative_names(tree: &TreeNode) -> Vec<String> {
        let root = tree.path().to_path_buf();
        tree.iter()
            .skip(1)
            .map(|n| {
                n.path()
                    .strip_prefix(&root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn smart_mode_prunes_noise_directories() {
        let dir = sample_project();
        let tree = build_tree(dir.path(), FilterMode::Smart, ExclusionRules::builtin()).unwrap();
        assert_eq!(
            relative_names(&tree),
            vec!["a.py", "b.py", "src", "src/main.rs", "src/util", "src/util/mod.rs"]
        );
    }

    #[test]
    fn all_files_mode_keeps_directories_but_not_binaries() {
        let dir = sample_project();
        let tree = build_tree(dir.path(), FilterMode::AllFiles, ExclusionRules::builtin()).unwrap();
        let names = relative_names(&tree);
        assert!(names.contains(&"node_modules/left-pad/deep/x.js".to_string()));
        assert!(names.contains(&"target/debug/out.txt".to_string()));
        for hidden in [".env", "package-lock.json", "logo.png", "app.log", "lib.jar"] {
            assert!(!names.contains(&hidden.to_string()), "{} leaked", hidden);
        }
    }

    #[test]
    fn pruning_is_total() {
        let dir = sample_project();
        let tree = build_tree(dir.path(), FilterMode::Smart, ExclusionRules::builtin()).unwrap();
        assert!(tree.iter().all(|n| {
            !n.path()
                .components()
                .any(|c| c.as_os_str() == "node_modules" || c.as_os_str() == "target")
        }));
    }

    #[test]
    fn nodes_keep_kind_and_start_unselected() {
        let dir = sample_project();
        let tree = build_tree(dir.path(), FilterMode::Smart, ExclusionRules::builtin()).unwrap();
        assert!(!tree.is_file());
        let src = tree.children().iter().find(|n| n.name() == "src").unwrap();
        assert!(!src.is_file());
        assert_eq!(src.children().len(), 2);
        assert!(tree.files().all(|f| !f.is_selected()));
    }

    #[test]
    fn missing_root_is_a_scan_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = build_tree(&missing, FilterMode::Smart, ExclusionRules::builtin()).unwrap_err();
        assert!(matches!(err, AppError::Scan { .. }));
    }

    #[test]
    fn file_root_is_a_scan_failure() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "plain.txt", "x");
        let err = build_tree(
            &dir.path().join("plain.txt"),
            FilterMode::Smart,
            ExclusionRules::builtin(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Scan { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_becomes_childless() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "");
        write(dir.path(), "locked/inner.py", "");
        write(dir.path(), "z.py", "");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Privileged users can list it anyway.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = build_tree(dir.path(), FilterMode::Smart, ExclusionRules::builtin());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let tree = result.unwrap();

        let names: Vec<&str> = tree.children().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["a.py", "locked", "z.py"]);
        let locked_node = &tree.children()[1];
        assert!(!locked_node.is_file());
        assert!(locked_node.children().is_empty());
        assert_eq!(tree.files().count(), 2);
    }

    #[test]
    fn directories_ignore_selection() {
        let dir = sample_project();
        let tree = build_tree(dir.path(), FilterMode::Smart, ExclusionRules::builtin()).unwrap();
        tree.set_selected(true);
        assert!(!tree.is_selected());
    }

    #[test]
    fn serializes_tree_as_json() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "");
        let tree = build_tree(dir.path(), FilterMode::Smart, ExclusionRules::builtin()).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["type"], "directory");
        assert_eq!(json["children"][0]["name"], "a.py");
        assert_eq!(json["children"][0]["selected"], false);
        assert!(json.get("selected").is_none());
    }
}
