use crate::gather::TreeNode;
use std::borrow::Cow;

/// Returns the node a shell should render.
///
/// Hierarchical view is the master tree itself. Flat view is a new root with
/// one proxy per file, in pre-order, each sharing its selection flag with the
/// master node it stands for.
pub fn project(master: &TreeNode, flatten: bool) -> Cow<'_, TreeNode> {
    if !flatten {
        return Cow::Borrowed(master);
    }
    let mut flat_root = TreeNode::directory(master.path().to_path_buf(), Vec::new());
    for file in master.files() {
        flat_root.push_child(TreeNode::linked_proxy(file));
    }
    Cow::Owned(flat_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gather::build_tree;
    use crate::rules::{ExclusionRules, FilterMode};
    use std::fs;

    fn master() -> (tempfile::TempDir, TreeNode) {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["b.txt", "a/one.rs", "a/deep/two.rs", "c/three.rs"] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        let tree = build_tree(dir.path(), FilterMode::Smart, ExclusionRules::builtin()).unwrap();
        (dir, tree)
    }

    #[test]
    fn hierarchical_view_is_identity() {
        let (_dir, tree) = master();
        assert!(matches!(project(&tree, false), Cow::Borrowed(node) if std::ptr::eq(node, &tree)));
    }

    #[test]
    fn flat_view_lists_files_in_preorder() {
        let (_dir, tree) = master();
        let flat = project(&tree, true);
        let names: Vec<&str> = flat.children().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["two.rs", "one.rs", "b.txt", "three.rs"]);
        assert!(flat.children().iter().all(|n| n.is_file() && n.children().is_empty()));
        assert_eq!(flat.path(), tree.path());
    }

    #[test]
    fn flags_are_linked_both_ways() {
        let (_dir, tree) = master();
        let flat = project(&tree, true);

        let proxy = flat.children().iter().find(|n| n.name() == "one.rs").unwrap();
        let original = tree.find(proxy.path()).unwrap();
        assert!(proxy.selection_flag().is_linked_to(original.selection_flag()));

        proxy.set_selected(true);
        assert!(original.is_selected());
        original.set_selected(false);
        assert!(!proxy.is_selected());
    }

    #[test]
    fn reprojecting_is_idempotent() {
        let (_dir, tree) = master();
        tree.files().next().unwrap().set_selected(true);
        let first = project(&tree, true);
        let second = project(&tree, true);
        let states = |n: &TreeNode| -> Vec<(String, bool)> {
            n.children()
                .iter()
                .map(|c| (c.name().to_string(), c.is_selected()))
                .collect()
        };
        assert_eq!(states(&*first), states(&*second));
    }
}
