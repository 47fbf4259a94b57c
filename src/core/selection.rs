use super::{CheckState, ExtensionRegistry, SelectionMode, TreeNode};
use std::path::PathBuf;

/// Turns the loaded tree into the ordered batch of files to combine.
pub struct SelectionResolver;

impl SelectionResolver {
    /// Walks loaded nodes depth-first, children in listing order.
    ///
    /// A file is selected when it is checked and its extension is included.
    /// Subtrees that were never expanded contribute nothing. The mode does not
    /// change the rule: it only decides the defaults the tree was built with.
    pub fn resolve(root: &TreeNode, extensions: &ExtensionRegistry, mode: SelectionMode) -> Vec<PathBuf> {
        let mut selected = Vec::new();
        Self::collect(root, extensions, &mut selected);
        tracing::debug!(
            "Resolved {} files from {} ({:?} mode)",
            selected.len(),
            root.path().display(),
            mode
        );
        selected
    }

    fn collect(node: &TreeNode, extensions: &ExtensionRegistry, selected: &mut Vec<PathBuf>) {
        if node.is_dir() {
            // Loaded children of an unchecked directory are all unchecked.
            if node.checked() == CheckState::Unchecked {
                return;
            }
            for child in node.children() {
                Self::collect(child, extensions, selected);
            }
        } else if node.checked().is_checked()
            && extensions.is_included(node.extension().unwrap_or_default())
        {
            selected.push(node.path().to_path_buf());
        }
    }
}
