//! Generates an ASCII representation of a directory tree.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// A utility struct for generating an ASCII directory tree.
///
/// This struct is stateless and provides methods as associated functions.
pub struct TreeGenerator;

impl TreeGenerator {
    /// Renders the given files as a tree below `root_path`.
    ///
    /// Entries keep the order in which they first appear in `files`, so a
    /// resolved selection renders in the same order as the combined document.
    pub fn generate_tree(files: &[PathBuf], root_path: &Path) -> String {
        let mut top = Branch::default();

        for file in files {
            let relative = file.strip_prefix(root_path).unwrap_or(file);
            let names: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();

            let mut current = &mut top;
            for (i, name) in names.iter().enumerate() {
                current = current.children.entry(name.clone()).or_default();
                if i + 1 == names.len() {
                    current.is_file = true;
                }
            }
        }

        let mut result = format!(
            "{}/\n",
            root_path.file_name().unwrap_or_default().to_string_lossy()
        );
        Self::render_children(&top, &mut result, "");
        result
    }

    /// Recursively renders the children of a branch.
    fn render_children(branch: &Branch, result: &mut String, prefix: &str) {
        let count = branch.children.len();
        for (i, (name, child)) in branch.children.iter().enumerate() {
            let is_last = i + 1 == count;
            let connector = if is_last { "└── " } else { "├── " };
            let suffix = if child.is_file { "" } else { "/" };

            result.push_str(&format!("{prefix}{connector}{name}{suffix}\n"));

            if !child.children.is_empty() {
                let new_prefix = if is_last {
                    format!("{prefix}    ")
                } else {
                    format!("{prefix}│   ")
                };
                Self::render_children(child, result, &new_prefix);
            }
        }
    }
}

/// A transient node used for building the ASCII tree.
#[derive(Debug, Default)]
struct Branch {
    children: IndexMap<String, Branch>,
    is_file: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn renders_nested_selection_in_input_order() {
        let root = PathBuf::from("/work/project");
        let files = vec![
            root.join("src/bin/tool.rs"),
            root.join("src/lib.rs"),
            root.join("Cargo.toml"),
        ];

        let tree = TreeGenerator::generate_tree(&files, &root);

        assert_snapshot!(tree, @r"
        project/
        ├── src/
        │   ├── bin/
        │   │   └── tool.rs
        │   └── lib.rs
        └── Cargo.toml
        ");
    }

    #[test]
    fn empty_selection_renders_only_the_root() {
        let tree = TreeGenerator::generate_tree(&[], Path::new("/work/project"));
        assert_eq!(tree, "project/\n");
    }
}
