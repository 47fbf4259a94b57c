pub mod error;
pub mod extensions;
pub mod formatter;
pub mod ignore;
pub mod ingest;
pub mod listing;
pub mod scanner;
pub mod selection;
pub mod tree;
pub mod tree_generator;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether a directory entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// One immediate child returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Size in bytes for files, `None` for directories or when unknown.
    pub size: Option<u64>,
}

/// Default check state of newly discovered nodes and extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Everything starts included; the user opts out.
    #[default]
    Normal,
    /// Everything starts excluded; the user opts in.
    ReverseIgnore,
}

impl SelectionMode {
    pub fn default_included(self) -> bool {
        matches!(self, SelectionMode::Normal)
    }
}

/// Progress of a running ingestion batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestProgress {
    pub current_file: PathBuf,
    pub processed: usize,
    pub total: usize,
}

/// Returns the normalized extension key for a file path: lower-cased with a
/// leading dot (".rs"), or `""` when the file has none.
pub fn extension_key(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

pub use error::{CoreError, CoreResult};
pub use extensions::{ExtensionEntry, ExtensionRegistry};
pub use formatter::{Formatter, OutputFormat};
pub use ingest::{IngestError, IngestErrorKind, IngestResult, ParallelIngestor};
pub use listing::{render_rows, visible_rows, ListingRow};
pub use scanner::DirectoryScanner;
pub use selection::SelectionResolver;
pub use tree::{CheckState, TreeEvent, TreeModel, TreeNode};
pub use tree_generator::TreeGenerator;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_key_is_lowercase_with_dot() {
        assert_eq!(extension_key(Path::new("src/Main.RS")), ".rs");
        assert_eq!(extension_key(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(extension_key(Path::new("Makefile")), "");
        assert_eq!(extension_key(Path::new(".gitignore")), "");
    }
}
