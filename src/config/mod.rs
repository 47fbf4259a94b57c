pub mod settings;

use crate::core::{OutputFormat, SelectionMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use settings::{JsonFileStore, PreferencesStore};

/// Maximum number of entries kept in `recent_projects`.
pub const MAX_RECENT_PROJECTS: usize = 10;

const DEFAULT_OUTPUT_FILENAME: &str = "combined_code.txt";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Preferences {
    /// Most recently opened folder first.
    pub recent_projects: Vec<PathBuf>,
    pub last_folder: Option<PathBuf>,
    pub last_output: Option<PathBuf>,
    pub output_format: OutputFormat,
    /// Extensions the user excluded in a previous session, e.g. `".lock"`.
    pub excluded_extensions: Vec<String>,
    /// Gitignore-style patterns hidden from the tree.
    pub exclude_patterns: Vec<String>,
    pub reverse_ignore_mode: bool,
    pub max_workers: usize,
    pub include_tree: bool,
    pub max_file_size_mb: u64,
    /// Keep the previous output as `<name>.bak` before overwriting it.
    pub create_backup: bool,
}

impl Preferences {
    pub fn selection_mode(&self) -> SelectionMode {
        if self.reverse_ignore_mode {
            SelectionMode::ReverseIgnore
        } else {
            SelectionMode::Normal
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Where the combined document goes when the user has not picked a path.
    pub fn output_path(&self) -> PathBuf {
        self.last_output.clone().unwrap_or_else(default_output_path)
    }

    /// Moves `folder` to the front of the recent list, dropping duplicates
    /// and anything beyond [`MAX_RECENT_PROJECTS`].
    pub fn add_recent_project(&mut self, folder: &Path) {
        self.recent_projects.retain(|p| p != folder);
        self.recent_projects.insert(0, folder.to_path_buf());
        self.recent_projects.truncate(MAX_RECENT_PROJECTS);
    }

    /// Returns true if the folder was in the list.
    pub fn remove_recent_project(&mut self, folder: &Path) -> bool {
        let before = self.recent_projects.len();
        self.recent_projects.retain(|p| p != folder);
        before != self.recent_projects.len()
    }

    /// Drops recent projects that no longer exist on disk.
    pub fn prune_missing_projects(&mut self) -> Vec<PathBuf> {
        let (kept, missing): (Vec<_>, Vec<_>) = self
            .recent_projects
            .drain(..)
            .partition(|p| p.is_dir());
        self.recent_projects = kept;
        for path in &missing {
            tracing::info!("Removing missing recent project {:?}", path);
        }
        missing
    }

    pub fn clear_recent_projects(&mut self) {
        self.recent_projects.clear();
    }
}

impl Default for Preferences {
    fn default() -> Self {
        let exclude_patterns = ["*.pyc", "__pycache__", ".git", ".vscode", ".idea"]
            .into_iter()
            .map(String::from)
            .collect();

        Self {
            recent_projects: Vec::new(),
            last_folder: None,
            last_output: None,
            output_format: OutputFormat::default(),
            excluded_extensions: Vec::new(),
            exclude_patterns,
            reverse_ignore_mode: false,
            max_workers: 8,
            include_tree: false,
            max_file_size_mb: 20,
            create_backup: true,
        }
    }
}

fn default_output_path() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_OUTPUT_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recent_projects_are_deduplicated_and_capped() {
        let mut prefs = Preferences::default();
        for i in 0..12 {
            prefs.add_recent_project(Path::new(&format!("/p/{i}")));
        }
        prefs.add_recent_project(Path::new("/p/5"));

        assert_eq!(prefs.recent_projects.len(), MAX_RECENT_PROJECTS);
        assert_eq!(prefs.recent_projects[0], PathBuf::from("/p/5"));
        assert_eq!(prefs.recent_projects[1], PathBuf::from("/p/11"));
        assert_eq!(
            prefs.recent_projects.iter().filter(|p| **p == PathBuf::from("/p/5")).count(),
            1
        );
        assert!(!prefs.recent_projects.contains(&PathBuf::from("/p/0")));
    }

    #[test]
    fn remove_and_prune_recent_projects() {
        let dir = tempdir().unwrap();
        let mut prefs = Preferences::default();
        prefs.add_recent_project(Path::new("/definitely/not/here"));
        prefs.add_recent_project(dir.path());

        assert!(!prefs.remove_recent_project(Path::new("/nope")));
        let missing = prefs.prune_missing_projects();

        assert_eq!(missing, vec![PathBuf::from("/definitely/not/here")]);
        assert_eq!(prefs.recent_projects, vec![dir.path().to_path_buf()]);
        assert!(prefs.remove_recent_project(dir.path()));
        assert!(prefs.recent_projects.is_empty());
    }

    #[test]
    fn mode_follows_reverse_ignore_flag() {
        let mut prefs = Preferences::default();
        assert_eq!(prefs.selection_mode(), SelectionMode::Normal);
        prefs.reverse_ignore_mode = true;
        assert_eq!(prefs.selection_mode(), SelectionMode::ReverseIgnore);
        assert_eq!(prefs.max_file_size_bytes(), 20 * 1024 * 1024);
    }

    #[test]
    fn explicit_output_path_wins() {
        let mut prefs = Preferences::default();
        assert!(prefs.output_path().ends_with(DEFAULT_OUTPUT_FILENAME));
        prefs.last_output = Some(PathBuf::from("/tmp/out.md"));
        assert_eq!(prefs.output_path(), PathBuf::from("/tmp/out.md"));
    }
}
