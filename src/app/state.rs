//! Defines the central, mutable state of a session.

use crate::config::{Preferences, PreferencesStore};
use crate::core::{SelectionMode, TreeModel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::events::SessionSummary;

/// Choices made for one run only. They sit on top of the preferences and are
/// never written back.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub mode: Option<SelectionMode>,
    pub include_tree: Option<bool>,
    /// Exclude patterns used in addition to the remembered ones.
    pub exclude_patterns: Vec<String>,
}

/// Holds the complete, mutable state of a session.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` so that commands and the
/// background combine task can share it.
pub struct AppState {
    /// The user's persisted preferences.
    pub preferences: Preferences,
    /// Per-run choices layered over `preferences`.
    pub overrides: SessionOverrides,
    /// Where `preferences` are written back to.
    pub store: Arc<dyn PreferencesStore>,
    /// The explored folder, once one has been opened.
    pub tree: Option<TreeModel>,
    /// `true` while a combine is running.
    pub is_generating: bool,
    /// A handle to the running combine task.
    pub generation_task: Option<JoinHandle<()>>,
    /// Flag observed by the running combine. Replaced for every new batch.
    pub generation_cancellation_flag: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(preferences: Preferences, store: Arc<dyn PreferencesStore>) -> Self {
        Self {
            preferences,
            overrides: SessionOverrides::default(),
            store,
            tree: None,
            is_generating: false,
            generation_task: None,
            generation_cancellation_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_overrides(mut self, overrides: SessionOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Signals the running combine to stop.
    ///
    /// The task is not aborted: it observes the flag between files and
    /// reports the cancellation itself.
    pub fn cancel_current_generation(&mut self) {
        if self.generation_task.take().is_some() {
            tracing::info!("Cancelling running combine");
        }
        self.generation_cancellation_flag
            .store(true, Ordering::SeqCst);
        self.is_generating = false;
    }

    /// Drops the open folder and cancels anything running on it.
    pub fn reset_tree(&mut self) {
        self.cancel_current_generation();
        self.tree = None;
    }

    /// Mode of the open tree, or the one the next opened folder gets.
    pub fn mode(&self) -> SelectionMode {
        self.tree
            .as_ref()
            .map(TreeModel::mode)
            .unwrap_or_else(|| self.initial_mode())
    }

    /// Mode a newly opened folder starts in.
    pub fn initial_mode(&self) -> SelectionMode {
        self.overrides
            .mode
            .unwrap_or_else(|| self.preferences.selection_mode())
    }

    pub fn include_tree(&self) -> bool {
        self.overrides
            .include_tree
            .unwrap_or(self.preferences.include_tree)
    }

    /// Remembered exclude patterns followed by this run's extra ones.
    pub fn exclude_patterns(&self) -> Vec<String> {
        let mut patterns = self.preferences.exclude_patterns.clone();
        for pattern in &self.overrides.exclude_patterns {
            if !patterns.contains(pattern) {
                patterns.push(pattern.clone());
            }
        }
        patterns
    }

    /// Writes preferences back to the store. Failures are logged only.
    pub fn persist_preferences(&self) {
        if let Err(e) = self.store.save(&self.preferences) {
            tracing::warn!("Failed to save preferences: {}", e);
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let (root, loaded_nodes, selected_files, extensions) = match &self.tree {
            Some(tree) => (
                Some(tree.root_path().to_path_buf()),
                tree.root().loaded_descendants(),
                tree.resolve().len(),
                tree.extensions().entries(),
            ),
            None => (None, 0, 0, Vec::new()),
        };

        SessionSummary {
            root,
            mode: self.mode(),
            loaded_nodes,
            selected_files,
            extensions,
            recent_projects: self.preferences.recent_projects.clone(),
            is_generating: self.is_generating,
        }
    }
}
