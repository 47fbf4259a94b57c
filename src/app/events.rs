//! Defines the events a session sends to whatever drives it.

use std::path::PathBuf;

use crate::core::{ExtensionEntry, IngestProgress, SelectionMode, TreeEvent};

/// Events sent from the session to its front end.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A snapshot of the session after a command changed it.
    StateUpdate(Box<SessionSummary>),
    /// A directory could not be listed, or was skipped as a cycle.
    TreeWarning(TreeEvent),
    /// One more file of the running combine has been read.
    Progress(IngestProgress),
    /// The combined document was written.
    CombineComplete(CombineReport),
    /// The running combine was cancelled before it finished.
    CombineCancelled,
    /// An error message to be shown to the user.
    Error(String),
}

/// What a front end needs to render the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub root: Option<PathBuf>,
    pub mode: SelectionMode,
    pub loaded_nodes: usize,
    pub selected_files: usize,
    pub extensions: Vec<ExtensionEntry>,
    pub recent_projects: Vec<PathBuf>,
    pub is_generating: bool,
}

/// Outcome of a finished combine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineReport {
    pub output: PathBuf,
    pub files: usize,
    pub failed: usize,
    pub bytes: usize,
}
