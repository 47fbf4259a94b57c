//! Contains the command handlers a front end calls to drive a session.
//!
//! Each handler locks the `AppState`, applies its change to the tree or the
//! preferences, and sends `SessionEvent`s back through the `EventProxy`.
//! Handlers that can fail also return the error so a scripted caller (the
//! CLI) can stop on it.

use super::events::SessionEvent;
use super::helpers::{lock_state, notify, with_state_and_notify};
use super::proxy::EventProxy;
use super::state::AppState;
use super::tasks::{self, CombineJob};
use crate::core::formatter::PREVIEW_FILES;
use crate::core::{
    extension_key, CoreError, CoreResult, DirectoryScanner, Formatter, ParallelIngestor,
    SelectionMode, TreeModel,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

/// Opens `path` as the session's root folder, replacing any open folder.
///
/// Remembered excluded extensions and exclude patterns are applied, and the
/// folder moves to the front of the recent projects.
pub fn open_folder<P: EventProxy>(
    path: &Path,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> CoreResult<()> {
    let path = &std::path::absolute(path).map_err(|e| CoreError::Io(e, path.to_path_buf()))?;
    let mut state_guard = lock_state(&state);
    state_guard.reset_tree();

    let scanner = DirectoryScanner::with_exclude_patterns(path, state_guard.exclude_patterns());
    let mode = state_guard.initial_mode();

    match TreeModel::open(path, scanner, mode) {
        Ok(mut tree) => {
            tree.extensions_mut()
                .apply_exclusions(&state_guard.preferences.excluded_extensions);
            let root = tree.root_path().to_path_buf();
            state_guard.tree = Some(tree);
            state_guard.preferences.last_folder = Some(root.clone());
            state_guard.preferences.prune_missing_projects();
            state_guard.preferences.add_recent_project(&root);
            state_guard.persist_preferences();
            notify(&mut state_guard, &proxy);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to open {}: {}", path.display(), e);
            if matches!(e, CoreError::NotADirectory(_))
                && state_guard.preferences.remove_recent_project(path)
            {
                state_guard.persist_preferences();
            }
            proxy.send_event(SessionEvent::Error(e.to_string()));
            notify(&mut state_guard, &proxy);
            Err(e)
        }
    }
}

/// Runs `f` against the open tree, reporting a missing folder or a failed
/// operation to the front end.
fn with_tree<P, F>(proxy: &P, state: &Arc<Mutex<AppState>>, f: F) -> CoreResult<()>
where
    P: EventProxy,
    F: FnOnce(&mut TreeModel) -> CoreResult<()>,
{
    with_state_and_notify(state, proxy, |s| {
        let result = match s.tree.as_mut() {
            Some(tree) => f(tree),
            None => Err(CoreError::NoFolderOpen),
        };
        if let Err(e) = &result {
            tracing::warn!("Tree command failed: {}", e);
            proxy.send_event(SessionEvent::Error(e.to_string()));
        }
        result
    })
}

/// Loads and shows a directory's children. Relative paths are taken from the root.
pub fn expand<P: EventProxy>(path: &Path, proxy: P, state: Arc<Mutex<AppState>>) -> CoreResult<()> {
    with_tree(&proxy, &state, |tree| tree.expand(path))
}

/// Expands `path` and its subdirectories `depth` levels deep.
pub fn expand_recursive<P: EventProxy>(
    path: &Path,
    depth: usize,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> CoreResult<()> {
    with_tree(&proxy, &state, |tree| tree.expand_recursive(path, depth))
}

/// Hides a directory's children; they stay loaded.
pub fn collapse<P: EventProxy>(
    path: &Path,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> CoreResult<()> {
    with_tree(&proxy, &state, |tree| tree.collapse(path))
}

/// Checks or unchecks a node together with its loaded descendants.
pub fn set_checked<P: EventProxy>(
    path: &Path,
    checked: bool,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> CoreResult<()> {
    with_tree(&proxy, &state, |tree| tree.set_checked(path, checked))
}

/// Includes or excludes an extension. Exclusions are remembered; including
/// an extension forgets its exclusion.
///
/// `extension` may be given with or without the leading dot. Returns false if
/// no open folder has shown a file with that extension yet.
pub fn set_extension_included<P: EventProxy>(
    extension: &str,
    included: bool,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> bool {
    let key = normalize_extension(extension);
    with_state_and_notify(&state, &proxy, |s| {
        let Some(tree) = s.tree.as_mut() else {
            tracing::warn!("No folder open, ignoring extension {:?}", key);
            return false;
        };
        if !tree.extensions_mut().set_included(&key, included) {
            tracing::warn!("Unknown extension {:?}", key);
            return false;
        }
        s.preferences.excluded_extensions = tree.extensions().user_exclusions();
        s.persist_preferences();
        true
    })
}

/// Switches between normal and reverse-ignore mode.
///
/// Every loaded node and every known extension is reset to the new mode's
/// default; excluded extensions stay excluded. The choice is remembered and
/// replaces any per-run mode.
pub fn set_mode<P: EventProxy>(mode: SelectionMode, proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        if let Some(tree) = s.tree.as_mut() {
            tree.set_mode(mode);
        }
        s.overrides.mode = None;
        s.preferences.reverse_ignore_mode = mode == SelectionMode::ReverseIgnore;
        s.persist_preferences();
    });
}

/// Checks every loaded node.
pub fn select_all<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) -> CoreResult<()> {
    with_tree(&proxy, &state, |tree| {
        let root = tree.root_path().to_path_buf();
        tree.set_checked(&root, true)
    })
}

/// Unchecks every loaded node.
pub fn deselect_all<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) -> CoreResult<()> {
    with_tree(&proxy, &state, |tree| {
        let root = tree.root_path().to_path_buf();
        tree.set_checked(&root, false)
    })
}

/// Returns the files a combine would read right now, in output order.
pub fn resolve_selection(state: &Arc<Mutex<AppState>>) -> Vec<PathBuf> {
    lock_state(state)
        .tree
        .as_ref()
        .map(TreeModel::resolve)
        .unwrap_or_default()
}

/// Starts combining the current selection in the background.
///
/// The selection is resolved once, here; edits made while the batch runs do
/// not change it. `output` overrides and updates the remembered output path.
/// A running combine is cancelled first.
pub fn start_combine<P: EventProxy>(
    output: Option<PathBuf>,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> CoreResult<()> {
    let mut state_guard = lock_state(&state);

    let Some(tree) = state_guard.tree.as_ref() else {
        proxy.send_event(SessionEvent::Error(CoreError::NoFolderOpen.to_string()));
        return Err(CoreError::NoFolderOpen);
    };
    let root = tree.root_path().to_path_buf();
    let files = tree.resolve();

    state_guard.cancel_current_generation();

    if let Some(path) = output {
        state_guard.preferences.last_output = Some(path);
        state_guard.persist_preferences();
    }
    let include_tree = state_guard.include_tree();
    let prefs = &state_guard.preferences;
    let job = CombineJob {
        root,
        files,
        output: prefs.output_path(),
        format: prefs.output_format,
        include_tree,
        create_backup: prefs.create_backup,
        ingestor: ParallelIngestor::new(prefs.max_workers)
            .with_max_file_size(prefs.max_file_size_bytes()),
    };
    tracing::info!(
        "Combining {} files into {}",
        job.files.len(),
        job.output.display()
    );

    let new_cancel_flag = Arc::new(AtomicBool::new(false));
    state_guard.generation_cancellation_flag = new_cancel_flag.clone();
    state_guard.is_generating = true;

    // Send an immediate update so the front end shows the running state.
    notify(&mut state_guard, &proxy);

    let proxy_clone = proxy.clone();
    let state_clone = state.clone();
    let handle = tokio::spawn(async move {
        tasks::combine_task(proxy_clone, state_clone, job, new_cancel_flag).await;
    });
    state_guard.generation_task = Some(handle);
    Ok(())
}

/// Cancels the running combine, if any.
pub fn cancel_combine<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        tracing::info!("cancel_combine received");
        s.cancel_current_generation();
    });
}

/// Renders a preview of the current selection: the first few files, cut
/// short, and a count of the rest.
pub async fn preview_combine(state: &Arc<Mutex<AppState>>) -> CoreResult<String> {
    let (root, sample, total, format, ingestor) = {
        let state_guard = lock_state(state);
        let tree = state_guard.tree.as_ref().ok_or(CoreError::NoFolderOpen)?;
        let mut files = tree.resolve();
        let total = files.len();
        files.truncate(PREVIEW_FILES);
        let prefs = &state_guard.preferences;
        (
            tree.root_path().to_path_buf(),
            files,
            total,
            prefs.output_format,
            ParallelIngestor::new(prefs.max_workers)
                .with_max_file_size(prefs.max_file_size_bytes()),
        )
    };

    let results = ingestor
        .ingest_async(sample, Arc::new(AtomicBool::new(false)), |_| {})
        .await?;
    Ok(Formatter::new(format, &root).render_preview(&results, total))
}

/// Forgets every recent project.
pub fn clear_recent_projects<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        s.preferences.clear_recent_projects();
        s.persist_preferences();
    });
}

/// `"RS"` and `".rs"` both become `".rs"`; `""` stays the no-extension key.
fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    extension_key(Path::new(&format!("x.{}", trimmed.trim_start_matches('.'))))
}
