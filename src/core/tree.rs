//! The explored part of a project directory as an owned tree.
//!
//! Nodes are created when their parent is expanded and live until the whole
//! model is dropped (opening a new root builds a new model). Each directory
//! owns its children exclusively; there is no cache outside the model.

use super::scanner::DirectoryScanner;
use super::{extension_key, CoreError, CoreResult, EntryKind, ExtensionRegistry, SelectionMode};
use crate::utils::file_detection::likely_text;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Tri-state check box value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckState {
    Checked,
    Unchecked,
    /// A directory whose loaded children disagree.
    Partial,
}

impl CheckState {
    pub fn from_bool(checked: bool) -> Self {
        if checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        }
    }

    pub fn is_checked(self) -> bool {
        self == CheckState::Checked
    }

    /// Derives a directory's state from its loaded children.
    ///
    /// Returns `None` for an empty iterator: a directory without loaded
    /// children keeps whatever state it has.
    pub fn from_children<I>(states: I) -> Option<CheckState>
    where
        I: IntoIterator<Item = CheckState>,
    {
        let mut any_checked = false;
        let mut any_unchecked = false;
        for state in states {
            match state {
                CheckState::Checked => any_checked = true,
                CheckState::Unchecked => any_unchecked = true,
                CheckState::Partial => return Some(CheckState::Partial),
            }
            if any_checked && any_unchecked {
                return Some(CheckState::Partial);
            }
        }
        match (any_checked, any_unchecked) {
            (true, false) => Some(CheckState::Checked),
            (false, true) => Some(CheckState::Unchecked),
            (true, true) => Some(CheckState::Partial),
            (false, false) => None,
        }
    }
}

/// Non-fatal problems met while expanding directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEvent {
    /// The directory could not be listed and is shown without children.
    AccessDenied { path: PathBuf, message: String },
    /// The directory resolves to one of its ancestors and was not entered.
    CycleSkipped { path: PathBuf },
}

/// A file or directory in the explored tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    path: PathBuf,
    name: String,
    kind: EntryKind,
    checked: CheckState,
    expanded: bool,
    children_loaded: bool,
    children: Vec<TreeNode>,
    real_path: Option<PathBuf>,
    extension: Option<String>,
    size: Option<u64>,
    is_text: bool,
}

impl TreeNode {
    fn new(path: PathBuf, name: String, kind: EntryKind, checked: CheckState) -> Self {
        let (extension, is_text) = match kind {
            EntryKind::File => (Some(extension_key(&path)), likely_text(&path)),
            EntryKind::Directory => (None, false),
        };
        Self {
            path,
            name,
            kind,
            checked,
            expanded: false,
            children_loaded: false,
            children: Vec::new(),
            real_path: None,
            extension,
            size: None,
            is_text,
        }
    }

    fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn checked(&self) -> CheckState {
        self.checked
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn children_loaded(&self) -> bool {
        self.children_loaded
    }

    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Extension key of a file (see [`extension_key`]); `None` for directories.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// File size seen when the parent was listed.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Whether a file looks like text from its extension. Always `false`
    /// for directories.
    pub fn is_text(&self) -> bool {
        self.is_text
    }

    /// Number of loaded nodes below this one.
    pub fn loaded_descendants(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.loaded_descendants())
            .sum()
    }

    fn child_named(&self, name: &OsString) -> Option<&TreeNode> {
        self.children
            .iter()
            .find(|child| child.path.file_name() == Some(name.as_os_str()))
    }

    fn child_named_mut(&mut self, name: &OsString) -> Option<&mut TreeNode> {
        self.children
            .iter_mut()
            .find(|child| child.path.file_name() == Some(name.as_os_str()))
    }

    /// Sets this node and every loaded descendant to `state`.
    fn set_state_recursive(&mut self, state: CheckState) {
        self.checked = state;
        for child in &mut self.children {
            child.set_state_recursive(state);
        }
    }

    fn recompute_state(&mut self) {
        if let Some(state) = CheckState::from_children(self.children.iter().map(|c| c.checked)) {
            self.checked = state;
        }
    }

    /// Walks down `components`, applies `f` to the target node, then
    /// recomputes every directory on the way back up.
    fn update_at<F, R>(&mut self, components: &[OsString], full_path: &Path, f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut TreeNode) -> R,
    {
        match components.split_first() {
            None => Ok(f(self)),
            Some((head, rest)) => {
                let child = self
                    .child_named_mut(head)
                    .ok_or_else(|| CoreError::NodeNotFound(full_path.to_path_buf()))?;
                let result = child.update_at(rest, full_path, f)?;
                self.recompute_state();
                Ok(result)
            }
        }
    }
}

/// The lazily explored tree of one root directory, with the extension
/// registry it feeds.
pub struct TreeModel {
    root: TreeNode,
    scanner: DirectoryScanner,
    mode: SelectionMode,
    extensions: ExtensionRegistry,
    events: Vec<TreeEvent>,
}

impl TreeModel {
    /// Opens `root` and loads its immediate children.
    ///
    /// Fails only when `root` is missing or not a directory.
    pub fn open(root: &Path, scanner: DirectoryScanner, mode: SelectionMode) -> CoreResult<Self> {
        let root_path =
            std::path::absolute(root).map_err(|e| CoreError::Io(e, root.to_path_buf()))?;
        match fs::metadata(&root_path) {
            Ok(md) if md.is_dir() => {}
            _ => return Err(CoreError::NotADirectory(root_path)),
        }

        let name = root_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root_path.display().to_string());

        tracing::info!("Opening root folder: {}", root_path.display());

        let root_node = TreeNode::new(
            root_path.clone(),
            name,
            EntryKind::Directory,
            CheckState::from_bool(mode.default_included()),
        );

        let mut model = Self {
            root: root_node,
            scanner,
            mode,
            extensions: ExtensionRegistry::new(mode),
            events: Vec::new(),
        };
        model.expand(&root_path)?;
        Ok(model)
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn root_path(&self) -> &Path {
        &self.root.path
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    /// Warnings collected by expansions since the last [`take_events`](Self::take_events).
    pub fn events(&self) -> &[TreeEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Looks up a loaded node. Relative paths are taken from the root.
    pub fn node(&self, path: &Path) -> Option<&TreeNode> {
        let (_, components) = self.components_of(path).ok()?;
        let mut current = &self.root;
        for name in &components {
            current = current.child_named(name)?;
        }
        Some(current)
    }

    /// Loads the children of a directory the first time it is expanded.
    ///
    /// Listing failures leave the directory empty and are recorded as
    /// [`TreeEvent`]s; they are never returned as errors.
    pub fn expand(&mut self, path: &Path) -> CoreResult<()> {
        let (full_path, components) = self.components_of(path)?;

        let (ancestors, inherited) = {
            let mut ancestors = Vec::with_capacity(components.len());
            let mut current = &self.root;
            for name in &components {
                if let Some(real) = &current.real_path {
                    ancestors.push(real.clone());
                }
                current = current
                    .child_named(name)
                    .ok_or_else(|| CoreError::NodeNotFound(full_path.clone()))?;
            }
            if !current.is_dir() {
                return Err(CoreError::NotADirectory(full_path));
            }
            if current.children_loaded {
                return self.root.update_at(&components, &full_path, |node| {
                    node.expanded = true;
                });
            }
            let inherited = match current.checked {
                CheckState::Partial => CheckState::from_bool(self.mode.default_included()),
                state => state,
            };
            (ancestors, inherited)
        };

        let real_path = fs::canonicalize(&full_path).ok();
        let children = match self.scanner.list_guarded(&full_path, &ancestors) {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| {
                    let node = TreeNode::new(entry.path, entry.name, entry.kind, inherited)
                        .with_size(entry.size);
                    if let Some(ext) = node.extension() {
                        self.extensions.register(ext);
                    }
                    node
                })
                .collect(),
            Err(CoreError::CycleSkipped(path)) => {
                self.events.push(TreeEvent::CycleSkipped { path });
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Treating {} as empty: {}", full_path.display(), e);
                self.events.push(TreeEvent::AccessDenied {
                    path: full_path.clone(),
                    message: e.to_string(),
                });
                Vec::new()
            }
        };

        tracing::debug!("Expanded {} ({} children)", full_path.display(), children.len());

        self.root.update_at(&components, &full_path, move |node| {
            node.children = children;
            node.children_loaded = true;
            node.expanded = true;
            node.real_path = real_path;
        })
    }

    /// Expands `path` and its loaded subdirectories breadth-first, `max_depth`
    /// levels deep (0 expands only `path`).
    pub fn expand_recursive(&mut self, path: &Path, max_depth: usize) -> CoreResult<()> {
        let mut queue = VecDeque::from([(path.to_path_buf(), 0usize)]);
        while let Some((dir, depth)) = queue.pop_front() {
            self.expand(&dir)?;
            if depth >= max_depth {
                continue;
            }
            if let Some(node) = self.node(&dir) {
                queue.extend(
                    node.children
                        .iter()
                        .filter(|child| child.is_dir())
                        .map(|child| (child.path.clone(), depth + 1)),
                );
            }
        }
        Ok(())
    }

    /// Hides a directory's children without discarding them.
    pub fn collapse(&mut self, path: &Path) -> CoreResult<()> {
        let (full_path, components) = self.components_of(path)?;
        self.root.update_at(&components, &full_path, |node| {
            node.expanded = false;
        })
    }

    /// Checks or unchecks a node and all of its loaded descendants, then
    /// recomputes the states of its ancestors.
    ///
    /// Subdirectories that are not loaded yet pass the new state on to their
    /// children when they are expanded later.
    pub fn set_checked(&mut self, path: &Path, checked: bool) -> CoreResult<()> {
        let (full_path, components) = self.components_of(path)?;
        let state = CheckState::from_bool(checked);
        self.root.update_at(&components, &full_path, |node| {
            node.set_state_recursive(state);
        })
    }

    /// Switches between normal and reverse-ignore mode, resetting every
    /// loaded node to the new mode's default.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        tracing::info!("Switching selection mode to {:?}", mode);
        self.mode = mode;
        self.extensions.set_mode(mode);
        self.root
            .set_state_recursive(CheckState::from_bool(mode.default_included()));
    }

    /// Resolves the ordered batch of files to combine.
    pub fn resolve(&self) -> Vec<PathBuf> {
        super::SelectionResolver::resolve(&self.root, &self.extensions, self.mode)
    }

    /// Splits `path` into the names leading from the root to it.
    fn components_of(&self, path: &Path) -> CoreResult<(PathBuf, Vec<OsString>)> {
        let full_path = if path.is_relative() {
            self.root.path.join(path)
        } else {
            path.to_path_buf()
        };
        let relative = full_path
            .strip_prefix(&self.root.path)
            .map_err(|_| CoreError::NodeNotFound(full_path.clone()))?;

        let mut components = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => components.push(name.to_os_string()),
                Component::CurDir => {}
                _ => return Err(CoreError::NodeNotFound(full_path.clone())),
            }
        }
        Ok((full_path, components))
    }
}
