//! Tracks the file extensions discovered while browsing and whether each one
//! takes part in the combined output.

use super::SelectionMode;
use indexmap::{IndexMap, IndexSet};

/// A discovered extension and its inclusion flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionEntry {
    pub extension: String,
    pub included: bool,
}

/// Registry of discovered extensions, kept in discovery order for display.
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    entries: IndexMap<String, bool>,
    mode: SelectionMode,
    /// Extensions the user explicitly excluded, seen or not. These stay
    /// excluded across mode changes and are what gets remembered.
    user_exclusions: IndexSet<String>,
}

impl ExtensionRegistry {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            entries: IndexMap::new(),
            mode,
            user_exclusions: IndexSet::new(),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Switches the mode and resets every known extension to its default.
    /// User exclusions survive the switch.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
        for (extension, included) in self.entries.iter_mut() {
            *included = !self.user_exclusions.contains(extension) && mode.default_included();
        }
    }

    /// Registers `extension` if unseen. Returns `true` when it was new.
    ///
    /// Registering a known extension never touches its inclusion flag.
    pub fn register(&mut self, extension: &str) -> bool {
        if self.entries.contains_key(extension) {
            return false;
        }
        let included =
            !self.user_exclusions.contains(extension) && self.mode.default_included();
        tracing::debug!("Registered extension '{}' (included: {})", extension, included);
        self.entries.insert(extension.to_string(), included);
        true
    }

    /// Sets the inclusion flag of a known extension. Unknown extensions are
    /// left unregistered and `false` is returned.
    pub fn set_included(&mut self, extension: &str, included: bool) -> bool {
        match self.entries.get_mut(extension) {
            Some(flag) => {
                *flag = included;
                if included {
                    self.user_exclusions.shift_remove(extension);
                } else {
                    self.user_exclusions.insert(extension.to_string());
                }
                true
            }
            None => {
                tracing::debug!("Ignoring inclusion change for unknown extension '{}'", extension);
                false
            }
        }
    }

    /// Fails closed: an extension never seen cannot have been included.
    pub fn is_included(&self, extension: &str) -> bool {
        self.entries.get(extension).copied().unwrap_or(false)
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.entries.contains_key(extension)
    }

    /// Marks the given extensions as excluded, now if known or on registration otherwise.
    pub fn apply_exclusions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for extension in extensions {
            let extension = extension.as_ref();
            if let Some(flag) = self.entries.get_mut(extension) {
                *flag = false;
            }
            self.user_exclusions.insert(extension.to_string());
        }
    }

    /// Extensions the user excluded, in the order they were excluded.
    ///
    /// Extensions that are only off because of the mode default are not
    /// listed.
    pub fn user_exclusions(&self) -> Vec<String> {
        self.user_exclusions.iter().cloned().collect()
    }

    pub fn entries(&self) -> Vec<ExtensionEntry> {
        self.entries
            .iter()
            .map(|(extension, included)| ExtensionEntry {
                extension: extension.clone(),
                included: *included,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
