use super::ignore::build_exclude_matcher;
use super::{CoreError, CoreResult, DirEntry, EntryKind};
use ignore::gitignore::Gitignore;
use std::fs;
use std::path::{Path, PathBuf};

/// Lists the immediate children of a directory on demand.
///
/// The scanner never recurses and keeps no cache; the tree model decides when
/// a directory is listed and owns the results.
pub struct DirectoryScanner {
    exclude: Option<Gitignore>,
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryScanner {
    pub fn new() -> Self {
        Self { exclude: None }
    }

    /// Creates a scanner that omits entries matching gitignore-style `patterns`
    /// (relative to `root`).
    pub fn with_exclude_patterns<I, S>(root: &Path, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = build_exclude_matcher(root, patterns);
        let exclude = (!matcher.is_empty()).then_some(matcher);
        Self { exclude }
    }

    /// Lists `path` without any cycle check.
    pub fn list(&self, path: &Path) -> CoreResult<Vec<DirEntry>> {
        self.list_guarded(path, &[])
    }

    /// Lists `path`, refusing to enter it when its real path equals one of
    /// `ancestors` (the real paths of the directories above it in the tree).
    ///
    /// Entries come back directories first, then files, each group ordered by
    /// case-insensitive name.
    pub fn list_guarded(&self, path: &Path, ancestors: &[PathBuf]) -> CoreResult<Vec<DirEntry>> {
        let real_path = fs::canonicalize(path).map_err(|source| CoreError::Access {
            path: path.to_path_buf(),
            source,
        })?;

        if ancestors.iter().any(|ancestor| *ancestor == real_path) {
            tracing::warn!(
                "Not entering {}: resolves to ancestor {}",
                path.display(),
                real_path.display()
            );
            return Err(CoreError::CycleSkipped(path.to_path_buf()));
        }

        let read_dir = fs::read_dir(path).map_err(|source| CoreError::Access {
            path: path.to_path_buf(),
            source,
        })?;

        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for entry_result in read_dir {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry in {}: {}", path.display(), e);
                    skipped += 1;
                    continue;
                }
            };

            let entry_path = entry.path();
            // `fs::metadata` follows symlinks, so a link to a directory is listed
            // as a directory. Broken links stay files and fail later on read.
            let (kind, size) = match fs::metadata(&entry_path) {
                Ok(md) if md.is_dir() => (EntryKind::Directory, None),
                Ok(md) => (EntryKind::File, Some(md.len())),
                Err(_) => (EntryKind::File, None),
            };

            if self.is_excluded(&entry_path, kind) {
                continue;
            }

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry_path,
                kind,
                size,
            });
        }

        entries.sort_by(|a, b| {
            let a_is_file = a.kind == EntryKind::File;
            let b_is_file = b.kind == EntryKind::File;
            a_is_file
                .cmp(&b_is_file)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.name.cmp(&b.name))
        });

        tracing::debug!(
            "Listed {} entries in {} ({} unreadable)",
            entries.len(),
            path.display(),
            skipped
        );

        Ok(entries)
    }

    fn is_excluded(&self, path: &Path, kind: EntryKind) -> bool {
        self.exclude.as_ref().is_some_and(|matcher| {
            matcher
                .matched(path, kind == EntryKind::Directory)
                .is_ignore()
        })
    }
}
