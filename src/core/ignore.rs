use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Builds a gitignore-style matcher rooted at `root` from user exclude patterns.
///
/// Blank lines and `#` comments are skipped. Invalid patterns are logged and
/// dropped so that a single typo in the preferences never disables listing.
pub fn build_exclude_matcher<I, S>(root: &Path, patterns: I) -> Gitignore
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = GitignoreBuilder::new(root);

    for pattern in patterns {
        let trimmed = pattern.as_ref().trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Err(e) = builder.add_line(None, trimmed) {
            tracing::warn!("Ignoring invalid exclude pattern '{}': {}", trimmed, e);
        }
    }

    builder.build().unwrap_or_else(|e| {
        tracing::error!("Failed to build exclude matcher from patterns: {}", e);
        Gitignore::empty()
    })
}
