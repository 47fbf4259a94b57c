//! Renders ingested files into one combined document.

use super::{IngestResult, TreeGenerator};
use crate::utils::file_detection::language_from_path;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How many selected files a preview shows.
pub const PREVIEW_FILES: usize = 3;
/// How many lines of each file a preview shows.
pub const PREVIEW_LINES: usize = 20;

/// Layout of the combined document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Path banner between files.
    Simple,
    /// Path banner plus size and modification time.
    Detailed,
    /// Path as a heading, content as a fenced code block.
    #[default]
    Markdown,
}

impl OutputFormat {
    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::Simple => "Simple",
            OutputFormat::Detailed => "Detailed",
            OutputFormat::Markdown => "Markdown",
        }
    }
}

pub struct Formatter {
    format: OutputFormat,
    root_path: PathBuf,
    include_tree: bool,
}

impl Formatter {
    pub fn new(format: OutputFormat, root_path: &Path) -> Self {
        Self {
            format,
            root_path: root_path.to_path_buf(),
            include_tree: false,
        }
    }

    /// Appends a directory tree of the combined files to the document.
    pub fn with_tree(mut self, include_tree: bool) -> Self {
        self.include_tree = include_tree;
        self
    }

    pub fn render(&self, results: &[IngestResult]) -> String {
        self.render_at(results, Local::now())
    }

    /// Renders with a fixed generation time.
    pub fn render_at(&self, results: &[IngestResult], generated_at: DateTime<Local>) -> String {
        let mut out = String::new();
        let root_name = self
            .root_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root_path.display().to_string());

        let _ = writeln!(out, "# Combined Code from {root_name}");
        let _ = writeln!(out, "# Generated on {}", generated_at.format(TIMESTAMP_FORMAT));
        let _ = writeln!(out, "# Contains {} text files", results.len());
        out.push('\n');

        for result in results {
            self.render_file(&mut out, result);
        }

        if self.include_tree {
            let files: Vec<PathBuf> = results.iter().map(|r| r.path().to_path_buf()).collect();
            out.push_str("\n\n# DIRECTORY TREE\n");
            out.push_str(&TreeGenerator::generate_tree(&files, &self.root_path));
        }

        out
    }

    /// Renders a sample of the document: the first [`PREVIEW_FILES`] of
    /// `sample`, each cut to [`PREVIEW_LINES`] lines, and a note on how many
    /// of the `total_selected` files were left out.
    pub fn render_preview(&self, sample: &[IngestResult], total_selected: usize) -> String {
        if total_selected == 0 || sample.is_empty() {
            return "All files are excluded. Select some files to include in the output.\n"
                .to_string();
        }

        let mut out = String::new();
        let _ = writeln!(out, "# Combined Code Preview");
        let _ = writeln!(out, "# Using {} style", self.format.label());
        out.push('\n');

        let shown = &sample[..sample.len().min(PREVIEW_FILES)];
        for result in shown {
            let footer = self.write_file_header(&mut out, result);
            match (result.content(), result.error()) {
                (Some(content), _) => {
                    let mut lines = content.split_inclusive('\n');
                    out.extend(lines.by_ref().take(PREVIEW_LINES));
                    if lines.next().is_some() {
                        out.push_str("\n... (content truncated for preview) ...\n");
                    }
                }
                (None, Some(error)) => {
                    let _ = write!(out, "[Error reading file: {error}]");
                }
                (None, None) => {}
            }
            out.push_str(footer);
        }

        if total_selected > shown.len() {
            let _ = write!(
                out,
                "\n\n... Plus {} more file(s) ...\n",
                total_selected - shown.len()
            );
        }
        out
    }

    fn render_file(&self, out: &mut String, result: &IngestResult) {
        let footer = self.write_file_header(out, result);

        match (result.content(), result.error()) {
            (Some(content), _) => out.push_str(content),
            (None, Some(error)) => {
                let _ = write!(out, "\n[Error reading file: {error}]\n");
            }
            (None, None) => {}
        }

        out.push_str(footer);
    }

    /// Writes the separator and per-file header, returning the footer that
    /// closes the block.
    fn write_file_header(&self, out: &mut String, result: &IngestResult) -> &'static str {
        let rel_path = self.display_path(result.path());
        let banner = "=".repeat(80);

        match self.format {
            OutputFormat::Simple => {
                let _ = write!(out, "\n\n{banner}\nFILE: {rel_path}\n{banner}\n\n");
                ""
            }
            OutputFormat::Detailed => {
                let size = result.size_bytes().unwrap_or(0);
                let modified = result
                    .modified()
                    .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                let _ = write!(
                    out,
                    "\n\n{banner}\nFILE: {rel_path}\nSIZE: {size} bytes\nMODIFIED: {modified}\n{banner}\n\n"
                );
                ""
            }
            OutputFormat::Markdown => {
                let language = language_from_path(result.path());
                let _ = write!(out, "\n\n## {rel_path}\n\n```{language}\n");
                "\n```\n"
            }
        }
    }

    /// Path relative to the root, with `/` separators on every platform.
    fn display_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root_path).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{IngestError, IngestErrorKind};
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    fn results(root: &Path) -> Vec<IngestResult> {
        vec![
            IngestResult::from_parts(
                root.join("src/main.rs"),
                Ok("fn main() {}\n".to_string()),
                Some(13),
                Some(at()),
            ),
            IngestResult::from_parts(
                root.join("notes"),
                Err(IngestError {
                    kind: IngestErrorKind::NotFound,
                    message: "gone".to_string(),
                }),
                None,
                None,
            ),
        ]
    }

    const HEADER: &str = "# Combined Code from demo\n# Generated on 2024-03-01 12:30:00\n# Contains 2 text files\n\n";

    #[test]
    fn simple_layout() {
        let root = PathBuf::from("/tmp/demo");
        let doc = Formatter::new(OutputFormat::Simple, &root).render_at(&results(&root), at());

        let banner = "=".repeat(80);
        let expected = format!(
            "{HEADER}\n\n{banner}\nFILE: src/main.rs\n{banner}\n\nfn main() {{}}\n\
             \n\n{banner}\nFILE: notes\n{banner}\n\n\n[Error reading file: gone]\n"
        );
        assert_eq!(doc, expected);
    }

    #[test]
    fn detailed_layout_includes_size_and_time() {
        let root = PathBuf::from("/tmp/demo");
        let doc = Formatter::new(OutputFormat::Detailed, &root).render_at(&results(&root), at());

        assert!(doc.contains("FILE: src/main.rs\nSIZE: 13 bytes\nMODIFIED: 2024-03-01 12:30:00\n"));
        assert!(doc.contains("FILE: notes\nSIZE: 0 bytes\nMODIFIED: Unknown\n"));
    }

    #[test]
    fn markdown_layout_uses_language_fences() {
        let root = PathBuf::from("/tmp/demo");
        let doc = Formatter::new(OutputFormat::Markdown, &root).render_at(&results(&root), at());

        let expected = format!(
            "{HEADER}\n\n## src/main.rs\n\n```rust\nfn main() {{}}\n\n```\n\
             \n\n## notes\n\n```text\n\n[Error reading file: gone]\n\n```\n"
        );
        assert_eq!(doc, expected);
    }

    #[test]
    fn optional_directory_tree_follows_the_files() {
        let root = PathBuf::from("/tmp/demo");
        let doc = Formatter::new(OutputFormat::Simple, &root)
            .with_tree(true)
            .render_at(&results(&root), at());

        assert!(doc.ends_with("\n\n# DIRECTORY TREE\ndemo/\n├── src/\n│   └── main.rs\n└── notes\n"));
    }

    #[test]
    fn formats_parse_from_serde_names() {
        let format: OutputFormat = serde_json::from_str("\"detailed\"").unwrap();
        assert_eq!(format, OutputFormat::Detailed);
        assert_eq!(OutputFormat::default(), OutputFormat::Markdown);
    }

    #[test]
    fn preview_truncates_long_files_and_counts_the_rest() {
        let root = PathBuf::from("/tmp/demo");
        let long: String = (1..=25).map(|i| format!("line {i}\n")).collect();
        let sample = vec![
            IngestResult::from_parts(root.join("a.txt"), Ok(long), None, None),
            IngestResult::from_parts(root.join("b.txt"), Ok("short\n".to_string()), None, None),
        ];

        let preview = Formatter::new(OutputFormat::Simple, &root).render_preview(&sample, 7);

        assert!(preview.starts_with("# Combined Code Preview\n# Using Simple style\n\n"));
        assert!(preview.contains("line 20\n\n... (content truncated for preview) ...\n"));
        assert!(!preview.contains("line 21"));
        assert!(preview.contains("FILE: b.txt\n"));
        assert!(preview.ends_with("short\n\n\n... Plus 5 more file(s) ...\n"));
    }

    #[test]
    fn preview_shows_at_most_three_files() {
        let root = PathBuf::from("/tmp/demo");
        let sample: Vec<IngestResult> = ["a.rs", "b.rs", "c.rs", "d.rs"]
            .iter()
            .map(|name| IngestResult::from_parts(root.join(name), Ok("x".to_string()), None, None))
            .collect();

        let preview = Formatter::new(OutputFormat::Markdown, &root).render_preview(&sample, 4);

        assert!(preview.contains("## c.rs\n\n```rust\nx\n```\n"));
        assert!(!preview.contains("d.rs"));
        assert!(preview.ends_with("... Plus 1 more file(s) ...\n"));
    }

    #[test]
    fn preview_of_an_empty_selection() {
        let root = PathBuf::from("/tmp/demo");
        let preview = Formatter::new(OutputFormat::Simple, &root).render_preview(&[], 0);
        assert!(preview.starts_with("All files are excluded."));
    }
}
