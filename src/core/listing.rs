//! Flattens the explored tree into the rows a browser shows, with an optional
//! name filter.

use super::{CheckState, TreeNode};
use crate::utils::file_detection::format_file_size;

/// One visible node and its depth below the root (children of the root are
/// at depth 0).
#[derive(Debug, Clone, Copy)]
pub struct ListingRow<'a> {
    pub depth: usize,
    pub node: &'a TreeNode,
}

/// Returns the visible rows below `root` in display order.
///
/// Without a filter only the children of expanded directories are visible.
/// With one, every loaded node whose name contains the filter text
/// (case-insensitive) is shown together with its ancestors, whether they are
/// expanded or not; non-matching children of a matching directory stay hidden.
pub fn visible_rows<'a>(root: &'a TreeNode, filter: Option<&str>) -> Vec<ListingRow<'a>> {
    let mut rows = Vec::new();
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        None => push_expanded(root, 0, &mut rows),
        Some(text) => {
            let needle = text.to_lowercase();
            for child in root.children() {
                push_matching(child, 0, &needle, &mut rows);
            }
        }
    }
    rows
}

fn push_expanded<'a>(dir: &'a TreeNode, depth: usize, rows: &mut Vec<ListingRow<'a>>) {
    if !dir.is_expanded() {
        return;
    }
    for child in dir.children() {
        rows.push(ListingRow { depth, node: child });
        push_expanded(child, depth + 1, rows);
    }
}

/// Pushes `node` and its matching descendants. Returns whether anything was
/// pushed.
fn push_matching<'a>(
    node: &'a TreeNode,
    depth: usize,
    needle: &str,
    rows: &mut Vec<ListingRow<'a>>,
) -> bool {
    let slot = rows.len();
    rows.push(ListingRow { depth, node });

    let mut any_child = false;
    for child in node.children() {
        any_child |= push_matching(child, depth + 1, needle, rows);
    }

    let shown = any_child || node.name().to_lowercase().contains(needle);
    if !shown {
        rows.truncate(slot);
    }
    shown
}

/// Renders rows as an indented text listing.
///
/// ```text
/// [~] src/
///   [x] main.rs  12 B  text
/// ```
pub fn render_rows(rows: &[ListingRow<'_>]) -> String {
    let mut out = String::new();
    for row in rows {
        let node = row.node;
        let mark = match node.checked() {
            CheckState::Checked => "[x]",
            CheckState::Unchecked => "[ ]",
            CheckState::Partial => "[~]",
        };
        out.push_str(&"  ".repeat(row.depth));
        out.push_str(mark);
        out.push(' ');
        out.push_str(node.name());
        if node.is_dir() {
            out.push('/');
        } else {
            let size = node
                .size()
                .map(format_file_size)
                .unwrap_or_else(|| "?".to_string());
            let kind = if node.is_text() { "text" } else { "binary" };
            out.push_str(&format!("  {}  {}", size, kind));
        }
        out.push('\n');
    }
    out
}
