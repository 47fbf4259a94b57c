use std::path::Path;

/// How many leading bytes are inspected when sniffing for binary content.
const SNIFF_LEN: usize = 8 * 1024;

/// Returns `true` when `bytes` look like binary data rather than text.
///
/// A NUL byte in the leading window is treated as binary, matching what most
/// editors and `git` do.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SNIFF_LEN)];
    window.contains(&0)
}

/// Decodes file bytes as UTF-8 text, or explains why they cannot be combined.
///
/// A leading UTF-8 byte order mark is dropped.
pub fn decode_text(bytes: Vec<u8>) -> Result<String, String> {
    if looks_binary(&bytes) {
        return Err("binary content (NUL bytes)".to_string());
    }
    let bytes = match bytes.strip_prefix(b"\xEF\xBB\xBF") {
        Some(rest) => rest.to_vec(),
        None => bytes,
    };
    String::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {}", e.utf8_error()))
}

/// Returns the fenced-code-block language for a file path.
///
/// Known extensions map to their highlighter name; others fall back to the
/// bare extension, and files without one get `text`.
pub fn language_from_path(path: &Path) -> String {
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return "text".to_string();
    };
    let lower = ext.to_lowercase();
    match lower.as_str() {
        "rs" => "rust",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" | "pyi" => "python",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "md" | "markdown" => "markdown",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "sh" | "bash" | "zsh" => "shell",
        "ps1" => "powershell",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cxx" | "hxx" | "cc" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "sql" => "sql",
        "xml" => "xml",
        _ => return lower,
    }
    .to_string()
}

/// Extensions listed as text without opening the file.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "py", "js", "java", "c", "cpp", "h", "hpp", "cs", "rb", "go", "rs", "php", "html",
    "css", "scss", "sass", "xml", "json", "yaml", "yml", "md", "rst", "tex", "sh", "bash", "ps1",
    "bat", "sql", "r", "m", "swift", "kt", "ts", "jsx", "tsx", "vue", "toml", "ini", "cfg",
    "conf", "properties", "env", "gitignore", "dockerfile", "makefile", "cmake", "gradle", "sbt",
    "lock", "csv", "log",
];

/// Quick text/binary guess from the extension alone, used while browsing.
///
/// Unknown extensions count as binary. Reading decides for real.
pub fn likely_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn format_file_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit_index = 0;

    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_bytes_mean_binary() {
        assert!(looks_binary(b"PK\x03\x04\x00\x00"));
        assert!(!looks_binary("plain text\n".as_bytes()));
        assert!(!looks_binary(b""));
    }

    #[test]
    fn decode_text_rejects_binary_and_invalid_utf8() {
        assert_eq!(decode_text(b"hello".to_vec()).unwrap(), "hello");
        assert_eq!(decode_text(b"\xEF\xBB\xBFbom".to_vec()).unwrap(), "bom");
        assert!(decode_text(vec![0x00, 0x01]).unwrap_err().contains("binary"));
        assert!(decode_text(vec![0xff, 0xfe, 0x41]).unwrap_err().contains("UTF-8"));
    }

    #[test]
    fn language_mapping() {
        assert_eq!(language_from_path(Path::new("src/main.rs")), "rust");
        assert_eq!(language_from_path(Path::new("app.PY")), "python");
        assert_eq!(language_from_path(Path::new("query.graphql")), "graphql");
        assert_eq!(language_from_path(Path::new("Makefile")), "text");
    }

    #[test]
    fn text_guess_uses_extension_only() {
        assert!(likely_text(Path::new("src/lib.RS")));
        assert!(likely_text(Path::new("Cargo.lock")));
        assert!(!likely_text(Path::new("logo.png")));
        assert!(!likely_text(Path::new("Makefile")));
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }
}
