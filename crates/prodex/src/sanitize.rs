//! Helpers for sanitizing data before it reaches logs or the file system.
//!
//! Span fields carry only file names, never full paths, and document ids are
//! reduced to a safe character set before they become result file names.

use std::path::Path;

/// Longest stem produced by [`sanitize_filename`].
const MAX_STEM_LEN: usize = 100;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Turns an arbitrary document id into a file-name stem.
///
/// Keeps ASCII alphanumerics, `-` and `_`; everything else becomes `_`.
/// Leading/trailing underscores are trimmed and an empty result falls back
/// to `"document"`.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/home/user/Documents/manual.txt")),
            "manual.txt"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_sanitize_filename_replaces_separators() {
        assert_eq!(sanitize_filename("../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("product 42.txt"), "product_42_txt");
        assert_eq!(sanitize_filename("SKU-100_b"), "SKU-100_b");
    }

    #[test]
    fn test_sanitize_filename_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "document");
        assert_eq!(sanitize_filename("///"), "document");
    }

    #[test]
    fn test_sanitize_filename_truncates() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_filename(&long).len(), MAX_STEM_LEN);
    }
}
