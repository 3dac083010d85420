use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name of the synthetic parent-directory entry.
pub const PARENT_MARKER: &str = "..";

/// One resource returned by a directory listing.
///
/// Entries are built fresh for every listing, are immutable once
/// constructed, and are replaced wholesale on the next listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Display name, falling back to the last path segment of the href.
    pub name: String,
    /// Server-relative path, URL-decoded.
    pub full_path: String,
    pub is_directory: bool,
    /// Byte count; 0 when the server omitted it or it was unparsable.
    pub size: u64,
    /// `None` when the server omitted the timestamp or it was unparsable.
    pub last_modified: Option<DateTime<Utc>>,
    /// Empty string when the server omitted it.
    pub content_type: String,
}

impl DirectoryEntry {
    /// Builds the synthetic `..` entry pointing at `parent_path`.
    pub fn parent_marker(parent_path: String) -> Self {
        Self {
            name: PARENT_MARKER.to_string(),
            full_path: parent_path,
            is_directory: true,
            size: 0,
            last_modified: None,
            content_type: String::new(),
        }
    }

    pub fn is_parent_marker(&self) -> bool {
        self.is_directory && self.name == PARENT_MARKER
    }

    pub fn display_size(&self) -> String {
        format_size(self.size)
    }
}

/// Formats a byte count for display: `1536` becomes `"1.5 KB"`.
pub fn format_size(bytes: u64) -> String {
    const SUFFIXES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut number = bytes as f64;
    let mut counter = 0;
    while number >= 1024.0 && counter < SUFFIXES.len() - 1 {
        number /= 1024.0;
        counter += 1;
    }

    if counter == 0 {
        format!("{} {}", bytes, SUFFIXES[counter])
    } else {
        format!("{:.1} {}", number, SUFFIXES[counter])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_zero() {
        assert_eq!(format_size(0), "0 B");
    }

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(42), "42 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024 * 1024), "2.0 TB");
    }

    #[test]
    fn test_parent_marker_entry() {
        let entry = DirectoryEntry::parent_marker("/a".to_string());
        assert!(entry.is_parent_marker());
        assert!(entry.is_directory);
        assert_eq!(entry.full_path, "/a");

        let file = DirectoryEntry {
            name: "..".to_string(),
            full_path: "/..".to_string(),
            is_directory: false,
            size: 0,
            last_modified: None,
            content_type: String::new(),
        };
        assert!(!file.is_parent_marker());
    }
}
