//! Path helpers shared by the client and session layers.
//!
//! Server paths are `/`-anchored strings; collections usually carry a
//! trailing slash. These helpers keep the two layers from re-deriving the
//! same normalization rules in slightly different ways.

/// Computes the parent of a server path. The root is its own parent.
pub fn parent_path(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }

    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() <= 1 {
        return "/".to_string();
    }

    format!("/{}", parts[..parts.len() - 1].join("/"))
}

/// Joins a directory path and a child name without doubling slashes.
pub fn join_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Strips the trailing slash of a non-root path, for comparisons where
/// `/a/b` and `/a/b/` name the same resource.
pub fn trim_trailing_slash(path: &str) -> &str {
    if path == "/" {
        path
    } else {
        path.trim_end_matches('/')
    }
}
