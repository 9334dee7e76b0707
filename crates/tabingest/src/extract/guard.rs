//! Confinement of archive entry names to the working directory.

use std::path::{Path, PathBuf};

/// Resolves an archive entry name to a path strictly inside `root`.
///
/// Both separator styles are honored. Returns `None` for absolute names,
/// drive prefixes, any `..` component, or names with no normal component.
pub fn confine(root: &Path, entry_name: &str) -> Option<PathBuf> {
    if entry_name.starts_with('/') || entry_name.starts_with('\\') {
        return None;
    }

    let mut relative = PathBuf::new();
    for part in entry_name.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return None,
            p if p.contains(':') => return None,
            p => relative.push(p),
        }
    }

    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(root.join(relative))
}

/// Dot-files and resource-fork folders are not extraction results.
pub fn is_hidden(entry_name: &str) -> bool {
    let parts = entry_name.split(['/', '\\']).filter(|p| !p.is_empty());
    let is_fork_dir = parts.clone().any(|p| p == "__MACOSX");
    let hidden_leaf = parts
        .last()
        .map(|leaf| leaf.starts_with('.'))
        .unwrap_or(false);
    is_fork_dir || hidden_leaf
}
