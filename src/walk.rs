//! Ordered, cancellable directory traversal used by the context assembler.
//! Grounded on the teacher's `scanner.rs` (`WalkDir`-based scanning with
//! gitignore/hidden filtering) and the original Go
//! `buildShotgunTreeRecursive`/`countProcessableItems`, which walk the same
//! filtered tree twice: once to count, once to emit.
//!
//! The core is visitor-based rather than tree-materializing, per the
//! design note that the assembler should not hold the whole tree in memory
//! (the listing operation is the one place that legitimately does that).

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::classify::relative_forward_slash;
use crate::error::{Error, Result};

/// One surviving entry from a walk, already pruned by explicit exclusion
/// but not by ignore flags (only explicit exclusion prunes the assembler's
/// walk; see DESIGN.md).
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub rel_path: String,
    pub is_dir: bool,
    pub is_last_in_parent: bool,
    pub depth: usize,
    /// One entry per ancestor directory, root-to-parent: `true` if that
    /// ancestor was the last child of its own parent (so its continuation
    /// contributes `"    "`), `false` otherwise (contributes `"│   "`).
    /// Lets a renderer draw the tree-line prefix without needing to look
    /// back up the tree itself.
    pub ancestors_last: Vec<bool>,
}

/// Walk `root` depth-first, invoking `visit` for each surviving entry in
/// the rule order: directories before files, ties broken by
/// case-insensitive name, stable across runs.
///
/// `.git` immediately under `root` is always skipped. A path whose
/// relative form is present in `excluded` is pruned from both descent and
/// emission. Subdirectory read errors are logged and the subtree is
/// skipped; the walk continues. Cancellation is checked at each directory
/// entry and at each file.
pub fn walk_with(
    root: &Path,
    excluded: &std::collections::HashSet<String>,
    cancel: &CancellationToken,
    visit: &mut dyn FnMut(&WalkEntry) -> Result<()>,
) -> Result<()> {
    walk_dir(root, root, excluded, cancel, 0, &mut Vec::new(), visit)
}

/// Convenience wrapper that materializes the walk into a `Vec`. Used by the
/// listing operation and tests; the assembler uses [`walk_with`] directly
/// to avoid holding the whole tree in memory.
pub fn walk(
    root: &Path,
    excluded: &std::collections::HashSet<String>,
    cancel: &CancellationToken,
) -> Result<Vec<WalkEntry>> {
    let mut out = Vec::new();
    walk_with(root, excluded, cancel, &mut |entry| {
        out.push(entry.clone());
        Ok(())
    })?;
    Ok(out)
}

fn walk_dir(
    current: &Path,
    root: &Path,
    excluded: &std::collections::HashSet<String>,
    cancel: &CancellationToken,
    depth: usize,
    ancestors_last: &mut Vec<bool>,
    visit: &mut dyn FnMut(&WalkEntry) -> Result<()>,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let entries = match std::fs::read_dir(current) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(path = %current.display(), error = %e, "walk: skipping unreadable directory");
            return Ok(());
        }
    };

    let mut items: Vec<(PathBuf, bool, String)> = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_dir = path.is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();

        if is_dir && name == ".git" && current == root {
            continue;
        }

        let rel_path = relative_forward_slash(&path, root);
        if excluded.contains(&rel_path) {
            continue;
        }

        items.push((path, is_dir, rel_path));
    }

    items.sort_by(|a, b| match (a.1, b.1) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => {
            let a_name = a.0.file_name().unwrap_or_default().to_string_lossy().to_lowercase();
            let b_name = b.0.file_name().unwrap_or_default().to_string_lossy().to_lowercase();
            a_name.cmp(&b_name)
        }
    });

    let len = items.len();
    for (i, (path, is_dir, rel_path)) in items.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let is_last = i + 1 == len;
        let entry = WalkEntry {
            path: path.clone(),
            rel_path,
            is_dir,
            is_last_in_parent: is_last,
            depth,
            ancestors_last: ancestors_last.clone(),
        };
        visit(&entry)?;

        if is_dir {
            ancestors_last.push(is_last);
            walk_dir(&path, root, excluded, cancel, depth + 1, ancestors_last, visit)?;
            ancestors_last.pop();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn ordering_directories_first_then_name() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let cancel = CancellationToken::new();
        let entries = walk(dir.path(), &HashSet::new(), &cancel).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.rel_path.clone()).collect();
        assert_eq!(names, vec!["sub", "sub/inner.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn explicit_exclusion_prunes_descent_and_emission() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("hidden")).unwrap();
        std::fs::write(dir.path().join("hidden/x.txt"), "").unwrap();
        std::fs::write(dir.path().join("visible.txt"), "").unwrap();

        let mut excluded = HashSet::new();
        excluded.insert("hidden".to_string());

        let cancel = CancellationToken::new();
        let entries = walk(dir.path(), &excluded, &cancel).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.rel_path.clone()).collect();
        assert_eq!(names, vec!["visible.txt"]);
    }

    #[test]
    fn git_directory_at_root_always_skipped() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "").unwrap();

        let cancel = CancellationToken::new();
        let entries = walk(dir.path(), &HashSet::new(), &cancel).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn cancellation_before_walk_returns_cancelled_error() {
        let dir = tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = walk(dir.path(), &HashSet::new(), &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
