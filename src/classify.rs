//! Path classification and the directory listing operation. Grounded on the
//! original Go `ListFiles`/`buildTreeRecursive` (a project `.gitignore` plus
//! app-level custom patterns, each toggleable) and the teacher's
//! `gitignore.rs` for the relative-path/trailing-slash conventions.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::pattern::PatternSet;

/// Result of classifying a single path against the project and custom
/// pattern sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classification {
    pub gitignored: bool,
    pub custom_ignored: bool,
}

impl Classification {
    /// The walker descends into a directory iff neither flag is set.
    pub fn blocks_descent(&self) -> bool {
        self.gitignored || self.custom_ignored
    }
}

/// Combines the project `.gitignore` set, the merged custom set, and their
/// enable toggles into one classification decision.
#[derive(Clone)]
pub struct Classifier {
    project_rules: PatternSet,
    custom_rules: PatternSet,
    pub use_gitignore: bool,
    pub use_custom_ignore: bool,
}

impl Classifier {
    pub fn new(project_rules: PatternSet, custom_rules: PatternSet) -> Self {
        Self {
            project_rules,
            custom_rules,
            use_gitignore: true,
            use_custom_ignore: true,
        }
    }

    pub fn set_project_rules(&mut self, rules: PatternSet) {
        self.project_rules = rules;
    }

    pub fn set_custom_rules(&mut self, rules: PatternSet) {
        self.custom_rules = rules;
    }

    /// Classify a path given its root-relative, forward-slash path and
    /// directoryness. `rel_path` must not carry a trailing slash; it is
    /// added internally for directories per spec.
    pub fn classify(&self, rel_path: &str, is_dir: bool) -> Classification {
        Classification {
            gitignored: self.use_gitignore && self.project_rules.is_match(rel_path, is_dir),
            custom_ignored: self.use_custom_ignore && self.custom_rules.is_match(rel_path, is_dir),
        }
    }
}

/// A node in a listing snapshot. Produced once per `list_files` call;
/// immutable thereafter.
#[derive(Debug, Clone, Serialize)]
pub struct FileNode {
    pub name: String,
    pub absolute_path: PathBuf,
    pub path_relative_to_root: String,
    pub is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
    pub is_gitignored: bool,
    pub is_custom_ignored: bool,
}

/// Produce a single-element listing containing the root node with nested
/// children. Ignored subtrees are flagged, not pruned; the listing does
/// not consume an explicit-exclusion set at all (that belongs to the
/// assembler). A UI is expected to translate "ignored" into "excluded" on
/// its own terms.
pub fn list_files(root: &Path, classifier: &Classifier) -> std::io::Result<Vec<FileNode>> {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string_lossy().into_owned());

    let children = build_children(root, root, classifier)?;

    Ok(vec![FileNode {
        name,
        absolute_path: root.to_path_buf(),
        path_relative_to_root: ".".to_string(),
        is_directory: true,
        children: Some(children),
        is_gitignored: false,
        is_custom_ignored: false,
    }])
}

fn build_children(
    current: &Path,
    root: &Path,
    classifier: &Classifier,
) -> std::io::Result<Vec<FileNode>> {
    let mut entries: Vec<_> = std::fs::read_dir(current)?.filter_map(|e| e.ok()).collect();

    entries.sort_by(|a, b| {
        let a_dir = a.path().is_dir();
        let b_dir = b.path().is_dir();
        match (a_dir, b_dir) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .cmp(&b.file_name().to_string_lossy().to_lowercase()),
        }
    });

    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let is_dir = path.is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();

        let rel_path = relative_forward_slash(&path, root);
        let classification = classifier.classify(&rel_path, is_dir);

        let children = if is_dir && !classification.blocks_descent() {
            match build_children(&path, root, classifier) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "classify: skipping unreadable subtree");
                    None
                }
            }
        } else {
            None
        };

        nodes.push(FileNode {
            name,
            absolute_path: path,
            path_relative_to_root: rel_path,
            is_directory: is_dir,
            children,
            is_gitignored: classification.gitignored,
            is_custom_ignored: classification.custom_ignored,
        });
    }

    Ok(nodes)
}

/// Compute `path` relative to `root`, forward-slash separated, with no
/// leading or trailing slash.
pub fn relative_forward_slash(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternSet;
    use tempfile::tempdir;

    #[test]
    fn gitignored_directory_is_flagged_but_not_pruned_from_listing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("build")).unwrap();
        std::fs::write(dir.path().join("build/x"), "x").unwrap();
        std::fs::write(dir.path().join("src.rs"), "fn main() {}").unwrap();

        let project = PatternSet::compile("build/");
        let custom = PatternSet::compile("");
        let classifier = Classifier::new(project, custom);

        let listing = list_files(dir.path(), &classifier).unwrap();
        let root = &listing[0];
        let children = root.children.as_ref().unwrap();

        let build_node = children.iter().find(|n| n.name == "build").unwrap();
        assert!(build_node.is_gitignored);
        assert!(build_node.children.is_none());
    }

    #[test]
    fn git_directory_is_listed_and_flagged_when_a_rule_matches_it() {
        // unlike the walker (which always skips `.git` at the root), the
        // listing only flags ignored subtrees; it never prunes them. See
        // DESIGN.md.
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        let custom = PatternSet::compile(".git/");
        let classifier = Classifier::new(PatternSet::compile(""), custom);
        let listing = list_files(dir.path(), &classifier).unwrap();
        let children = listing[0].children.as_ref().unwrap();

        let git_node = children.iter().find(|n| n.name == ".git").unwrap();
        assert!(git_node.is_custom_ignored);
        assert!(git_node.children.is_none());
    }

    #[test]
    fn ordering_is_directories_first_then_case_insensitive_name() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Zeta.txt"), "").unwrap();
        std::fs::write(dir.path().join("alpha.txt"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();

        let classifier = Classifier::new(PatternSet::compile(""), PatternSet::compile(""));
        let listing = list_files(dir.path(), &classifier).unwrap();
        let names: Vec<_> = listing[0]
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|n| n.name.clone())
            .collect();
        assert_eq!(names, vec!["sub", "alpha.txt", "Zeta.txt"]);
    }
}
