//! Gitignore-syntax pattern sets: compile a newline-delimited rule block and
//! answer "does this relative path match?" Grounded on the teacher's
//! `gitignore.rs`, generalized from "parse every `.gitignore` under a root"
//! to "compile one rule block, match one path" — the layering (project
//! rules, custom rules, explicit exclusions) lives one level up in
//! [`crate::classify`].

use globset::{Glob, GlobMatcher};

struct Rule {
    is_negation: bool,
    dir_only: bool,
    matcher: GlobMatcher,
    dir_matcher: GlobMatcher,
}

/// A compiled sequence of gitignore-style lines.
///
/// Matching is deterministic; later patterns override earlier ones; a
/// leading `!` negates; a trailing `/` restricts the rule to directories.
/// An empty set matches nothing.
#[derive(Default)]
pub struct PatternSet {
    rules: Vec<Rule>,
    /// Original non-blank, non-comment lines, kept only so the set can be
    /// cheaply `Clone`d by recompiling (compiled `GlobMatcher`s aren't
    /// themselves cloneable in a way worth relying on across versions).
    source_lines: Vec<String>,
}

impl Clone for PatternSet {
    fn clone(&self) -> Self {
        Self::compile(&self.source_lines.join("\n"))
    }
}

impl PatternSet {
    /// Compile a pattern set from newline-delimited gitignore-syntax text.
    pub fn compile(text: &str) -> Self {
        let mut rules = Vec::new();
        let mut source_lines = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(rule) = Rule::compile(trimmed) {
                source_lines.push(trimmed.to_string());
                rules.push(rule);
            }
        }
        Self { rules, source_lines }
    }

    /// Returns `true` if `rel_path` (forward-slash separated, no leading
    /// `/`) matches this set under gitignore semantics.
    pub fn is_match(&self, rel_path: &str, is_dir: bool) -> bool {
        if rel_path.is_empty() {
            return false;
        }
        let with_slash;
        let target = if is_dir && !rel_path.ends_with('/') {
            with_slash = format!("{rel_path}/");
            with_slash.trim_end_matches('/')
        } else {
            rel_path.trim_end_matches('/')
        };

        let mut matched = false;
        for rule in &self.rules {
            let direct = rule.matcher.is_match(target);
            let nested = rule.dir_matcher.is_match(target);

            let hit = if rule.dir_only && !is_dir {
                nested
            } else {
                direct || nested
            };

            if hit {
                matched = !rule.is_negation;
            }
        }
        matched
    }
}

impl Rule {
    fn compile(pattern: &str) -> Option<Rule> {
        let (pattern, is_negation) = match pattern.strip_prefix('!') {
            Some(rest) => (rest, true),
            None => (pattern, false),
        };
        if pattern.is_empty() {
            return None;
        }

        let mut pat = pattern.to_string();
        let dir_only = pat.ends_with('/');
        if dir_only {
            pat = pat.trim_end_matches('/').to_string();
        }

        let had_leading_slash = pat.starts_with('/');
        if had_leading_slash {
            pat = pat[1..].to_string();
        }
        let anchored = had_leading_slash || pat.contains('/');

        let glob_expr = if anchored { pat.clone() } else { format!("**/{pat}") };
        let dir_glob_expr = if anchored {
            format!("{pat}/**")
        } else {
            format!("**/{pat}/**")
        };

        let matcher = Glob::new(&glob_expr).ok()?.compile_matcher();
        let dir_matcher = Glob::new(&dir_glob_expr).ok()?.compile_matcher();

        Some(Rule {
            is_negation,
            dir_only,
            matcher,
            dir_matcher,
        })
    }
}
