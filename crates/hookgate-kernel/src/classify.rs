//! Path and command classification shared by the policies.
//!
//! Everything here is pure string inspection; nothing touches the
//! filesystem.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use hookgate_types::DocId;

const IMPLEMENTATION_EXTENSIONS: &[&str] = &[
    "rs", "py", "ts", "tsx", "js", "jsx", "mjs", "cjs", "go", "java", "kt", "rb", "cs", "c", "h",
    "cpp", "hpp", "swift", "php", "scala", "vue", "svelte",
];

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs"];

static FEATURE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid feature name regex"));

static GIT_OP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bgit\s+(?:-\S+\s+(?:[^-\s]\S*\s+)?)*(commit|push|merge)(?:\s|$|;|&|\|)")
        .expect("valid git operation regex")
});

/// Non-empty path segments, split on both `/` and `\`.
pub fn segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

pub fn file_name(path: &str) -> &str {
    segments(path).last().copied().unwrap_or("")
}

fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty()).then_some(ext)
}

/// `true` when any directory segment of `path` is the control directory.
pub fn is_under_control_dir(path: &str, control_dir: &str) -> bool {
    let control = control_dir.trim_matches(['/', '\\']);
    let segs = segments(path);
    match segs.split_last() {
        Some((_, dirs)) => dirs.iter().any(|s| *s == control),
        None => false,
    }
}

pub fn is_test_file(path: &str) -> bool {
    let segs = segments(path);
    let Some((name, dirs)) = segs.split_last() else {
        return false;
    };
    if dirs.iter().any(|d| TEST_DIRS.contains(&d.to_ascii_lowercase().as_str())) {
        return true;
    }
    let name = name.to_ascii_lowercase();
    name.starts_with("test_")
        || name.contains(".test.")
        || name.contains(".spec.")
        || name.contains("_test.")
        || name.contains("_spec.")
}

/// Source code that is not a test. Configuration and documentation never
/// qualify.
pub fn is_implementation_file(path: &str) -> bool {
    let name = file_name(path);
    let Some(ext) = extension(name) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    IMPLEMENTATION_EXTENSIONS.contains(&ext.as_str()) && !is_test_file(path)
}

/// The feature a path belongs to: the segment right after the first
/// `marker` segment, provided it is a valid name and not the file itself.
pub fn feature_name<'p>(path: &'p str, marker: &str) -> Option<&'p str> {
    let segs = segments(path);
    let at = segs.iter().position(|s| *s == marker)?;
    let name = *segs.get(at + 1)?;
    if at + 1 == segs.len() - 1 || !FEATURE_NAME.is_match(name) {
        return None;
    }
    Some(name)
}

/// Comparison key for feature names: lowercase, `-` and `_` removed.
pub fn normalize_feature(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// The memory-bank document named by `path`, if any.
pub fn doc_for_path(path: &str) -> Option<DocId> {
    let name = file_name(path);
    DocId::ALL.into_iter().find(|d| d.file_name() == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GitOp {
    Commit,
    Push,
    Merge,
}

/// Every `git commit`/`push`/`merge` invoked anywhere in `command`,
/// including chained invocations.
pub fn git_operations(command: &str) -> BTreeSet<GitOp> {
    GIT_OP
        .captures_iter(command)
        .filter_map(|c| match c[1].to_ascii_lowercase().as_str() {
            "commit" => Some(GitOp::Commit),
            "push" => Some(GitOp::Push),
            "merge" => Some(GitOp::Merge),
            _ => None,
        })
        .collect()
}

pub fn is_commit(command: &str) -> bool {
    git_operations(command).contains(&GitOp::Commit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_split_on_both_separators() {
        assert_eq!(segments(r"src\feature/auth\login.ts"), vec!["src", "feature", "auth", "login.ts"]);
        assert_eq!(file_name("/a/b/c.md"), "c.md");
        assert_eq!(file_name(""), "");
    }

    #[test]
    fn control_dir_membership_is_by_segment() {
        assert!(is_under_control_dir(".claude/memory/activeContext.md", ".claude"));
        assert!(is_under_control_dir("/home/me/proj/.claude/prds/x.md", ".claude"));
        assert!(!is_under_control_dir("src/.claude.rs", ".claude"));
        assert!(!is_under_control_dir("docs/claude/x.md", ".claude"));
    }

    #[test]
    fn test_files_are_recognised() {
        assert!(is_test_file("src/auth.test.ts"));
        assert!(is_test_file("tests/integration.rs"));
        assert!(is_test_file("pkg/handler_test.go"));
        assert!(is_test_file("test_login.py"));
        assert!(is_test_file("src/__tests__/a.js"));
        assert!(!is_test_file("src/attestation.rs"));
    }

    #[test]
    fn implementation_files_exclude_tests_docs_and_config() {
        assert!(is_implementation_file("src/feature/auth/login.ts"));
        assert!(is_implementation_file("lib.RS"));
        assert!(!is_implementation_file("src/feature/auth/login.test.ts"));
        assert!(!is_implementation_file("README.md"));
        assert!(!is_implementation_file("config.yaml"));
        assert!(!is_implementation_file("Makefile"));
        assert!(!is_implementation_file(".rs"));
    }

    #[test]
    fn feature_name_follows_grammar() {
        assert_eq!(feature_name("src/feature/user-auth/login.ts", "feature"), Some("user-auth"));
        assert_eq!(feature_name(r"app\feature\billing\api.py", "feature"), Some("billing"));
        // The name segment must not be the file itself.
        assert_eq!(feature_name("src/feature/login.ts", "feature"), None);
        assert_eq!(feature_name("src/feature/-bad/x.ts", "feature"), None);
        assert_eq!(feature_name("src/features/auth/x.ts", "feature"), None);
        assert_eq!(feature_name("src/feature", "feature"), None);
    }

    #[test]
    fn feature_names_normalize() {
        assert_eq!(normalize_feature("User_Auth-v2"), "userauthv2");
        assert_eq!(normalize_feature("user-auth"), normalize_feature("USER_AUTH"));
    }

    #[test]
    fn memory_docs_match_by_file_name() {
        assert_eq!(doc_for_path(".claude/memory/projectbrief.md"), Some(DocId::ProjectBrief));
        assert_eq!(doc_for_path("systemPatterns.md"), Some(DocId::SystemPatterns));
        assert_eq!(doc_for_path("docs/notes.md"), None);
    }

    #[test]
    fn git_operations_detect_chained_commands() {
        let ops = git_operations("git add . && git commit -m 'wip' && git push origin main");
        assert!(ops.contains(&GitOp::Commit));
        assert!(ops.contains(&GitOp::Push));
        assert!(!ops.contains(&GitOp::Merge));
        assert!(is_commit("git -C repo commit -am fix"));
        assert!(!is_commit("git status"));
        assert!(git_operations("git merge-base main HEAD").is_empty());
        assert_eq!(git_operations("git merge feature/x"), BTreeSet::from([GitOp::Merge]));
    }
}
