//! Line diffs of rewritten manifests
//!
//! Manifest rewrites replace values in place, so lines are compared
//! position by position. A rewrite that changes the line count is shown as
//! a full replacement.

use std::fmt::Write;
use std::path::Path;

/// Unified-style diff between `before` and `after`, or `None` when equal
pub fn line_diff(path: &Path, before: &str, after: &str) -> Option<String> {
    if before == after {
        return None;
    }

    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();

    let mut out = String::new();
    let _ = writeln!(out, "--- a/{}", path.display());
    let _ = writeln!(out, "+++ b/{}", path.display());

    if old.len() != new.len() {
        let _ = writeln!(out, "@@ -1,{} +1,{} @@", old.len(), new.len());
        for line in &old {
            let _ = writeln!(out, "-{line}");
        }
        for line in &new {
            let _ = writeln!(out, "+{line}");
        }
        return Some(out);
    }

    for (index, (a, b)) in old.iter().zip(&new).enumerate() {
        if a != b {
            let _ = writeln!(out, "@@ line {} @@", index + 1);
            let _ = writeln!(out, "-{a}");
            let _ = writeln!(out, "+{b}");
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_none() {
        assert_eq!(line_diff(Path::new("a"), "x\ny\n", "x\ny\n"), None);
    }

    #[test]
    fn test_in_place_change() {
        let before = "FROM nginx:1.25\nRUN true\n";
        let after = "FROM nginx:1.26\nRUN true\n";
        let diff = line_diff(Path::new("Dockerfile"), before, after).unwrap();
        assert_eq!(
            diff,
            "--- a/Dockerfile\n+++ b/Dockerfile\n@@ line 1 @@\n-FROM nginx:1.25\n+FROM nginx:1.26\n"
        );
    }

    #[test]
    fn test_line_count_change() {
        let diff = line_diff(Path::new("f"), "a\n", "a\nb\n").unwrap();
        assert!(diff.contains("@@ -1,1 +1,2 @@"));
        assert!(diff.contains("-a\n+a\n+b\n"));
    }
}
