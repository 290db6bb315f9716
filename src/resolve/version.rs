//! Lenient semantic version helpers
//!
//! Registries and manifests are loose about version strings: Docker tags are
//! often `1.25`, Go modules carry a `v` prefix. These helpers accept both and
//! fall back to plain numeric comparison when a string is not semver at all.

use crate::domain::Impact;
use semver::Version;
use std::cmp::Ordering;

/// Operator tokens that may precede a version in a manifest, longest first
const PREFIX_TOKENS: &[&str] = &["~>", ">=", "<=", "==", "~=", ">", "<", "=", "^", "~"];

/// Parse a version, padding partial cores and tolerating a leading `v`
///
/// - "1" -> 1.0.0
/// - "1.26" -> 1.26.0
/// - "v1.2.3-rc.1" -> 1.2.3-rc.1
/// - "1.2-beta" -> 1.2.0-beta
pub fn parse_lenient(version: &str) -> Option<Version> {
    let version = version.trim();
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);
    if version.is_empty() {
        return None;
    }

    let split_at = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(split_at);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => version.to_string(),
    };

    Version::parse(&padded).ok()
}

/// Returns true if the string parses as a (lenient) semantic version
pub fn is_valid_semver(version: &str) -> bool {
    parse_lenient(version).is_some()
}

/// Compare two version strings
///
/// Semantic version order is used when both sides parse; otherwise the
/// numeric components are compared left to right and the longer version wins
/// a tie.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if let (Some(va), Some(vb)) = (parse_lenient(a), parse_lenient(b)) {
        return va.cmp(&vb);
    }

    let numeric_parts = |s: &str| -> Vec<u64> {
        let s = s.trim().strip_prefix('v').unwrap_or(s.trim());
        s.split(['.', '-']).filter_map(|p| p.parse().ok()).collect()
    };

    let parts_a = numeric_parts(a);
    let parts_b = numeric_parts(b);

    for (pa, pb) in parts_a.iter().zip(parts_b.iter()) {
        match pa.cmp(pb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    parts_a.len().cmp(&parts_b.len())
}

/// Severity of moving from `current` to `target`
///
/// Any change that is neither a major nor a minor bump is a patch, including
/// pre-release and build metadata changes.
pub fn determine_impact(current: &Version, target: &Version) -> Impact {
    if current == target {
        Impact::None
    } else if current.major != target.major {
        Impact::Major
    } else if current.minor != target.minor {
        Impact::Minor
    } else {
        Impact::Patch
    }
}

/// Strip leading constraint operators (`~>`, `>=`, `^`, ...) and whitespace
pub fn strip_constraint_prefix(version: &str) -> &str {
    let mut rest = version.trim();
    loop {
        let Some(token) = PREFIX_TOKENS.iter().find(|t| rest.starts_with(**t)) else {
            return rest;
        };
        rest = rest[token.len()..].trim_start();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.2.3", Some((1, 2, 3)))]
    #[case("v1.2.3", Some((1, 2, 3)))]
    #[case("1.26", Some((1, 26, 0)))]
    #[case("7", Some((7, 0, 0)))]
    #[case("  2.0.1 ", Some((2, 0, 1)))]
    #[case("latest", None)]
    #[case("", None)]
    #[case("1.2.3.4", None)]
    fn test_parse_lenient(#[case] input: &str, #[case] expected: Option<(u64, u64, u64)>) {
        let parsed = parse_lenient(input).map(|v| (v.major, v.minor, v.patch));
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_lenient_keeps_prerelease_on_partial() {
        let v = parse_lenient("1.2-beta.1").unwrap();
        assert_eq!(v.to_string(), "1.2.0-beta.1");
    }

    #[test]
    fn test_is_valid_semver() {
        assert!(is_valid_semver("v0.1.0"));
        assert!(is_valid_semver("3.12-alpine"));
        assert!(!is_valid_semver("sha256:abcdef"));
    }

    #[rstest]
    #[case("1.0.0", "2.0.0", Ordering::Less)]
    #[case("1.2.0", "1.10.0", Ordering::Less)]
    #[case("1.0.0-alpha", "1.0.0", Ordering::Less)]
    #[case("1.0.0-alpha", "1.0.0-beta", Ordering::Less)]
    #[case("v2.0.0", "1.9.9", Ordering::Greater)]
    #[case("1.2.3", "1.2.3", Ordering::Equal)]
    #[case("1.26", "1.25.3", Ordering::Greater)]
    #[case("1.2.3.4", "1.2.3.5", Ordering::Less)]
    fn test_compare_versions(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(compare_versions(a, b), expected);
        assert_eq!(compare_versions(b, a), expected.reverse());
    }

    #[rstest]
    #[case("1.2.3", "2.0.0", Impact::Major)]
    #[case("1.2.3", "1.3.0", Impact::Minor)]
    #[case("1.2.3", "1.2.4", Impact::Patch)]
    #[case("1.2.3-rc.1", "1.2.3", Impact::Patch)]
    #[case("1.2.3", "1.2.3+build.5", Impact::Patch)]
    #[case("1.2.3", "1.2.3", Impact::None)]
    fn test_determine_impact(#[case] current: &str, #[case] target: &str, #[case] expected: Impact) {
        let current = Version::parse(current).unwrap();
        let target = Version::parse(target).unwrap();
        assert_eq!(determine_impact(&current, &target), expected);
    }

    #[rstest]
    #[case("~> 5.0", "5.0")]
    #[case(">=1.2.3", "1.2.3")]
    #[case("^4.17.21", "4.17.21")]
    #[case("~1.2.3", "1.2.3")]
    #[case("= 2.0.0", "2.0.0")]
    #[case("<=3.0", "3.0")]
    #[case("==2.28.0", "2.28.0")]
    #[case("1.0.0", "1.0.0")]
    fn test_strip_constraint_prefix(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_constraint_prefix(input), expected);
    }
}
