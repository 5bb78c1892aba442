//! Glob patterns for database and table names.
//!
//! `*` matches any run of characters (including none). Every other character
//! matches itself. Matching is case-sensitive and covers the whole value.

/// Whole-string glob match.
pub fn glob_matches(pattern: &str, value: &str) -> bool {
    if is_match_all(pattern) {
        return true;
    }
    if !pattern.contains('*') {
        return pattern == value;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    let (mut p, mut v) = (0, 0);
    // Position of the last `*` seen and the value index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, v));
            p += 1;
        } else if p < pattern.len() && pattern[p] == value[v] {
            p += 1;
            v += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            v = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// True for `*` (or any run of only `*`).
pub fn is_match_all(pattern: &str) -> bool {
    !pattern.is_empty() && pattern.chars().all(|c| c == '*')
}

/// How narrowly a pattern names a resource: exact literal 2, glob with
/// literals 1, match-all 0.
pub fn specificity(pattern: &str) -> u8 {
    if is_match_all(pattern) {
        0
    } else if pattern.contains('*') {
        1
    } else {
        2
    }
}
