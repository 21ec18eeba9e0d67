//! Glob-style name matching for enumeration patterns.
//!
//! Implements the subset used by `enumerate_files`:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//!
//! Matching always runs against a single path segment (a file or
//! directory name, never a full path) and takes an explicit case flag so
//! real and virtual backends behave identically: the flag comes from the
//! filesystem's [`Convention`](crate::Convention), not from the storage
//! actually backing it.

/// Match `name` against a glob `pattern`.
///
/// The pattern must match the entire name. When `case_sensitive` is
/// false, comparison folds ASCII case on both sides.
pub fn glob_match(pattern: &str, name: &str, case_sensitive: bool) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    // Iterative two-pointer matcher with single-star backtracking.
    let (mut p, mut n) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || chars_eq(pattern[p], name[n], case_sensitive))
        {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            // Let the last `*` swallow one more character and retry.
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

fn chars_eq(a: char, b: char, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_patterns() {
        assert!(glob_match("main.rs", "main.rs", true));
        assert!(!glob_match("main.rs", "main.go", true));
        assert!(!glob_match("main", "main.rs", true));
    }

    #[test]
    fn test_star() {
        assert!(glob_match("*.rs", "main.rs", true));
        assert!(glob_match("*", "anything", true));
        assert!(glob_match("*", "", true));
        assert!(glob_match("a*b*c", "axxbyyc", true));
        assert!(!glob_match("*.txt", "main.rs", true));
        assert!(glob_match("data*", "data", true));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("test?", "test1", true));
        assert!(!glob_match("test?", "test", true));
        assert!(!glob_match("test?", "test12", true));
        assert!(glob_match("?a?", "bac", true));
    }

    #[test]
    fn test_case_rules() {
        assert!(!glob_match("*.ESM", "skyrim.esm", true));
        assert!(glob_match("*.ESM", "skyrim.esm", false));
        assert!(glob_match("README*", "readme.md", false));
    }

    #[test]
    fn test_backtracking() {
        // The first `*` must give characters back for the tail to match.
        assert!(glob_match("*ab", "aab", true));
        assert!(glob_match("*a*a", "aaaa", true));
        assert!(!glob_match("*a*b", "aaaa", true));
    }
}
