//! Normalized file-extension tokens.

use std::fmt;

/// A case-insensitive file-extension token.
///
/// Normalized at construction: the leading dot is stripped and ASCII
/// case is folded to lower, so equality and hashing are plain derives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Extension(String);

impl Extension {
    pub fn new(text: &str) -> Self {
        Self(text.trim_start_matches('.').to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(Extension::new("TXT").as_str(), "txt");
        assert_eq!(Extension::new(".Esm").as_str(), "esm");
        assert_eq!(Extension::new("gz"), Extension::new(".GZ"));
    }
}
