//! User search query

/// Longest search term accepted; anything beyond is cut off.
const MAX_QUERY_LEN: usize = 64;

/// A non-empty, trimmed substring search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Returns `None` for a blank query.
    pub fn new(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.chars().take(MAX_QUERY_LEN).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `ILIKE` pattern matching the term anywhere in the value.
    ///
    /// LIKE metacharacters in the term match literally (escape char is `\`).
    pub fn ilike_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.0.len() + 2);
        pattern.push('%');
        for c in self.0.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_none() {
        assert!(SearchQuery::new("").is_none());
        assert!(SearchQuery::new("   ").is_none());
    }

    #[test]
    fn substring_pattern() {
        let q = SearchQuery::new(" ali ").unwrap();
        assert_eq!(q.ilike_pattern(), "%ali%");
    }

    #[test]
    fn escapes_like_metacharacters() {
        let q = SearchQuery::new(r"50%_a\b").unwrap();
        assert_eq!(q.ilike_pattern(), r"%50\%\_a\\b%");
    }

    #[test]
    fn truncates_long_terms() {
        let q = SearchQuery::new(&"z".repeat(200)).unwrap();
        assert_eq!(q.as_str().len(), 64);
    }
}
