//! Named values captured from a matched uri.
//!
//! Captures keep the declaration order of the template's parameters and use
//! a small-vector so the common one-to-four parameter routes stay on the
//! stack.

use smallvec::SmallVec;

const INLINE_CAPTURES: usize = 4;

/// Named captures, in the order the template declares them.
///
/// # Example
///
/// ```rust
/// use syme_router::Captures;
///
/// let mut captures = Captures::new();
/// captures.push("id", " 42 ");
///
/// assert_eq!(captures.get("id"), Some("42"));
/// assert!(captures.contains("id"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Captures {
    inner: SmallVec<[(String, String); INLINE_CAPTURES]>,
}

impl Captures {
    /// Creates an empty set of captures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a captured value. Surrounding whitespace is trimmed.
    pub fn push(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
        self.inner
            .push((name.into(), value.as_ref().trim().to_string()));
    }

    /// Returns the captured value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if a value was captured for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(n, _)| n == name)
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of captured values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl IntoIterator for Captures {
    type Item = (String, String);
    type IntoIter = smallvec::IntoIter<[(String, String); INLINE_CAPTURES]>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for Captures {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut captures = Self::new();
        for (name, value) in iter {
            captures.push(name, value);
        }
        captures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_trims_value() {
        let mut captures = Captures::new();
        captures.push("slug", "  hello-world\t");
        assert_eq!(captures.get("slug"), Some("hello-world"));
    }

    #[test]
    fn test_order_is_preserved() {
        let captures: Captures = [("year", "2024"), ("month", "01"), ("day", "31")]
            .into_iter()
            .collect();
        let names: Vec<&str> = captures.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["year", "month", "day"]);
    }

    #[test]
    fn test_spills_past_inline_capacity() {
        let captures: Captures = (0..8).map(|i| (format!("p{i}"), i.to_string())).collect();
        assert_eq!(captures.len(), 8);
        assert_eq!(captures.get("p6"), Some("6"));
        assert!(!captures.contains("p8"));
    }

    #[test]
    fn test_owned_iteration() {
        let captures: Captures = [("id", "7")].into_iter().collect();
        let owned: Vec<(String, String)> = captures.into_iter().collect();
        assert_eq!(owned, vec![("id".to_string(), "7".to_string())]);
    }
}
