//! Composite key built from several parts.

use std::borrow::Cow;

use crate::key::ClientKey;

/// Combine several key parts into one client key.
///
/// The resulting key is formatted as `"{part1}:{part2}:..."`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    parts: Vec<String>,
    separator: &'static str,
}

impl Default for CompositeKey {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeKey {
    /// Create an empty composite key with default separator `:`.
    pub fn new() -> Self {
        Self::with_separator(":")
    }

    /// Create an empty composite key with a custom separator.
    pub fn with_separator(separator: &'static str) -> Self {
        Self {
            parts: Vec::new(),
            separator,
        }
    }

    /// Append a part.
    pub fn part<K: ClientKey>(mut self, part: K) -> Self {
        self.parts.push(part.to_key().into_owned());
        self
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the key has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl ClientKey for CompositeKey {
    fn to_key(&self) -> Cow<'_, str> {
        match self.parts.as_slice() {
            [single] => Cow::Borrowed(single.as_str()),
            parts => Cow::Owned(parts.join(self.separator)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts_with_separator() {
        let key = CompositeKey::new().part("user:9").part(443u64);
        assert_eq!(key.len(), 2);
        assert_eq!(key.to_key(), "user:9:443");

        let key = CompositeKey::with_separator("|").part("a").part("b");
        assert_eq!(key.to_key(), "a|b");
    }

    #[test]
    fn single_part_is_borrowed() {
        let key = CompositeKey::new().part("only");
        assert!(matches!(key.to_key(), Cow::Borrowed("only")));
        assert!(CompositeKey::new().is_empty());
        assert_eq!(CompositeKey::new().to_key(), "");
    }
}
