//! HTTP header storage
//!
//! Ordered multimap with case-insensitive keys. Insertion order is preserved
//! for enumeration; multiple values per key are permitted (e.g. Cookie,
//! Accept-Language on requests).

use smallvec::SmallVec;

/// A single header name/value pair.
///
/// The name is stored in the case the caller supplied; matching is
/// ASCII-case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    /// Create a new entry
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Check whether this entry matches the given name (case-insensitive)
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered header collection (stack-allocated for small header counts)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderMap {
    entries: SmallVec<[HeaderEntry; 8]>,
}

impl HeaderMap {
    /// Create an empty header map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries (every value counts, not distinct names)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the first value for a name (case-insensitive)
    ///
    /// Returns `None` when no entry with that name exists; a present header
    /// with an empty value yields `Some("")`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name_matches(name))
            .map(|e| e.value.as_str())
    }

    /// Get every value for a name, in insertion order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.name_matches(name))
            .map(|e| e.value.as_str())
            .collect()
    }

    /// Check whether any entry with the given name exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name_matches(name))
    }

    /// Append a value without touching existing entries for the name
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(HeaderEntry::new(name, value));
    }

    /// Replace every value for the name with the single given value
    ///
    /// The replacement entry is pushed at the end, so a replaced name
    /// re-enters enumeration order at its re-insertion point.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|e| !e.name_matches(&name));
        self.entries.push(HeaderEntry::new(name, value));
    }

    /// Remove every entry with the given name, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.name_matches(name));
        before - self.entries.len()
    }

    /// Copy all entries into a caller-supplied map without clearing it first
    ///
    /// This is the boundary's bulk-read shape: the caller owns the output map
    /// and pre-existing entries in it survive.
    pub fn extend_into(&self, out: &mut HeaderMap) {
        out.entries.extend(self.entries.iter().cloned());
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| HeaderEntry::new(n, v))
                .collect(),
        }
    }
}

impl IntoIterator for HeaderMap {
    type Item = HeaderEntry;
    type IntoIter = smallvec::IntoIter<[HeaderEntry; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = &'a HeaderEntry;
    type IntoIter = std::slice::Iter<'a, HeaderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.append("Content-Type", "text/html");

        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(headers.get("Content-TYPE"), Some("text/html"));
    }

    #[test]
    fn test_absent_is_none_not_empty() {
        let mut headers = HeaderMap::new();
        headers.append("X-Empty", "");

        assert_eq!(headers.get("X-Empty"), Some(""));
        assert_eq!(headers.get("X-Missing"), None);
    }

    #[test]
    fn test_append_keeps_existing_values() {
        let mut headers = HeaderMap::new();
        headers.append("Accept", "text/html");
        headers.append("accept", "application/json");

        assert_eq!(headers.len(), 2);
        assert_eq!(
            headers.get_all("Accept"),
            vec!["text/html", "application/json"]
        );
        // First value wins for single lookup
        assert_eq!(headers.get("ACCEPT"), Some("text/html"));
    }

    #[test]
    fn test_insert_replaces_all_values() {
        let mut headers = HeaderMap::new();
        headers.append("X-Test", "1");
        headers.append("x-test", "2");
        headers.insert("X-TEST", "new");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_all("x-test"), vec!["new"]);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let headers: HeaderMap = [
            ("Host", "example.com"),
            ("Accept", "*/*"),
            ("Cookie", "a=1"),
            ("Cookie", "b=2"),
        ]
        .into_iter()
        .collect();

        let names: Vec<&str> = headers.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Host", "Accept", "Cookie", "Cookie"]);
    }

    #[test]
    fn test_extend_into_is_additive() {
        let mut out = HeaderMap::new();
        out.append("Pre-Existing", "kept");

        let headers: HeaderMap = [("A", "1"), ("B", "2")].into_iter().collect();
        headers.extend_into(&mut out);

        assert_eq!(out.len(), 3);
        assert_eq!(out.get("Pre-Existing"), Some("kept"));
        assert_eq!(out.get("A"), Some("1"));
        assert_eq!(out.get("B"), Some("2"));
    }

    #[test]
    fn test_remove_multiple() {
        let mut headers = HeaderMap::new();
        headers.append("Cookie", "a=1");
        headers.append("Cookie", "b=2");
        headers.append("Host", "example.com");

        assert_eq!(headers.remove("cookie"), 2);
        assert_eq!(headers.len(), 1);
        assert!(!headers.contains("Cookie"));
    }

    #[test]
    fn test_round_trip_equality() {
        let original: HeaderMap = [("X-A", "1"), ("X-B", "2"), ("x-a", "3")]
            .into_iter()
            .collect();

        let mut copy = HeaderMap::new();
        original.extend_into(&mut copy);

        assert_eq!(original, copy);
    }
}
