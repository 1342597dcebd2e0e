//! An insertion-ordered string multimap, used for request headers and query parameters.
//!
//! Headers and query parameters must preserve the order keys were first inserted in (so that,
//! e.g., two builds of logically the same request produce byte-identical wire representations),
//! but need not preserve relative order *across* keys beyond that. A `Vec<(String, Vec<String>)>`
//! gives us that cheaply without pulling in an external ordered-map dependency.

/// An ordered multimap from string keys to one or more string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedMultimap {
    entries: Vec<(String, Vec<String>)>,
}

impl OrderedMultimap {
    /// An empty multimap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`, preserving any existing values.
    ///
    /// If `key` has not been seen before, it is appended at the end of the insertion order.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if let Some((_, values)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            values.push(value.into());
        } else {
            self.entries.push((key, vec![value.into()]));
        }
    }

    /// Replace all values for `key` with the single given value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if let Some((_, values)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            values.clear();
            values.push(value.into());
        } else {
            self.entries.push((key, vec![value.into()]));
        }
    }

    /// Remove all values for `key`, if present.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// The first value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }

    /// All values for `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// True if no keys have been inserted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs, in the order keys were first inserted, and in
    /// insertion order among values sharing a key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_first_insertion_order_across_keys() {
        let mut m = OrderedMultimap::new();
        m.append("b", "1");
        m.append("a", "1");
        m.append("b", "2");
        let keys: Vec<_> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "b", "a"]);
    }

    #[test]
    fn set_replaces_all_prior_values() {
        let mut m = OrderedMultimap::new();
        m.append("k", "1");
        m.append("k", "2");
        m.set("k", "3");
        assert_eq!(m.get_all("k"), &["3".to_string()]);
    }

    #[test]
    fn clone_is_independent() {
        let mut a = OrderedMultimap::new();
        a.append("k", "1");
        let mut b = a.clone();
        b.append("k", "2");
        assert_eq!(a.get_all("k"), &["1".to_string()]);
        assert_eq!(b.get_all("k"), &["1".to_string(), "2".to_string()]);
    }
}
