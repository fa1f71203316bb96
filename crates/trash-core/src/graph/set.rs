use serde::Serialize;
use std::collections::btree_set::{self, BTreeSet};

/// An ordered set of import paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PackageSet(BTreeSet<String>);

impl PackageSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a path, returning whether it was new.
    pub fn insert(&mut self, package: impl Into<String>) -> bool {
        self.0.insert(package.into())
    }

    #[must_use]
    pub fn contains(&self, package: &str) -> bool {
        self.0.contains(package)
    }

    pub fn remove(&mut self, package: &str) -> bool {
        self.0.remove(package)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.0.iter()
    }

    /// Add every member of `other` to `self`.
    pub fn merge(&mut self, other: &Self) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Consuming union, for use as a reduce step.
    #[must_use]
    pub fn union(mut self, mut other: Self) -> Self {
        if self.len() < other.len() {
            std::mem::swap(&mut self, &mut other);
        }
        self.0.append(&mut other.0);
        self
    }
}

impl FromIterator<String> for PackageSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for PackageSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl Extend<String> for PackageSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for PackageSet {
    type Item = String;
    type IntoIter = btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PackageSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> PackageSet {
        items.iter().copied().collect()
    }

    #[test]
    fn test_merge_adds_all() {
        let mut a = set(&["x", "y"]);
        a.merge(&set(&["y", "z"]));
        assert_eq!(a, set(&["x", "y", "z"]));
    }

    #[test]
    fn test_merge_empty_is_identity() {
        let mut a = set(&["x"]);
        a.merge(&PackageSet::new());
        assert_eq!(a, set(&["x"]));

        let mut empty = PackageSet::new();
        empty.merge(&set(&["x"]));
        assert_eq!(empty, set(&["x"]));
    }

    #[test]
    fn test_union_is_commutative() {
        let a = set(&["a", "b"]);
        let b = set(&["b", "c", "d"]);
        assert_eq!(a.clone().union(b.clone()), b.union(a));
    }

    #[test]
    fn test_merge_is_associative() {
        let a = set(&["a", "b"]);
        let b = set(&["b", "c"]);
        let c = set(&["c", "d", "a"]);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut left = a.clone();
        left.merge(&bc);

        let mut right = a.clone();
        right.merge(&b);
        right.merge(&c);

        assert_eq!(left, right);
        assert_eq!(
            a.clone().union(b.clone().union(c.clone())),
            a.union(b).union(c)
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = set(&["x", "y"]);
        let mut merged = a.clone();
        merged.merge(&a);
        assert_eq!(merged, a);
        assert_eq!(a.clone().union(a.clone()), a);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let s = set(&["c", "a", "b"]);
        let items: Vec<&String> = s.iter().collect();
        assert_eq!(items, ["a", "b", "c"]);
    }
}
