//! The `{ size, elements }` wire shape (SPEC_FULL.md §6) for the
//! integer-typed vectors in the on-disk module format — a count field
//! stored alongside the array rather than left implicit in the JSON
//! array length.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LengthPrefixedVec<T> {
    pub size: u64,
    pub elements: Vec<T>,
}

impl<T> LengthPrefixedVec<T> {
    pub fn new(elements: Vec<T>) -> Self {
        LengthPrefixedVec {
            size: elements.len() as u64,
            elements,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.elements.iter_mut()
    }
}

impl<T> From<Vec<T>> for LengthPrefixedVec<T> {
    fn from(elements: Vec<T>) -> Self {
        LengthPrefixedVec::new(elements)
    }
}

impl<T> std::ops::Deref for LengthPrefixedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.elements
    }
}

impl<T> IntoIterator for LengthPrefixedVec<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a LengthPrefixedVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut LengthPrefixedVec<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_tracks_the_element_count_on_construction() {
        let v = LengthPrefixedVec::new(vec![1, 2, 3]);
        assert_eq!(v.size, 3);
        assert_eq!(&*v, &[1, 2, 3]);
    }

    #[test]
    fn serializes_with_an_explicit_size_field() {
        let v = LengthPrefixedVec::new(vec!["a".to_string()]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"size":1,"elements":["a"]}"#);
    }
}
