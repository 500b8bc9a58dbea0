// src/keyspace/generator.rs
// =============================================================================
// Lazy enumeration of all |alphabet|^length query strings.
//
// How it works:
// - Keep one index per position, like the digits of an odometer
// - Emit the string for the current indices
// - Advance the last position; on overflow reset it and carry to the left
// - When the carry falls off the first position, we are done
//
// Nothing is allocated up front, so a large keyspace costs one small Vec of
// indices no matter how many strings it will produce.
// =============================================================================

use crate::error::{KeysweepError, Result};
use crate::model::Query;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    alphabet: Vec<char>,
    length: usize,
    size: usize,
}

impl KeySpace {
    // Builds a keyspace over `alphabet` with strings of `length` symbols
    //
    // Repeated symbols are dropped (first occurrence wins) so every emitted
    // string is distinct. Fails only when the total count does not fit in
    // a usize.
    pub fn new(alphabet: &str, length: usize) -> Result<Self> {
        let mut symbols: Vec<char> = Vec::new();
        for c in alphabet.chars() {
            if !symbols.contains(&c) {
                symbols.push(c);
            }
        }

        let exponent = u32::try_from(length)
            .map_err(|_| KeysweepError::keyspace(format!("query length {} is too large", length)))?;
        let size = symbols.len().checked_pow(exponent).ok_or_else(|| {
            KeysweepError::keyspace(format!(
                "{} symbols at length {} overflows the keyspace size",
                symbols.len(),
                length
            ))
        })?;

        Ok(Self {
            alphabet: symbols,
            length,
            size,
        })
    }

    /// Number of queries the keyspace produces
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    pub fn query_length(&self) -> usize {
        self.length
    }

    /// Starts a fresh pass over the keyspace
    pub fn iter(&self) -> Queries<'_> {
        Queries {
            space: self,
            indices: vec![0; self.length],
            remaining: self.size,
        }
    }
}

impl<'a> IntoIterator for &'a KeySpace {
    type Item = Query;
    type IntoIter = Queries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// One pass over a KeySpace
#[derive(Debug, Clone)]
pub struct Queries<'a> {
    space: &'a KeySpace,
    indices: Vec<usize>,
    remaining: usize,
}

impl Iterator for Queries<'_> {
    type Item = Query;

    fn next(&mut self) -> Option<Query> {
        if self.remaining == 0 {
            return None;
        }

        let query: String = self
            .indices
            .iter()
            .map(|&i| self.space.alphabet[i])
            .collect();

        self.remaining -= 1;

        // Odometer step: rightmost position moves fastest
        let base = self.space.alphabet.len();
        for slot in self.indices.iter_mut().rev() {
            *slot += 1;
            if *slot < base {
                break;
            }
            *slot = 0;
        }

        Some(Query::from(query))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Queries<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    fn collect(space: &KeySpace) -> Vec<String> {
        space.iter().map(|q| q.as_str().to_string()).collect()
    }

    #[test]
    fn test_two_by_two_in_product_order() {
        let space = KeySpace::new("ab", 2).unwrap();
        assert_eq!(collect(&space), vec!["aa", "ab", "ba", "bb"]);
    }

    #[rstest]
    #[case("ab", 1, 2)]
    #[case("abc", 3, 27)]
    #[case("abcdefghijklmnopqrstuvwxyz0123456789'", 2, 37 * 37)]
    #[case("xyz", 0, 1)]
    #[case("", 3, 0)]
    fn test_size_is_alphabet_to_the_length(
        #[case] alphabet: &str,
        #[case] length: usize,
        #[case] expected: usize,
    ) {
        let space = KeySpace::new(alphabet, length).unwrap();
        assert_eq!(space.len(), expected);

        let produced = collect(&space);
        assert_eq!(produced.len(), expected);

        let distinct: HashSet<_> = produced.iter().collect();
        assert_eq!(distinct.len(), expected, "every query must be distinct");
        assert!(produced.iter().all(|q| q.chars().count() == length));
    }

    #[test]
    fn test_iteration_is_restartable() {
        let space = KeySpace::new("01'", 3).unwrap();
        assert_eq!(collect(&space), collect(&space));
        assert_eq!(space.iter().len(), 27);
    }

    #[test]
    fn test_duplicate_symbols_are_dropped() {
        let space = KeySpace::new("abca", 2).unwrap();
        assert_eq!(space.alphabet(), &['a', 'b', 'c']);
        assert_eq!(space.len(), 9);
    }

    #[test]
    fn test_alphabet_order_is_respected() {
        let space = KeySpace::new("ba", 2).unwrap();
        assert_eq!(collect(&space), vec!["bb", "ba", "ab", "aa"]);
    }

    #[test]
    fn test_overflowing_keyspace_is_rejected() {
        let result = KeySpace::new("abcdefghijklmnopqrstuvwxyz", 64);
        assert!(matches!(result, Err(KeysweepError::Keyspace(_))));
    }

    #[test]
    fn test_size_hint_shrinks() {
        let space = KeySpace::new("ab", 2).unwrap();
        let mut it = space.iter();
        it.next();
        assert_eq!(it.len(), 3);
    }
}
