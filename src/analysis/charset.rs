use std::cmp::Ordering;
use serde::{Serialize, Deserialize};

/// Collation of an indexed column.
///
/// Words are stored in the index in their collation key form, so byte order
/// of keys is collation order and key equality is collation equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Collation {
    Binary,
    #[default]
    CaseInsensitive,
}

impl Collation {
    /// Collation key of a word
    pub fn key(&self, word: &[u8]) -> Vec<u8> {
        match self {
            Collation::Binary => word.to_vec(),
            Collation::CaseInsensitive => match std::str::from_utf8(word) {
                Ok(text) => text.to_lowercase().into_bytes(),
                Err(_) => word.to_ascii_lowercase(),
            },
        }
    }

    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            Collation::Binary => a.cmp(b),
            Collation::CaseInsensitive => self.key(a).cmp(&self.key(b)),
        }
    }

    pub fn eq(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Length of a word in characters (bytes for malformed input)
pub fn char_len(word: &[u8]) -> usize {
    match std::str::from_utf8(word) {
        Ok(text) => text.chars().count(),
        Err(_) => word.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_folds_unicode() {
        let c = Collation::CaseInsensitive;
        assert_eq!(c.key("ÉCOLE".as_bytes()), "école".as_bytes());
        assert!(c.eq(b"Fox", b"fOX"));
        assert_eq!(c.compare(b"apple", b"Banana"), Ordering::Less);
    }

    #[test]
    fn binary_keeps_bytes() {
        let c = Collation::Binary;
        assert_eq!(c.key(b"Fox"), b"Fox".to_vec());
        assert!(!c.eq(b"Fox", b"fox"));
    }

    #[test]
    fn char_len_counts_characters() {
        assert_eq!(char_len("naïve".as_bytes()), 5);
        assert_eq!(char_len(b"\xffab"), 3);
    }
}
