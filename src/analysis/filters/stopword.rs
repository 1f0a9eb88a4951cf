use std::collections::BTreeSet;
use fst::Set;
use crate::analysis::charset::Collation;
use crate::core::error::{Error, ErrorKind, Result};

/// Immutable stopword set.
/// Built once and shared by reference between the writer and all searches.
/// Holds the words under every collation, so membership is always tested
/// with the collation of the key being indexed or searched.
pub struct StopwordSet {
    binary: Set<Vec<u8>>,
    folded: Set<Vec<u8>>,
    collation: Collation,  // Collation the size limit is counted in
}

impl StopwordSet {
    pub fn new<I, S>(words: I, collation: Collation, max_words: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<S> = words.into_iter().collect();
        // fst wants sorted, deduplicated input
        let keys_in = |c: Collation| -> BTreeSet<Vec<u8>> {
            words
                .iter()
                .map(|w| c.key(w.as_ref().as_bytes()))
                .filter(|k| !k.is_empty())
                .collect()
        };

        let count = keys_in(collation).len();
        if count > max_words {
            return Err(Error::new(
                ErrorKind::StopwordListTooLarge,
                format!("{} stopwords exceed the limit of {}", count, max_words),
            ));
        }

        let binary = Set::from_iter(keys_in(Collation::Binary))?;
        let folded = Set::from_iter(keys_in(Collation::CaseInsensitive))?;
        tracing::debug!(count, "stopword set built");
        Ok(StopwordSet { binary, folded, collation })
    }

    pub fn empty() -> Self {
        StopwordSet {
            binary: Set::default(),
            folded: Set::default(),
            collation: Collation::default(),
        }
    }

    fn keys(&self, collation: Collation) -> &Set<Vec<u8>> {
        match collation {
            Collation::Binary => &self.binary,
            Collation::CaseInsensitive => &self.folded,
        }
    }

    /// Membership of a raw word under `collation`
    pub fn contains(&self, word: &[u8], collation: Collation) -> bool {
        let keys = self.keys(collation);
        !keys.is_empty() && keys.contains(collation.key(word))
    }

    /// Membership of a word already in `collation`'s key form
    pub fn contains_key(&self, key: &[u8], collation: Collation) -> bool {
        self.keys(collation).contains(key)
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn len(&self) -> usize {
        self.keys(self.collation).len()
    }

    pub fn is_empty(&self) -> bool {
        self.binary.is_empty()
    }
}

impl std::fmt::Debug for StopwordSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopwordSet")
            .field("len", &self.len())
            .field("collation", &self.collation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CI: Collation = Collation::CaseInsensitive;

    #[test]
    fn membership_uses_collation() {
        let set = StopwordSet::new(["The", "about"], CI, 10).unwrap();
        assert!(set.contains(b"the", CI));
        assert!(set.contains(b"ABOUT", CI));
        assert!(!set.contains(b"quick", CI));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn binary_collation_is_exact() {
        let set = StopwordSet::new(["The"], Collation::Binary, 10).unwrap();
        assert!(set.contains(b"The", Collation::Binary));
        assert!(!set.contains(b"the", Collation::Binary));
    }

    #[test]
    fn lookup_collation_overrides_build_collation() {
        let set = StopwordSet::new(["with", "The"], CI, 10).unwrap();
        assert!(set.contains(b"With", CI));
        assert!(!set.contains(b"With", Collation::Binary));
        assert!(set.contains(b"with", Collation::Binary));
        assert!(set.contains(b"The", Collation::Binary));
        assert!(!set.contains(b"the", Collation::Binary));
        assert!(set.contains_key(b"the", CI));
    }

    #[test]
    fn duplicates_collapse_before_limit_check() {
        let set = StopwordSet::new(["over", "OVER", "Over"], CI, 1).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn oversized_list_rejected() {
        let words: Vec<String> = (0..20).map(|i| format!("word{}", i)).collect();
        let err = StopwordSet::new(&words, CI, 10).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StopwordListTooLarge);
    }

    #[test]
    fn empty_set_contains_nothing() {
        assert!(!StopwordSet::empty().contains(b"anything", CI));
        assert!(StopwordSet::empty().is_empty());
    }
}
