use std::collections::BTreeMap;
use std::sync::Arc;
use crate::analysis::charset::Collation;
use crate::analysis::filters::stopword::StopwordSet;
use crate::analysis::tokenizer::{FtTokenizer, TokenizerOptions};
use crate::core::config::Config;

/// Text analysis pipeline: tokenizer, stopword filter, collation folding
#[derive(Debug, Clone)]
pub struct Analyzer {
    pub tokenizer: FtTokenizer,
    pub stopwords: Arc<StopwordSet>,
}

impl Analyzer {
    pub fn new(config: &Config, stopwords: Arc<StopwordSet>) -> Self {
        Analyzer {
            tokenizer: FtTokenizer::new(TokenizerOptions::from(config)),
            stopwords,
        }
    }

    /// Stopword test under the collation of the key being indexed or searched
    pub fn is_stopword(&self, word: &[u8], collation: Collation) -> bool {
        self.stopwords.contains(word, collation)
    }

    /// Add the non-stopword words of `text` to `counts`, keyed by collation key
    pub fn count_into(&self, text: &[u8], collation: Collation, counts: &mut BTreeMap<Vec<u8>, u32>) {
        for word in self.tokenizer.words(text) {
            if self.is_stopword(word.bytes, collation) {
                tracing::trace!(word = %word.as_str_lossy(), "stopword skipped");
                continue;
            }
            *counts.entry(collation.key(word.bytes)).or_insert(0) += 1;
        }
    }

    pub fn word_counts(&self, text: &[u8], collation: Collation) -> BTreeMap<Vec<u8>, u32> {
        let mut counts = BTreeMap::new();
        self.count_into(text, collation, &mut counts);
        counts
    }
}
