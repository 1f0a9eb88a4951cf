use std::cmp::Ordering;
use std::collections::BTreeMap;
use rayon::prelude::*;
use crate::analysis::analyzer::Analyzer;
use crate::core::error::Result;
use crate::core::types::{DocId, Row};
use crate::index::inverted::{erase_posting, insert_posting};
use crate::index::posting::encode_posting_key;
use crate::schema::schema::FulltextKeyDef;
use crate::scoring::scorer::{weights_differ, DocumentScorer};
use crate::storage::cursor::KeyCursor;

/// One distinct word of a record with its stored weight
#[derive(Debug, Clone, PartialEq)]
pub struct WordEntry {
    pub word: Vec<u8>,  // Collation key
    pub count: u32,
    pub weight: f32,
}

/// Words of a record, sorted by collation key
pub type WordList = Vec<WordEntry>;

/// Key writes issued by one update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub inserted: usize,
    pub erased: usize,
}

/// Row-level index maintenance for one fulltext key.
///
/// The first cursor error aborts the operation; keys written before it stay
/// written. Rolling back is the caller's transaction's job.
pub struct IndexWriter<'a> {
    pub analyzer: &'a Analyzer,
    pub scorer: DocumentScorer,
    pub def: &'a FulltextKeyDef,
}

impl<'a> IndexWriter<'a> {
    pub fn new(analyzer: &'a Analyzer, scorer: DocumentScorer, def: &'a FulltextKeyDef) -> Self {
        IndexWriter { analyzer, scorer, def }
    }

    /// Weighted word list of the indexed columns of `row`
    pub fn parse_record(&self, row: &Row) -> WordList {
        let mut counts: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
        for segment in self.def.segments(row) {
            self.analyzer.count_into(segment, self.def.collation, &mut counts);
        }
        let weights = self.scorer.normalize(&counts.values().copied().collect::<Vec<_>>());
        counts
            .into_iter()
            .zip(weights)
            .map(|((word, count), weight)| WordEntry { word, count, weight })
            .collect()
    }

    pub fn add<C: KeyCursor + ?Sized>(&self, cursor: &mut C, row: &Row, docid: DocId) -> Result<usize> {
        let words = self.parse_record(row);
        for entry in &words {
            insert_posting(cursor, &entry.word, docid, entry.weight)?;
        }
        tracing::debug!(key = %self.def.name, docid = docid.value(), words = words.len(), "row indexed");
        Ok(words.len())
    }

    pub fn delete<C: KeyCursor + ?Sized>(&self, cursor: &mut C, row: &Row, docid: DocId) -> Result<usize> {
        let words = self.parse_record(row);
        for entry in &words {
            erase_posting(cursor, &entry.word, docid, entry.weight)?;
        }
        tracing::debug!(key = %self.def.name, docid = docid.value(), words = words.len(), "row removed from index");
        Ok(words.len())
    }

    /// Rewrite only the postings whose word or stored weight changed
    pub fn update<C: KeyCursor + ?Sized>(&self, cursor: &mut C, old: &Row, new: &Row, docid: DocId) -> Result<UpdateStats> {
        let mut stats = UpdateStats::default();
        if self.compare(old, new) == Ordering::Equal {
            return Ok(stats);
        }

        let old_words = self.parse_record(old);
        let new_words = self.parse_record(new);
        let (mut i, mut j) = (0, 0);

        loop {
            let ord = match (old_words.get(i), new_words.get(j)) {
                (Some(a), Some(b)) => a.word.cmp(&b.word),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => break,
            };
            match ord {
                Ordering::Less => {
                    let a = &old_words[i];
                    erase_posting(cursor, &a.word, docid, a.weight)?;
                    stats.erased += 1;
                    i += 1;
                }
                Ordering::Greater => {
                    let b = &new_words[j];
                    insert_posting(cursor, &b.word, docid, b.weight)?;
                    stats.inserted += 1;
                    j += 1;
                }
                Ordering::Equal => {
                    let (a, b) = (&old_words[i], &new_words[j]);
                    if weights_differ(a.weight, b.weight) {
                        erase_posting(cursor, &a.word, docid, a.weight)?;
                        insert_posting(cursor, &b.word, docid, b.weight)?;
                        stats.erased += 1;
                        stats.inserted += 1;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }

        tracing::debug!(key = %self.def.name, docid = docid.value(), inserted = stats.inserted, erased = stats.erased, "row reindexed");
        Ok(stats)
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        self.def.compare(a, b)
    }

    /// Index many rows: parse in parallel, then insert every key in key order
    pub fn bulk_add<C: KeyCursor + ?Sized>(&self, cursor: &mut C, rows: &[(DocId, Row)]) -> Result<usize> {
        let mut keys: Vec<(Vec<u8>, bytes::Bytes)> = rows
            .par_iter()
            .flat_map_iter(|(docid, row)| {
                self.parse_record(row)
                    .into_iter()
                    .map(move |e| {
                        let key = encode_posting_key(&e.word, *docid, e.weight);
                        (e.word, key)
                    })
            })
            .collect();
        keys.par_sort_unstable();

        for (_, key) in &keys {
            cursor.insert(key)?;
        }
        tracing::debug!(key = %self.def.name, rows = rows.len(), postings = keys.len(), "bulk load finished");
        Ok(keys.len())
    }
}
