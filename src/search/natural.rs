//! Natural-language search.
//!
//! Every query word is looked up in the index; each posting adds
//! `stored weight * gw * query count` to its document. Documents are then
//! emitted by ascending doc ref, or best first when the search is sorted.
//! With expansion the best documents are folded back into the query and the
//! lookup runs once more.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use crate::core::error::Result;
use crate::core::types::{DocId, Row, SearchFlags};
use crate::index::inverted::{PostingCursor, WordMatch};
use crate::scoring::scorer::{global_weight, query_weight};
use crate::search::results::{FulltextResult, Hit, ScoredDocument, SearchContext, SearchState};
use crate::storage::cursor::{KeyCursor, RowReader};

/// A query word and its effective weight `gw * c_q`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWord {
    pub word: Vec<u8>,
    pub count: u32,
    pub weight: f64,
}

/// Per-document accumulator. The last word's contribution stays pending in
/// `tmp_weight` until that word's global weight is known.
#[derive(Debug, Clone, Copy)]
struct DocRecord {
    weight_acc: f64,
    word_ptr: usize,
    tmp_weight: f32,
}

pub struct NaturalSearch<S> {
    storage: S,
    ctx: SearchContext,
    flags: SearchFlags,
    state: SearchState,
    words: Vec<QueryWord>,
    docs: Vec<ScoredDocument>,  // By ascending doc ref
    order: Vec<usize>,          // Emission order, indexes into `docs`
    pos: usize,
    active: Option<usize>,
}

impl<S: KeyCursor + RowReader> NaturalSearch<S> {
    pub fn new(storage: S, ctx: SearchContext, query: &[u8], flags: SearchFlags) -> Result<Self> {
        let counts = ctx.analyzer.word_counts(query, ctx.def.collation);
        let mut search = NaturalSearch {
            storage,
            ctx,
            flags,
            state: SearchState::Uninit,
            words: Vec::new(),
            docs: Vec::new(),
            order: Vec::new(),
            pos: 0,
            active: None,
        };

        search.lookup(counts.clone())?;
        let limit = search.ctx.config.query_expansion_limit;
        if flags.expand && limit > 0 {
            search.expand(counts, limit)?;
        }

        search.order = (0..search.docs.len()).collect();
        if flags.sorted {
            let docs = &search.docs;
            search.order.sort_by(|&a, &b| docs[a].cmp(&docs[b]));
        }
        search.state = SearchState::Ready;
        tracing::debug!(
            key = %search.ctx.def.name,
            words = search.words.len(),
            documents = search.docs.len(),
            sorted = flags.sorted,
            "natural language search prepared"
        );
        Ok(search)
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn flags(&self) -> SearchFlags {
        self.flags
    }

    /// Query words after analysis (and expansion), in key order
    pub fn words(&self) -> &[QueryWord] {
        &self.words
    }

    /// Number of candidate documents, including deleted rows not yet skipped
    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    /// Score every document holding at least one of `counts`' words
    fn lookup(&mut self, counts: BTreeMap<Vec<u8>, u32>) -> Result<()> {
        let watermark = self.storage.data_length_watermark();
        let total = self.storage.total_documents();
        let frequent_limit = self.ctx.config.frequent_word_limit;
        let mut records: BTreeMap<DocId, DocRecord> = BTreeMap::new();
        let mut words: Vec<QueryWord> = Vec::with_capacity(counts.len());

        for (word, count) in counts {
            let ptr = words.len();
            let mut cursor = PostingCursor::new(&word, WordMatch::Exact);
            let (mut scanned, mut skipped) = (0usize, 0usize);

            while let Some(posting) = cursor.next(&mut self.storage)? {
                if posting.docid >= watermark {
                    skipped += 1;
                    continue;
                }
                scanned += 1;
                match records.entry(posting.docid) {
                    Entry::Vacant(e) => {
                        e.insert(DocRecord { weight_acc: 0.0, word_ptr: ptr, tmp_weight: posting.weight });
                    }
                    Entry::Occupied(e) => {
                        let record = e.into_mut();
                        record.weight_acc += record.tmp_weight as f64 * words[record.word_ptr].weight;
                        record.word_ptr = ptr;
                        record.tmp_weight = posting.weight;
                    }
                }
            }

            let gw = if scanned == 0 {
                0.0
            } else {
                global_weight(total, self.storage.document_count_for_word(&word)?, frequent_limit)
            };
            if skipped > 0 {
                tracing::debug!(word = %String::from_utf8_lossy(&word), skipped, "postings past the watermark skipped");
            }
            tracing::trace!(word = %String::from_utf8_lossy(&word), postings = scanned, gw, "query word scanned");
            words.push(QueryWord { word, count, weight: gw * query_weight(count) });
        }

        self.docs = records
            .into_iter()
            .map(|(docid, r)| ScoredDocument {
                docid,
                score: (r.weight_acc + r.tmp_weight as f64 * words[r.word_ptr].weight) as f32,
            })
            .collect();
        self.words = words;
        Ok(())
    }

    /// One round of pseudo-relevance feedback over the best `limit` documents
    fn expand(&mut self, mut counts: BTreeMap<Vec<u8>, u32>, limit: usize) -> Result<()> {
        let mut best: Vec<ScoredDocument> = self.docs.iter().copied().filter(|d| d.score > 0.0).collect();
        best.sort();
        best.truncate(limit);

        for doc in &best {
            let Some(row) = self.storage.read_row(doc.docid)? else {
                continue;
            };
            for segment in self.ctx.def.segments(&row) {
                self.ctx.analyzer.count_into(segment, self.ctx.def.collation, &mut counts);
            }
        }
        tracing::debug!(documents = best.len(), words = counts.len(), "query expanded");
        self.lookup(counts)
    }
}

impl<S: KeyCursor + RowReader> FulltextResult for NaturalSearch<S> {
    fn read_next(&mut self) -> Result<Option<Hit>> {
        match self.state {
            SearchState::Uninit | SearchState::IndexDone => return Ok(None),
            SearchState::Ready | SearchState::Scan => self.state = SearchState::IndexSearch,
            SearchState::IndexSearch => {}
        }

        while let Some(&idx) = self.order.get(self.pos) {
            self.pos += 1;
            let doc = self.docs[idx];
            match self.storage.read_row(doc.docid)? {
                Some(row) => {
                    self.active = Some(idx);
                    return Ok(Some(Hit { docid: doc.docid, row, relevance: doc.score }));
                }
                None => tracing::trace!(docid = doc.docid.value(), "deleted row skipped"),
            }
        }
        self.state = SearchState::IndexDone;
        self.active = None;
        Ok(None)
    }

    fn find_relevance(&mut self, docid: DocId, _row: &Row) -> Result<f32> {
        if self.state == SearchState::Ready {
            self.state = SearchState::Scan;
        }
        Ok(self
            .docs
            .binary_search_by(|d| d.docid.cmp(&docid))
            .map_or(0.0, |i| self.docs[i].score))
    }

    fn get_relevance(&self) -> f32 {
        self.active.map_or(0.0, |i| self.docs[i].score)
    }

    fn reinit_search(&mut self) -> Result<()> {
        if self.state != SearchState::Uninit {
            self.state = SearchState::Ready;
        }
        self.pos = 0;
        self.active = None;
        Ok(())
    }

    fn close(&mut self) {
        self.state = SearchState::Uninit;
        self.words = Vec::new();
        self.docs = Vec::new();
        self.order = Vec::new();
        self.pos = 0;
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::analysis::analyzer::Analyzer;
    use crate::analysis::filters::stopword::StopwordSet;
    use crate::core::config::Config;
    use crate::index::index_writer::IndexWriter;
    use crate::schema::schema::FulltextKeyDef;
    use crate::storage::memory::MemoryTable;

    fn context(config: Config) -> SearchContext {
        let analyzer = Analyzer::new(&config, Arc::new(StopwordSet::empty()));
        SearchContext::new(analyzer, FulltextKeyDef::new("body", vec![0]), config)
    }

    fn load(table: &MemoryTable, ctx: &SearchContext, texts: &[&str]) -> Vec<DocId> {
        let writer = IndexWriter::new(&ctx.analyzer, ctx.scorer(), &ctx.def);
        let mut cursor = table.cursor(0);
        texts
            .iter()
            .map(|text| {
                let row = Row::from_texts(&[*text]);
                let docid = table.insert_row(row.clone());
                writer.add(&mut cursor, &row, docid).unwrap();
                table.publish(docid);
                docid
            })
            .collect()
    }

    fn docids(search: &mut NaturalSearch<impl KeyCursor + RowReader>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(hit) = search.read_next().unwrap() {
            out.push(hit.docid.value());
        }
        out
    }

    const CORPUS: &[&str] = &[
        "cat cat cat",
        "cat dog",
        "filler text one",
        "filler text two",
        "filler text three",
    ];

    #[test]
    fn sorted_search_orders_by_score() {
        let ctx = context(Config::default().with_min_word_len(3));
        let table = MemoryTable::new(1);
        load(&table, &ctx, CORPUS);

        let mut search = NaturalSearch::new(table.cursor(0), ctx, b"cat", SearchFlags::SORTED).unwrap();
        let first = search.read_next().unwrap().unwrap();
        let second = search.read_next().unwrap().unwrap();
        assert_eq!((first.docid, second.docid), (DocId(1), DocId(2)));
        assert!(first.relevance > second.relevance && second.relevance > 0.0);
        assert!(search.read_next().unwrap().is_none());
        assert_eq!(search.state(), SearchState::IndexDone);
    }

    #[test]
    fn unsorted_search_follows_doc_refs() {
        let ctx = context(Config::default().with_min_word_len(3));
        let table = MemoryTable::new(1);
        load(&table, &ctx, CORPUS);

        let mut search = NaturalSearch::new(table.cursor(0), ctx, b"dog filler", SearchFlags::NONE).unwrap();
        assert_eq!(docids(&mut search), vec![2, 3, 4, 5]);
    }

    #[test]
    fn deleted_and_unpublished_rows_are_skipped() {
        let ctx = context(Config::default().with_min_word_len(3));
        let table = MemoryTable::new(1);
        load(&table, &ctx, CORPUS);
        table.delete_row(DocId(1));

        // Indexed but past the watermark
        let writer = IndexWriter::new(&ctx.analyzer, ctx.scorer(), &ctx.def);
        let row = Row::from_texts(&["cat in progress"]);
        let docid = table.insert_row(row.clone());
        writer.add(&mut table.cursor(0), &row, docid).unwrap();

        let mut search = NaturalSearch::new(table.cursor(0), ctx, b"cat", SearchFlags::NONE).unwrap();
        assert_eq!(search.document_count(), 2);
        assert_eq!(docids(&mut search), vec![2]);
    }

    #[test]
    fn relevance_lookup_and_restart() {
        let ctx = context(Config::default().with_min_word_len(3));
        let table = MemoryTable::new(1);
        load(&table, &ctx, CORPUS);

        let mut search = NaturalSearch::new(table.cursor(0), ctx, b"cat", SearchFlags::NONE).unwrap();
        let unrelated = table.row(DocId(3)).unwrap();
        assert_eq!(search.find_relevance(DocId(3), &unrelated).unwrap(), 0.0);
        assert_eq!(search.state(), SearchState::Scan);

        let hit = search.read_next().unwrap().unwrap();
        assert_eq!(search.get_relevance(), hit.relevance);
        assert_eq!(search.find_relevance(hit.docid, &hit.row).unwrap(), hit.relevance);

        search.reinit_search().unwrap();
        assert_eq!(docids(&mut search), vec![1, 2]);

        search.close();
        assert!(search.read_next().unwrap().is_none());
        assert_eq!(search.get_relevance(), 0.0);
    }

    #[test]
    fn unknown_and_common_words_carry_no_weight() {
        let ctx = context(Config::default());
        let table = MemoryTable::new(1);
        load(&table, &ctx, &["alpha beta", "gamma delta"]);

        let mut search = NaturalSearch::new(table.cursor(0), ctx.clone(), b"zeta", SearchFlags::NONE).unwrap();
        assert!(search.read_next().unwrap().is_none());

        load(&table, &ctx, &["alpha again"]);
        // "alpha" is in two of three rows: ln(1/2) < 0, so gw is clamped
        let mut search = NaturalSearch::new(table.cursor(0), ctx, b"alpha", SearchFlags::NONE).unwrap();
        assert_eq!(search.words()[0].weight, 0.0);
        let hit = search.read_next().unwrap().unwrap();
        assert_eq!(hit.relevance, 0.0);
    }

    #[test]
    fn expansion_pulls_in_related_documents() {
        let config = Config::default().with_query_expansion_limit(1);
        let table = MemoryTable::new(1);
        let ctx = context(config);
        load(&table, &ctx, &[
            "apple banana",
            "banana cherry",
            "cherry grape",
            "filler words here",
            "filler words there",
            "filler words everywhere",
            "filler words nowhere",
        ]);

        let mut plain = NaturalSearch::new(table.cursor(0), ctx.clone(), b"apple", SearchFlags::NONE).unwrap();
        assert_eq!(docids(&mut plain), vec![1]);

        let mut expanded = NaturalSearch::new(table.cursor(0), ctx.clone(), b"apple", SearchFlags::EXPAND).unwrap();
        assert!(expanded.words().iter().any(|w| w.word == b"banana"));
        assert_eq!(docids(&mut expanded), vec![1, 2]);

        // A zero limit disables expansion
        let off = context(Config::default());
        let mut search = NaturalSearch::new(table.cursor(0), off, b"apple", SearchFlags::EXPAND).unwrap();
        assert_eq!(docids(&mut search), vec![1]);
    }
}
