use std::cmp::Ordering;
use crate::analysis::analyzer::Analyzer;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{DocId, Row};
use crate::index::index_writer::{IndexWriter, WordList};
use crate::schema::schema::FulltextKeyDef;
use crate::scoring::scorer::DocumentScorer;
use crate::search::boolean::BooleanSearch;
use crate::search::natural::NaturalSearch;
use crate::storage::cursor::{KeyCursor, RowReader};

/// One matching row handed to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub docid: DocId,
    pub row: Row,
    pub relevance: f32,
}

/// Document with relevance score
#[derive(Debug, Clone, Copy)]
pub struct ScoredDocument {
    pub docid: DocId,
    pub score: f32,
}

impl PartialEq for ScoredDocument {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredDocument {}

impl PartialOrd for ScoredDocument {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDocument {
    /// Best first: higher score, then lower doc ref
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.docid.cmp(&other.docid))
    }
}

/// Lifecycle of a result list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Uninit,       // Closed
    Ready,        // Query prepared, nothing read yet
    IndexSearch,  // Reading results
    IndexDone,    // Results exhausted
    Scan,         // Only scoring rows supplied by the caller
}

/// Everything a search needs besides storage: analysis, key definition, tuning
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub analyzer: Analyzer,
    pub def: FulltextKeyDef,
    pub config: Config,
}

impl SearchContext {
    pub fn new(analyzer: Analyzer, def: FulltextKeyDef, config: Config) -> Self {
        SearchContext { analyzer, def, config }
    }

    pub fn scorer(&self) -> DocumentScorer {
        DocumentScorer::new(self.config.pivot_coefficient)
    }

    /// Weighted words of a row, as they would be indexed
    pub fn parse_row(&self, row: &Row) -> WordList {
        IndexWriter::new(&self.analyzer, self.scorer(), &self.def).parse_record(row)
    }
}

/// Result list of a fulltext search, read by the storage engine.
///
/// `read_next` makes the returned row the active row; `get_relevance` and a
/// `find_relevance` on the same doc ref refer to it until the next call.
pub trait FulltextResult {
    /// Next matching row, `None` at end of results
    fn read_next(&mut self) -> Result<Option<Hit>>;

    /// Relevance of an arbitrary row of the table; 0.0 when it does not match
    fn find_relevance(&mut self, docid: DocId, row: &Row) -> Result<f32>;

    /// Relevance of the active row
    fn get_relevance(&self) -> f32;

    /// Restart reading from the first result
    fn reinit_search(&mut self) -> Result<()>;

    /// Release cursors and per-query state; later reads return `None`
    fn close(&mut self);
}

/// Result list of either search mode
pub enum FtSearch<S> {
    Natural(NaturalSearch<S>),
    Boolean(BooleanSearch<S>),
}

impl<S: KeyCursor + RowReader> FtSearch<S> {
    /// Drain the remaining results
    pub fn collect_hits(&mut self) -> Result<Vec<Hit>> {
        let mut hits = Vec::new();
        while let Some(hit) = self.read_next()? {
            hits.push(hit);
        }
        Ok(hits)
    }
}

impl<S: KeyCursor + RowReader> FulltextResult for FtSearch<S> {
    fn read_next(&mut self) -> Result<Option<Hit>> {
        match self {
            FtSearch::Natural(s) => s.read_next(),
            FtSearch::Boolean(s) => s.read_next(),
        }
    }

    fn find_relevance(&mut self, docid: DocId, row: &Row) -> Result<f32> {
        match self {
            FtSearch::Natural(s) => s.find_relevance(docid, row),
            FtSearch::Boolean(s) => s.find_relevance(docid, row),
        }
    }

    fn get_relevance(&self) -> f32 {
        match self {
            FtSearch::Natural(s) => s.get_relevance(),
            FtSearch::Boolean(s) => s.get_relevance(),
        }
    }

    fn reinit_search(&mut self) -> Result<()> {
        match self {
            FtSearch::Natural(s) => s.reinit_search(),
            FtSearch::Boolean(s) => s.reinit_search(),
        }
    }

    fn close(&mut self) {
        match self {
            FtSearch::Natural(s) => s.close(),
            FtSearch::Boolean(s) => s.close(),
        }
    }
}
