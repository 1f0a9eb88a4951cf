use std::cmp::Ordering;
use std::sync::Arc;
use crate::analysis::analyzer::Analyzer;
use crate::analysis::filters::stopword::StopwordSet;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Row, SearchFlags, SearchMode};
use crate::index::index_writer::{IndexWriter, UpdateStats};
use crate::schema::schema::FulltextKeyDef;
use crate::scoring::scorer::DocumentScorer;
use crate::search::boolean::BooleanSearch;
use crate::search::natural::NaturalSearch;
use crate::search::results::{FtSearch, SearchContext};
use crate::storage::cursor::{KeyCursor, RowReader};

/// Fulltext engine of one table: the entry points the storage engine calls
pub struct FulltextEngine {
    config: Config,
    analyzer: Analyzer,
    keys: Vec<FulltextKeyDef>,  // Indexed by key id
    stopwords_frozen: bool,     // Set once a stopword list is installed
}

impl FulltextEngine {
    /// Engine with an empty stopword set
    pub fn new(config: Config, keys: Vec<FulltextKeyDef>) -> Result<Self> {
        config.validate()?;
        let analyzer = Analyzer::new(&config, Arc::new(StopwordSet::empty()));
        tracing::debug!(keys = keys.len(), min_word_len = config.min_word_len, "fulltext engine created");
        Ok(FulltextEngine { config, analyzer, keys, stopwords_frozen: false })
    }

    pub fn with_stopwords<I, S>(mut self, words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.init_stopwords(words)?;
        Ok(self)
    }

    /// Install the stopword set. Only one set is ever accepted: postings
    /// already written depend on it. A failed build installs nothing.
    pub fn init_stopwords<I, S>(&mut self, words: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.stopwords_frozen {
            return Err(Error::invalid_config("stopword set is already initialized"));
        }
        let set = StopwordSet::new(words, self.config.collation, self.config.max_stopwords)?;
        tracing::debug!(stopwords = set.len(), "stopword set initialized");
        self.analyzer.stopwords = Arc::new(set);
        self.stopwords_frozen = true;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stopwords(&self) -> &Arc<StopwordSet> {
        &self.analyzer.stopwords
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn key(&self, key_id: usize) -> Result<&FulltextKeyDef> {
        self.keys
            .get(key_id)
            .ok_or_else(|| Error::invalid_config(format!("no fulltext key {}", key_id)))
    }

    pub fn writer(&self, key_id: usize) -> Result<IndexWriter<'_>> {
        let def = self.key(key_id)?;
        Ok(IndexWriter::new(&self.analyzer, DocumentScorer::new(self.config.pivot_coefficient), def))
    }

    pub fn add_row<C: KeyCursor + ?Sized>(&self, key_id: usize, cursor: &mut C, row: &Row, docid: DocId) -> Result<usize> {
        self.writer(key_id)?.add(cursor, row, docid)
    }

    pub fn del_row<C: KeyCursor + ?Sized>(&self, key_id: usize, cursor: &mut C, row: &Row, docid: DocId) -> Result<usize> {
        self.writer(key_id)?.delete(cursor, row, docid)
    }

    pub fn update_row<C: KeyCursor + ?Sized>(
        &self,
        key_id: usize,
        cursor: &mut C,
        old: &Row,
        new: &Row,
        docid: DocId,
    ) -> Result<UpdateStats> {
        self.writer(key_id)?.update(cursor, old, new, docid)
    }

    pub fn bulk_add<C: KeyCursor + ?Sized>(&self, key_id: usize, cursor: &mut C, rows: &[(DocId, Row)]) -> Result<usize> {
        self.writer(key_id)?.bulk_add(cursor, rows)
    }

    /// Collation order of the key columns of two rows
    pub fn compare_rows(&self, key_id: usize, a: &Row, b: &Row) -> Result<Ordering> {
        Ok(self.key(key_id)?.compare(a, b))
    }

    /// Start a search over one fulltext key. `flags` only affect natural mode.
    pub fn init_search<S: KeyCursor + RowReader>(
        &self,
        storage: S,
        key_id: usize,
        mode: SearchMode,
        query: &[u8],
        flags: SearchFlags,
    ) -> Result<FtSearch<S>> {
        let ctx = SearchContext::new(self.analyzer.clone(), self.key(key_id)?.clone(), self.config.clone());
        tracing::debug!(key = %ctx.def.name, ?mode, query = %String::from_utf8_lossy(query), "search started");
        Ok(match mode {
            SearchMode::Natural => FtSearch::Natural(NaturalSearch::new(storage, ctx, query, flags)?),
            SearchMode::Boolean => FtSearch::Boolean(BooleanSearch::new(storage, ctx, query)),
        })
    }
}
