//! Boolean-mode search.
//!
//! Each word leaf of the query tree gets the postings of its word (or, when
//! truncated, of every word with that prefix) ordered by doc ref. A queue of
//! leaves ordered by `(doc ref ascending, depth descending)` walks all leaves
//! in step; at each doc ref the hits are folded up the tree, deepest group
//! first, and the row is emitted when the root matches with positive weight.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use crate::core::error::Result;
use crate::core::types::{DocId, Row};
use crate::index::inverted::{PostingCursor, WordMatch};
use crate::query::ast::{NodeId, QueryNode, QueryTree, WordLeaf, ROOT};
use crate::query::parser::BooleanParser;
use crate::search::results::{FulltextResult, Hit, SearchContext, SearchState};
use crate::storage::cursor::{KeyCursor, RowReader};

/// Postings of one word leaf, by ascending doc ref
#[derive(Debug, Clone)]
struct LeafPostings {
    leaf: NodeId,
    depth: u32,
    required_at_top: bool,  // `+` word directly under the root
    postings: Vec<(DocId, f32)>,
    pos: usize,
}

impl LeafPostings {
    fn current(&self) -> Option<DocId> {
        self.postings.get(self.pos).map(|p| p.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    docid: DocId,
    depth: u32,
    slot: usize,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for a min-heap on doc ref; deeper leaves first
        other
            .docid
            .cmp(&self.docid)
            .then_with(|| self.depth.cmp(&other.depth))
            .then_with(|| other.slot.cmp(&self.slot))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GroupScore {
    acc: f64,
    yes: u32,
    no: u32,
    touched: bool,
}

/// Scratch state for scoring one document against a query tree
#[derive(Debug, Clone)]
struct Evaluator {
    groups: Vec<GroupScore>,
    touched: Vec<NodeId>,
    pending: BinaryHeap<(u32, NodeId)>,
}

impl Evaluator {
    fn new(tree: &QueryTree) -> Self {
        Evaluator {
            groups: vec![GroupScore::default(); tree.len()],
            touched: Vec::new(),
            pending: BinaryHeap::new(),
        }
    }

    /// Root weight of a document given its leaf hits `(leaf, stored weight)`,
    /// or `None` when the document does not match
    fn score(&mut self, tree: &QueryTree, hits: &[(NodeId, f32)]) -> Option<f64> {
        for id in self.touched.drain(..) {
            self.groups[id] = GroupScore::default();
        }
        self.pending.clear();

        for &(leaf, weight) in hits {
            if let Some(QueryNode::Word(w)) = tree.node(leaf) {
                self.credit(tree, w.parent, w.yesno, w.weight * weight as f64);
            }
        }

        // Groups pop deepest first, so a parent is judged after all its children
        let mut result = None;
        while let Some((_, id)) = self.pending.pop() {
            let Some(group) = tree.group(id) else {
                continue;
            };
            let s = self.groups[id];
            if s.yes < group.yes_threshold || s.no > 0 {
                continue;
            }
            // A nested group may pass a negative weight up; only the root needs a positive one
            match group.parent {
                Some(parent) => self.credit(tree, parent, group.yesno, s.acc * group.weight),
                None if s.acc > 0.0 => result = Some(s.acc),
                None => {}
            }
        }
        result
    }

    fn credit(&mut self, tree: &QueryTree, group: NodeId, yesno: i8, contribution: f64) {
        let Some(s) = self.groups.get_mut(group) else {
            return;
        };
        if !s.touched {
            s.touched = true;
            self.touched.push(group);
            let depth = tree.node(group).map_or(0, QueryNode::depth);
            self.pending.push((depth, group));
        }
        if yesno < 0 {
            s.no += 1;
        } else {
            s.acc += contribution;
            if yesno > 0 {
                s.yes += 1;
            }
        }
    }
}

pub struct BooleanSearch<S> {
    storage: S,
    ctx: SearchContext,
    tree: QueryTree,
    leaves: Vec<LeafPostings>,
    loaded: bool,
    queue: BinaryHeap<QueueEntry>,
    evaluator: Evaluator,
    state: SearchState,
    active: Option<(DocId, f32)>,
}

impl<S: KeyCursor + RowReader> BooleanSearch<S> {
    pub fn new(storage: S, ctx: SearchContext, query: &[u8]) -> Self {
        let tree = BooleanParser::new(&ctx.analyzer, ctx.def.collation).parse(query);
        let evaluator = Evaluator::new(&tree);
        BooleanSearch {
            storage,
            ctx,
            tree,
            leaves: Vec::new(),
            loaded: false,
            queue: BinaryHeap::new(),
            evaluator,
            state: SearchState::Ready,
            active: None,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn tree(&self) -> &QueryTree {
        &self.tree
    }

    /// Postings of one leaf below the watermark; for a prefix the best weight per row wins
    fn load_leaf(storage: &mut S, leaf: &WordLeaf) -> Result<Vec<(DocId, f32)>> {
        let watermark = storage.data_length_watermark();
        let matching = if leaf.trunc { WordMatch::Prefix } else { WordMatch::Exact };
        let mut cursor = PostingCursor::new(&leaf.word, matching);
        let mut docs: BTreeMap<DocId, f32> = BTreeMap::new();
        let mut skipped = 0usize;

        while let Some(posting) = cursor.next(storage)? {
            if posting.docid >= watermark {
                skipped += 1;
                continue;
            }
            let weight = docs.entry(posting.docid).or_insert(posting.weight);
            if posting.weight > *weight {
                *weight = posting.weight;
            }
        }
        if skipped > 0 {
            tracing::debug!(word = %String::from_utf8_lossy(&leaf.word), skipped, "postings past the watermark skipped");
        }
        Ok(docs.into_iter().collect())
    }

    /// Position every leaf on its first posting
    fn fill(&mut self) -> Result<()> {
        if !self.loaded {
            let mut leaves = Vec::new();
            for (id, leaf) in self.tree.leaves() {
                leaves.push(LeafPostings {
                    leaf: id,
                    depth: leaf.depth,
                    required_at_top: leaf.parent == ROOT && leaf.yesno > 0,
                    postings: Self::load_leaf(&mut self.storage, leaf)?,
                    pos: 0,
                });
            }
            tracing::debug!(
                key = %self.ctx.def.name,
                leaves = leaves.len(),
                postings = leaves.iter().map(|l| l.postings.len()).sum::<usize>(),
                "boolean search loaded"
            );
            self.leaves = leaves;
            self.loaded = true;
        }

        self.queue.clear();
        for leaf in &mut self.leaves {
            leaf.pos = 0;
        }
        if self.leaves.iter().any(|l| l.required_at_top && l.postings.is_empty()) {
            return Ok(());
        }
        for (slot, leaf) in self.leaves.iter().enumerate() {
            if let Some(docid) = leaf.current() {
                self.queue.push(QueueEntry { docid, depth: leaf.depth, slot });
            }
        }
        Ok(())
    }

    /// Next matching doc ref and its weight
    fn next_match(&mut self) -> Option<(DocId, f64)> {
        let mut hits = Vec::new();
        while let Some(&top) = self.queue.peek() {
            let docid = top.docid;
            let mut required_exhausted = false;
            hits.clear();

            while let Some(&entry) = self.queue.peek() {
                if entry.docid != docid {
                    break;
                }
                self.queue.pop();
                let leaf = &mut self.leaves[entry.slot];
                hits.push((leaf.leaf, leaf.postings[leaf.pos].1));
                leaf.pos += 1;
                match leaf.current() {
                    Some(next) => self.queue.push(QueueEntry { docid: next, depth: leaf.depth, slot: entry.slot }),
                    None => required_exhausted |= leaf.required_at_top,
                }
            }

            let score = self.evaluator.score(&self.tree, &hits);
            if required_exhausted {
                // No later row can satisfy the root
                self.queue.clear();
            }
            if let Some(score) = score {
                return Some((docid, score));
            }
        }
        None
    }

    fn advance(&mut self) -> Result<Option<Hit>> {
        if matches!(self.state, SearchState::Ready | SearchState::Scan) {
            self.fill()?;
            self.state = SearchState::IndexSearch;
        }
        while let Some((docid, score)) = self.next_match() {
            match self.storage.read_row(docid)? {
                Some(row) => {
                    let relevance = score as f32;
                    self.active = Some((docid, relevance));
                    return Ok(Some(Hit { docid, row, relevance }));
                }
                None => tracing::trace!(docid = docid.value(), "deleted row skipped"),
            }
        }
        self.state = SearchState::IndexDone;
        self.active = None;
        Ok(None)
    }
}

impl<S: KeyCursor + RowReader> FulltextResult for BooleanSearch<S> {
    fn read_next(&mut self) -> Result<Option<Hit>> {
        if matches!(self.state, SearchState::Uninit | SearchState::IndexDone) {
            return Ok(None);
        }
        let result = self.advance();
        if result.is_err() {
            self.state = SearchState::IndexDone;
            self.queue.clear();
            self.active = None;
        }
        result
    }

    /// Score a row without the index: its own words stand in for the postings
    fn find_relevance(&mut self, docid: DocId, row: &Row) -> Result<f32> {
        if let Some((active, relevance)) = self.active {
            if active == docid {
                return Ok(relevance);
            }
        }
        if self.state == SearchState::Uninit {
            return Ok(0.0);
        }
        if self.state == SearchState::Ready {
            self.state = SearchState::Scan;
        }

        let words: BTreeMap<Vec<u8>, f32> = self
            .ctx
            .parse_row(row)
            .into_iter()
            .map(|e| (e.word, e.weight))
            .collect();
        let hits: Vec<(NodeId, f32)> = self
            .tree
            .leaves()
            .filter_map(|(id, leaf)| {
                let weight = if leaf.trunc {
                    words
                        .range(leaf.word.clone()..)
                        .take_while(|(w, _)| w.starts_with(&leaf.word))
                        .map(|(_, &weight)| weight)
                        .reduce(f32::max)
                } else {
                    words.get(&leaf.word).copied()
                };
                weight.map(|w| (id, w))
            })
            .collect();
        Ok(self.evaluator.score(&self.tree, &hits).map_or(0.0, |s| s as f32))
    }

    fn get_relevance(&self) -> f32 {
        self.active.map_or(0.0, |(_, relevance)| relevance)
    }

    fn reinit_search(&mut self) -> Result<()> {
        if self.state != SearchState::Uninit {
            self.state = SearchState::Ready;
        }
        self.queue.clear();
        self.active = None;
        Ok(())
    }

    fn close(&mut self) {
        self.state = SearchState::Uninit;
        self.leaves = Vec::new();
        self.loaded = false;
        self.queue = BinaryHeap::new();
        self.active = None;
    }
}
