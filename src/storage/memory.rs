use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Row, TreeRoot};
use crate::index::posting::{decode_posting_key, encode_subtree_root_key, key_word, KeyEntry, KEY_TAIL_LEN};
use crate::storage::cursor::{KeyCursor, RowReader};

/// Words with more postings than this move into a secondary tree
pub const DEFAULT_SUBTREE_THRESHOLD: usize = 256;

type Tail = [u8; KEY_TAIL_LEN];

/// Primary tree entry: ordered by whole word first, then by tail bytes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PrimaryKey {
    word: Vec<u8>,
    tail: Tail,
}

impl PrimaryKey {
    fn parse(key: &[u8]) -> Result<Self> {
        let word = key_word(key)
            .ok_or_else(|| Error::cursor(format!("malformed key of {} bytes", key.len())))?;
        let mut tail = [0u8; KEY_TAIL_LEN];
        tail.copy_from_slice(&key[word.len()..]);
        Ok(PrimaryKey { word: word.to_vec(), tail })
    }

    fn lowest(word: &[u8]) -> Self {
        PrimaryKey { word: word.to_vec(), tail: [0u8; KEY_TAIL_LEN] }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.word.len() + KEY_TAIL_LEN);
        key.extend_from_slice(&self.word);
        key.extend_from_slice(&self.tail);
        key
    }
}

fn parse_tail(key: &[u8]) -> Result<Tail> {
    key.try_into()
        .map_err(|_| Error::cursor(format!("secondary key of {} bytes", key.len())))
}

fn root_tail(root: TreeRoot, doc_count: usize) -> Tail {
    let key = encode_subtree_root_key(&[], root, doc_count.min(u32::MAX as usize) as u32);
    let mut tail = [0u8; KEY_TAIL_LEN];
    tail.copy_from_slice(&key);
    tail
}

/// Key trees of one fulltext key
#[derive(Debug, Default)]
struct KeyTrees {
    primary: BTreeSet<PrimaryKey>,
    secondary: HashMap<TreeRoot, BTreeSet<Tail>>,
    roots: HashMap<Vec<u8>, TreeRoot>,    // Word -> its secondary tree
    primary_counts: HashMap<Vec<u8>, usize>,
}

impl KeyTrees {
    fn primary_range(&self, from: &PrimaryKey, inclusive: bool) -> Option<&PrimaryKey> {
        let lower = if inclusive { Included(from) } else { Excluded(from) };
        self.primary.range((lower, Unbounded)).next()
    }

    fn secondary_range(&self, root: TreeRoot, from: &[u8], inclusive: bool) -> Option<Tail> {
        let tree = self.secondary.get(&root)?;
        let mut start = [0u8; KEY_TAIL_LEN];
        let n = from.len().min(KEY_TAIL_LEN);
        start[..n].copy_from_slice(&from[..n]);
        let lower = if inclusive { Included(start) } else { Excluded(start) };
        tree.range((lower, Unbounded)).next().copied()
    }

    fn promote(&mut self, word: &[u8], root: TreeRoot) {
        let moved: Vec<PrimaryKey> = self
            .primary
            .range(PrimaryKey::lowest(word)..)
            .take_while(|k| k.word == word)
            .cloned()
            .collect();
        let mut tree = BTreeSet::new();
        for key in &moved {
            self.primary.remove(key);
            tree.insert(key.tail);
        }
        let count = tree.len();
        self.primary.insert(PrimaryKey { word: word.to_vec(), tail: root_tail(root, count) });
        self.secondary.insert(root, tree);
        self.roots.insert(word.to_vec(), root);
        self.primary_counts.remove(word);
        tracing::debug!(word = %String::from_utf8_lossy(word), postings = count, root = root.0, "word moved to sub-index");
    }

    /// Rewrite the root key of `word` after its secondary tree changed size
    fn refresh_root(&mut self, word: &[u8], root: TreeRoot, old_count: usize) {
        self.primary.remove(&PrimaryKey { word: word.to_vec(), tail: root_tail(root, old_count) });
        let new_count = self.secondary.get(&root).map_or(0, |t| t.len());
        if new_count == 0 {
            self.secondary.remove(&root);
            self.roots.remove(word);
        } else {
            self.primary.insert(PrimaryKey { word: word.to_vec(), tail: root_tail(root, new_count) });
        }
    }
}

#[derive(Debug)]
struct TableInner {
    rows: BTreeMap<DocId, Row>,
    next_docid: u64,
    keys: Vec<KeyTrees>,
    subtree_threshold: usize,
    next_root: u64,
    fail_after: Option<u64>,  // Writes left before injected failures
}

impl TableInner {
    fn trees(&self, key: usize) -> Result<&KeyTrees> {
        self.keys
            .get(key)
            .ok_or_else(|| Error::cursor(format!("table has no fulltext key {}", key)))
    }

    fn trees_mut(&mut self, key: usize) -> Result<&mut KeyTrees> {
        self.keys
            .get_mut(key)
            .ok_or_else(|| Error::cursor(format!("table has no fulltext key {}", key)))
    }

    fn check_fault(&mut self) -> Result<()> {
        match self.fail_after {
            Some(0) => Err(Error::cursor("injected write failure")),
            Some(n) => {
                self.fail_after = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Insert/erase calls seen by the key cursors of a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStats {
    pub inserts: u64,
    pub erases: u64,
}

impl WriteStats {
    pub fn total(&self) -> u64 {
        self.inserts + self.erases
    }
}

#[derive(Debug, Default)]
struct WriteCounters {
    inserts: AtomicU64,
    erases: AtomicU64,
}

/// In-memory storage engine: a row store plus key trees for its fulltext keys.
///
/// Cloning yields another handle to the same table.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    inner: Arc<RwLock<TableInner>>,
    watermark: Arc<AtomicU64>,
    counters: Arc<WriteCounters>,
}

impl MemoryTable {
    pub fn new(fulltext_keys: usize) -> Self {
        Self::with_subtree_threshold(fulltext_keys, DEFAULT_SUBTREE_THRESHOLD)
    }

    pub fn with_subtree_threshold(fulltext_keys: usize, threshold: usize) -> Self {
        MemoryTable {
            inner: Arc::new(RwLock::new(TableInner {
                rows: BTreeMap::new(),
                next_docid: 1,
                keys: (0..fulltext_keys).map(|_| KeyTrees::default()).collect(),
                subtree_threshold: threshold.max(1),
                next_root: 1,
                fail_after: None,
            })),
            watermark: Arc::new(AtomicU64::new(1)),
            counters: Arc::new(WriteCounters::default()),
        }
    }

    /// Cursor bound to one fulltext key
    pub fn cursor(&self, key: usize) -> MemoryCursor {
        MemoryCursor {
            table: self.clone(),
            key,
            current: None,
        }
    }

    /// Store a row under a fresh doc ref. It stays invisible to searches until published.
    pub fn insert_row(&self, row: Row) -> DocId {
        let mut inner = self.inner.write();
        let docid = DocId(inner.next_docid);
        inner.next_docid += 1;
        inner.rows.insert(docid, row);
        docid
    }

    /// Advance the watermark past `docid`
    pub fn publish(&self, docid: DocId) {
        self.watermark.fetch_max(docid.value() + 1, Ordering::Release);
    }

    pub fn replace_row(&self, docid: DocId, row: Row) -> Option<Row> {
        self.inner.write().rows.insert(docid, row)
    }

    pub fn delete_row(&self, docid: DocId) -> Option<Row> {
        self.inner.write().rows.remove(&docid)
    }

    pub fn row(&self, docid: DocId) -> Option<Row> {
        self.inner.read().rows.get(&docid).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.inner.read().rows.len()
    }

    /// All primary keys of a fulltext key, in key order
    pub fn primary_keys(&self, key: usize) -> Vec<Vec<u8>> {
        let inner = self.inner.read();
        inner
            .keys
            .get(key)
            .map(|t| t.primary.iter().map(PrimaryKey::to_bytes).collect())
            .unwrap_or_default()
    }

    /// Logical postings `(word, docid, weight bits)` of a fulltext key,
    /// with sub-indexes expanded, in key order
    pub fn postings(&self, key: usize) -> Vec<(Vec<u8>, DocId, u32)> {
        let inner = self.inner.read();
        let Some(trees) = inner.keys.get(key) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for pk in &trees.primary {
            let full = pk.to_bytes();
            match decode_posting_key(&full) {
                Ok(decoded) => match decoded.entry {
                    KeyEntry::Posting { docid, weight } => out.push((pk.word.clone(), docid, weight.to_bits())),
                    KeyEntry::SubTreeRoot { root, .. } => {
                        for tail in trees.secondary.get(&root).into_iter().flatten() {
                            let mut entry = pk.word.clone();
                            entry.extend_from_slice(tail);
                            if let Ok(d) = decode_posting_key(&entry) {
                                if let KeyEntry::Posting { docid, weight } = d.entry {
                                    out.push((pk.word.clone(), docid, weight.to_bits()));
                                }
                            }
                        }
                    }
                },
                Err(_) => continue,
            }
        }
        out
    }

    /// Number of words of a fulltext key currently kept in a sub-index
    pub fn subtree_count(&self, key: usize) -> usize {
        self.inner.read().keys.get(key).map_or(0, |t| t.roots.len())
    }

    pub fn write_stats(&self) -> WriteStats {
        WriteStats {
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            erases: self.counters.erases.load(Ordering::Relaxed),
        }
    }

    pub fn reset_write_stats(&self) {
        self.counters.inserts.store(0, Ordering::Relaxed);
        self.counters.erases.store(0, Ordering::Relaxed);
    }

    /// Let `n` more key writes succeed, then fail every one after
    pub fn fail_writes_after(&self, n: u64) {
        self.inner.write().fail_after = Some(n);
    }

    pub fn clear_faults(&self) {
        self.inner.write().fail_after = None;
    }

    /// Overwrite the stored tail of a primary key, bypassing all checks.
    /// Lets tests fabricate damaged indexes.
    pub fn corrupt_primary_key(&self, key: usize, old: &[u8], new: &[u8]) -> Result<()> {
        let old = PrimaryKey::parse(old)?;
        let new = PrimaryKey::parse(new)?;
        let mut inner = self.inner.write();
        let trees = inner.trees_mut(key)?;
        if !trees.primary.remove(&old) {
            return Err(Error::new(ErrorKind::KeyNotFound, "no such primary key".to_string()));
        }
        trees.primary.insert(new);
        Ok(())
    }
}

/// `KeyCursor` + `RowReader` over one fulltext key of a `MemoryTable`
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    table: MemoryTable,
    key: usize,
    current: Option<Vec<u8>>,
}

impl MemoryCursor {
    pub fn table(&self) -> &MemoryTable {
        &self.table
    }

    fn position(&mut self, found: Option<Vec<u8>>) -> bool {
        let hit = found.is_some();
        self.current = found;
        hit
    }
}

impl KeyCursor for MemoryCursor {
    fn seek_prefix(&mut self, prefix: &[u8], root: TreeRoot) -> Result<bool> {
        let found = {
            let inner = self.table.inner.read();
            let trees = inner.trees(self.key)?;
            if root.is_primary() {
                trees
                    .primary_range(&PrimaryKey::lowest(prefix), true)
                    .filter(|k| k.word.starts_with(prefix))
                    .map(PrimaryKey::to_bytes)
            } else {
                trees
                    .secondary_range(root, prefix, true)
                    .filter(|t| t.starts_with(prefix))
                    .map(|t| t.to_vec())
            }
        };
        Ok(self.position(found))
    }

    fn seek_exact(&mut self, key: &[u8], root: TreeRoot) -> Result<bool> {
        let found = {
            let inner = self.table.inner.read();
            let trees = inner.trees(self.key)?;
            if root.is_primary() {
                let pk = PrimaryKey::parse(key)?;
                trees.primary.contains(&pk).then(|| pk.to_bytes())
            } else {
                let tail = parse_tail(key)?;
                trees
                    .secondary
                    .get(&root)
                    .filter(|t| t.contains(&tail))
                    .map(|_| tail.to_vec())
            }
        };
        Ok(self.position(found))
    }

    fn seek_next(&mut self, prev_key: &[u8], root: TreeRoot) -> Result<bool> {
        let found = {
            let inner = self.table.inner.read();
            let trees = inner.trees(self.key)?;
            if root.is_primary() {
                let pk = PrimaryKey::parse(prev_key)?;
                trees.primary_range(&pk, false).map(PrimaryKey::to_bytes)
            } else {
                let tail = parse_tail(prev_key)?;
                trees.secondary_range(root, &tail, false).map(|t| t.to_vec())
            }
        };
        Ok(self.position(found))
    }

    fn current_key(&self) -> &[u8] {
        self.current.as_deref().unwrap_or(&[])
    }

    fn insert(&mut self, key: &[u8]) -> Result<()> {
        let pk = PrimaryKey::parse(key)?;
        if matches!(decode_posting_key(key)?.entry, KeyEntry::SubTreeRoot { .. }) {
            return Err(Error::cursor("sub-index roots are maintained by the storage engine"));
        }

        let mut inner = self.table.inner.write();
        inner.check_fault()?;
        let threshold = inner.subtree_threshold;
        let next_root = TreeRoot(inner.next_root);
        let trees = inner.trees_mut(self.key)?;

        let mut promoted = false;
        if let Some(&root) = trees.roots.get(&pk.word) {
            let old_count = trees.secondary.get(&root).map_or(0, |t| t.len());
            let tree = trees.secondary.entry(root).or_default();
            if !tree.insert(pk.tail) {
                return Err(Error::cursor("duplicate key"));
            }
            trees.refresh_root(&pk.word, root, old_count);
        } else {
            if !trees.primary.insert(pk.clone()) {
                return Err(Error::cursor("duplicate key"));
            }
            let count = trees.primary_counts.entry(pk.word.clone()).or_insert(0);
            *count += 1;
            if *count > threshold {
                trees.promote(&pk.word, next_root);
                promoted = true;
            }
        }
        if promoted {
            inner.next_root += 1;
        }
        self.table.counters.inserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn erase(&mut self, key: &[u8]) -> Result<()> {
        let pk = PrimaryKey::parse(key)?;
        let mut inner = self.table.inner.write();
        inner.check_fault()?;
        let trees = inner.trees_mut(self.key)?;

        if let Some(&root) = trees.roots.get(&pk.word) {
            let old_count = trees.secondary.get(&root).map_or(0, |t| t.len());
            let removed = trees.secondary.get_mut(&root).is_some_and(|t| t.remove(&pk.tail));
            if !removed {
                return Err(Error::new(ErrorKind::KeyNotFound, "posting not in sub-index".to_string()));
            }
            trees.refresh_root(&pk.word, root, old_count);
        } else {
            if !trees.primary.remove(&pk) {
                return Err(Error::new(ErrorKind::KeyNotFound, "posting not in index".to_string()));
            }
            if let Some(count) = trees.primary_counts.get_mut(&pk.word) {
                *count -= 1;
                if *count == 0 {
                    trees.primary_counts.remove(&pk.word);
                }
            }
        }
        self.table.counters.erases.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn document_count_for_word(&mut self, word: &[u8]) -> Result<u64> {
        let inner = self.table.inner.read();
        let trees = inner.trees(self.key)?;
        let count = match trees.roots.get(word) {
            Some(root) => trees.secondary.get(root).map_or(0, |t| t.len()),
            None => trees.primary_counts.get(word).copied().unwrap_or(0),
        };
        Ok(count as u64)
    }

    fn total_documents(&self) -> u64 {
        self.table.inner.read().rows.len() as u64
    }

    fn data_length_watermark(&self) -> DocId {
        DocId(self.table.watermark.load(Ordering::Acquire))
    }
}

impl RowReader for MemoryCursor {
    fn read_row(&mut self, docid: DocId) -> Result<Option<Row>> {
        Ok(self.table.row(docid))
    }
}
