use crate::core::error::{Error, Result};
use crate::core::types::{DocId, TreeRoot};
use crate::index::posting::{
    decode_posting_key, decode_subtree_key, encode_posting_key, key_word, KeyEntry, Posting,
};
use crate::storage::cursor::KeyCursor;

/// Write one posting through the key cursor
pub fn insert_posting<C: KeyCursor + ?Sized>(cursor: &mut C, word: &[u8], docid: DocId, weight: f32) -> Result<()> {
    cursor.insert(&encode_posting_key(word, docid, weight))
}

/// Remove one posting through the key cursor
pub fn erase_posting<C: KeyCursor + ?Sized>(cursor: &mut C, word: &[u8], docid: DocId, weight: f32) -> Result<()> {
    cursor.erase(&encode_posting_key(word, docid, weight))
}

/// Whether the exact posting is stored in the primary tree
pub fn contains_posting<C: KeyCursor + ?Sized>(cursor: &mut C, word: &[u8], docid: DocId, weight: f32) -> Result<bool> {
    cursor.seek_exact(&encode_posting_key(word, docid, weight), TreeRoot::PRIMARY)
}

/// Which posting words a cursor accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordMatch {
    Exact,
    Prefix,  // Truncated query word
}

#[derive(Debug, Clone)]
enum CursorState {
    Unpositioned,
    Primary { key: Vec<u8> },
    Secondary { primary_key: Vec<u8>, word: Vec<u8>, root: TreeRoot, key: Vec<u8> },
    Done,
}

/// Logical cursor over the postings of one word (or word prefix).
///
/// Sub-index roots are followed transparently: the postings of the
/// secondary tree are returned in place of the root key. The cursor keeps
/// only its last key, so any number of them can share one `KeyCursor`.
#[derive(Debug, Clone)]
pub struct PostingCursor {
    word: Vec<u8>,
    matching: WordMatch,
    state: CursorState,
}

impl PostingCursor {
    pub fn new(word: &[u8], matching: WordMatch) -> Self {
        PostingCursor {
            word: word.to_vec(),
            matching,
            state: CursorState::Unpositioned,
        }
    }

    pub fn word(&self) -> &[u8] {
        &self.word
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, CursorState::Done)
    }

    /// Start over from the first posting
    pub fn rewind(&mut self) {
        self.state = CursorState::Unpositioned;
    }

    /// Next posting, or `None` at the end of the word.
    /// Any error leaves the cursor done.
    pub fn next<C: KeyCursor + ?Sized>(&mut self, cursor: &mut C) -> Result<Option<Posting>> {
        let result = self.advance(cursor);
        if let Err(err) = &result {
            if err.is_corrupt() {
                tracing::warn!(word = %String::from_utf8_lossy(&self.word), error = %err, "corrupt fulltext index");
            }
            self.state = CursorState::Done;
        }
        result
    }

    fn accepts(&self, word: &[u8]) -> bool {
        match self.matching {
            WordMatch::Exact => word == self.word.as_slice(),
            WordMatch::Prefix => word.starts_with(&self.word),
        }
    }

    fn advance<C: KeyCursor + ?Sized>(&mut self, cursor: &mut C) -> Result<Option<Posting>> {
        loop {
            match std::mem::replace(&mut self.state, CursorState::Done) {
                CursorState::Done => return Ok(None),
                CursorState::Unpositioned => {
                    if !cursor.seek_prefix(&self.word, TreeRoot::PRIMARY)? {
                        return Ok(None);
                    }
                    let key = cursor.current_key().to_vec();
                    match key_word(&key) {
                        Some(word) if word.starts_with(&self.word) => {}
                        _ => return Err(Error::corrupt("prefix seek returned a key of another word")),
                    }
                    return self.enter_primary(cursor, key);
                }
                CursorState::Primary { key } => {
                    if !cursor.seek_next(&key, TreeRoot::PRIMARY)? {
                        return Ok(None);
                    }
                    let key = cursor.current_key().to_vec();
                    return self.enter_primary(cursor, key);
                }
                CursorState::Secondary { primary_key, word, root, key } => {
                    if !cursor.seek_next(&key, root)? {
                        self.state = CursorState::Primary { key: primary_key };
                        continue;
                    }
                    let key = cursor.current_key().to_vec();
                    let (docid, weight) = decode_subtree_key(&key)?;
                    let posting = Posting { word: word.clone(), docid, weight };
                    self.state = CursorState::Secondary { primary_key, word, root, key };
                    return Ok(Some(posting));
                }
            }
        }
    }

    /// Handle a primary key the cursor just landed on
    fn enter_primary<C: KeyCursor + ?Sized>(&mut self, cursor: &mut C, key: Vec<u8>) -> Result<Option<Posting>> {
        let decoded = decode_posting_key(&key)?;
        if !self.accepts(decoded.word) {
            return Ok(None);
        }
        match decoded.entry {
            KeyEntry::Posting { docid, weight } => {
                let posting = Posting { word: decoded.word.to_vec(), docid, weight };
                self.state = CursorState::Primary { key };
                Ok(Some(posting))
            }
            KeyEntry::SubTreeRoot { root, .. } => {
                if !cursor.seek_prefix(&[], root)? {
                    return Err(Error::corrupt(format!("sub-index root {} has no body", root.0)));
                }
                let sub_key = cursor.current_key().to_vec();
                let (docid, weight) = decode_subtree_key(&sub_key)?;
                let word = decoded.word.to_vec();
                let posting = Posting { word: word.clone(), docid, weight };
                self.state = CursorState::Secondary { primary_key: key, word, root, key: sub_key };
                Ok(Some(posting))
            }
        }
    }
}
