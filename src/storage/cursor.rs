//! Storage engine collaborator interface.
//!
//! The fulltext engine never touches pages, rows or locks directly. It sees
//! one fulltext key of one table through `KeyCursor` and fetches rows back
//! through `RowReader`. Every call may block on I/O; nothing else in the
//! engine does.

use crate::core::error::Result;
use crate::core::types::{DocId, Row, TreeRoot, DOC_REF_LEN};

/// Positioned cursor over the key trees of one fulltext key.
///
/// Primary tree keys are ordered by word first, then by the fixed 12-byte
/// tail (weight slot, doc ref). Secondary trees hold bare tails in byte order.
pub trait KeyCursor {
    /// Position at the first key whose word starts with `prefix`.
    /// In a secondary tree `prefix` is matched against the raw key.
    fn seek_prefix(&mut self, prefix: &[u8], root: TreeRoot) -> Result<bool>;

    /// Position exactly at `key`
    fn seek_exact(&mut self, key: &[u8], root: TreeRoot) -> Result<bool>;

    /// Position at the first key after `prev_key`, whatever its word
    fn seek_next(&mut self, prev_key: &[u8], root: TreeRoot) -> Result<bool>;

    /// Key at the current position; empty when unpositioned
    fn current_key(&self) -> &[u8];

    /// Doc ref carried in the trailing bytes of the current key
    fn current_docid(&self) -> Option<DocId> {
        let key = self.current_key();
        let start = key.len().checked_sub(DOC_REF_LEN)?;
        let mut bytes = [0u8; DOC_REF_LEN];
        bytes.copy_from_slice(&key[start..]);
        Some(DocId::from_key_bytes(bytes))
    }

    /// Insert a primary key; the storage engine may move it into a sub-index
    fn insert(&mut self, key: &[u8]) -> Result<()>;

    /// Erase a primary key wherever the storage engine keeps it
    fn erase(&mut self, key: &[u8]) -> Result<()>;

    /// Number of postings stored for exactly `word`
    fn document_count_for_word(&mut self, word: &[u8]) -> Result<u64>;

    /// Number of rows in the table
    fn total_documents(&self) -> u64;

    /// First doc ref not yet fully written; postings at or beyond it are ignored
    fn data_length_watermark(&self) -> DocId;
}

/// Row access by doc ref
pub trait RowReader {
    /// `None` when the row was deleted
    fn read_row(&mut self, docid: DocId) -> Result<Option<Row>>;
}

impl<T: KeyCursor + ?Sized> KeyCursor for &mut T {
    fn seek_prefix(&mut self, prefix: &[u8], root: TreeRoot) -> Result<bool> {
        (**self).seek_prefix(prefix, root)
    }

    fn seek_exact(&mut self, key: &[u8], root: TreeRoot) -> Result<bool> {
        (**self).seek_exact(key, root)
    }

    fn seek_next(&mut self, prev_key: &[u8], root: TreeRoot) -> Result<bool> {
        (**self).seek_next(prev_key, root)
    }

    fn current_key(&self) -> &[u8] {
        (**self).current_key()
    }

    fn insert(&mut self, key: &[u8]) -> Result<()> {
        (**self).insert(key)
    }

    fn erase(&mut self, key: &[u8]) -> Result<()> {
        (**self).erase(key)
    }

    fn document_count_for_word(&mut self, word: &[u8]) -> Result<u64> {
        (**self).document_count_for_word(word)
    }

    fn total_documents(&self) -> u64 {
        (**self).total_documents()
    }

    fn data_length_watermark(&self) -> DocId {
        (**self).data_length_watermark()
    }
}

impl<T: RowReader + ?Sized> RowReader for &mut T {
    fn read_row(&mut self, docid: DocId) -> Result<Option<Row>> {
        (**self).read_row(docid)
    }
}
