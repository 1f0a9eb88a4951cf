//! Posting key codec.
//!
//! Primary tree key: `word ∥ weight slot (4, BE) ∥ doc ref (8, BE)`.
//! Secondary (sub-index) tree key: `weight slot (4, BE) ∥ doc ref (8, BE)`.
//!
//! The weight slot holds the bitwise complement of the order-preserving
//! encoding of a non-negative `f32`, so larger weights sort first and the high
//! bit is clear. A slot with the high bit set is a sub-index root: the low 31
//! bits carry the number of postings moved into the secondary tree (at least
//! one) and the doc ref holds that tree's root.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, TreeRoot, DOC_REF_LEN};

pub const WEIGHT_LEN: usize = 4;

/// Length of the fixed tail that follows the word in a primary key
pub const KEY_TAIL_LEN: usize = WEIGHT_LEN + DOC_REF_LEN;

/// Length of a secondary tree key
pub const SUBTREE_KEY_LEN: usize = KEY_TAIL_LEN;

const SUBTREE_TAG: u32 = 0x8000_0000;

/// Decoded weight slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightSlot {
    Weight(f32),
    SubTree { doc_count: u32 },
}

impl WeightSlot {
    pub fn to_raw(self) -> u32 {
        match self {
            WeightSlot::Weight(w) => {
                let w = if w.is_finite() && w > 0.0 { w } else { 0.0 };
                !(w.to_bits() | SUBTREE_TAG)
            }
            WeightSlot::SubTree { doc_count } => SUBTREE_TAG | doc_count.clamp(1, !SUBTREE_TAG),
        }
    }

    pub fn from_raw(raw: u32) -> Result<Self> {
        // Read as signed with the tag bit flipped back: positive means sub-index root
        let tagged = (raw ^ SUBTREE_TAG) as i32;
        if tagged > 0 {
            Ok(WeightSlot::SubTree { doc_count: tagged as u32 })
        } else if raw & SUBTREE_TAG != 0 {
            Err(Error::corrupt("sub-index root with an empty secondary tree"))
        } else {
            Ok(WeightSlot::Weight(f32::from_bits(!raw & !SUBTREE_TAG)))
        }
    }
}

/// What a primary tree key points at
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyEntry {
    Posting { docid: DocId, weight: f32 },
    SubTreeRoot { root: TreeRoot, doc_count: u32 },
}

/// A primary tree key split into its parts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedKey<'a> {
    pub word: &'a [u8],
    pub entry: KeyEntry,
}

/// One `(word, docid, weight)` tuple
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub word: Vec<u8>,
    pub docid: DocId,
    pub weight: f32,
}

fn encode(word: &[u8], slot: WeightSlot, doc_ref: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(word.len() + KEY_TAIL_LEN);
    buf.put_slice(word);
    buf.put_u32(slot.to_raw());
    buf.put_u64(doc_ref);
    buf.freeze()
}

pub fn encode_posting_key(word: &[u8], docid: DocId, weight: f32) -> Bytes {
    encode(word, WeightSlot::Weight(weight), docid.value())
}

pub fn encode_subtree_root_key(word: &[u8], root: TreeRoot, doc_count: u32) -> Bytes {
    encode(word, WeightSlot::SubTree { doc_count }, root.0)
}

pub fn encode_subtree_key(docid: DocId, weight: f32) -> Bytes {
    encode(&[], WeightSlot::Weight(weight), docid.value())
}

/// Split a fixed tail into its slot and doc ref
fn decode_tail(mut tail: &[u8]) -> Result<(WeightSlot, u64)> {
    let slot = WeightSlot::from_raw(tail.get_u32())?;
    Ok((slot, tail.get_u64()))
}

pub fn decode_posting_key(key: &[u8]) -> Result<DecodedKey<'_>> {
    if key.len() <= KEY_TAIL_LEN {
        return Err(Error::corrupt(format!("posting key of {} bytes has no word", key.len())));
    }
    let (word, tail) = key.split_at(key.len() - KEY_TAIL_LEN);
    let entry = match decode_tail(tail)? {
        (WeightSlot::Weight(weight), doc_ref) => KeyEntry::Posting {
            docid: DocId(doc_ref),
            weight,
        },
        (WeightSlot::SubTree { doc_count }, doc_ref) => KeyEntry::SubTreeRoot {
            root: TreeRoot(doc_ref),
            doc_count,
        },
    };
    Ok(DecodedKey { word, entry })
}

pub fn decode_subtree_key(key: &[u8]) -> Result<(DocId, f32)> {
    if key.len() != SUBTREE_KEY_LEN {
        return Err(Error::corrupt(format!("secondary key of {} bytes", key.len())));
    }
    match decode_tail(key)? {
        (WeightSlot::Weight(weight), doc_ref) => Ok((DocId(doc_ref), weight)),
        (WeightSlot::SubTree { .. }, _) => Err(Error::corrupt("nested sub-index root")),
    }
}

/// Word part of a primary key, if it is long enough to have one
pub fn key_word(key: &[u8]) -> Option<&[u8]> {
    key.len().checked_sub(KEY_TAIL_LEN).filter(|&n| n > 0).map(|n| &key[..n])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn key_layout_is_bit_exact() {
        let key = encode_posting_key(b"word", DocId(0x0102), 1.0);
        assert_eq!(&key[..4], b"word");
        let expected_slot = !(1.0f32.to_bits() | 0x8000_0000);
        assert_eq!(&key[4..8], &expected_slot.to_be_bytes());
        assert_eq!(&key[8..], &[0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn heavier_postings_sort_first() {
        let light = encode_posting_key(b"word", DocId(1), 0.25);
        let heavy = encode_posting_key(b"word", DocId(9), 2.5);
        assert!(heavy < light);

        let a = encode_posting_key(b"word", DocId(1), 0.5);
        let b = encode_posting_key(b"word", DocId(2), 0.5);
        assert!(a < b);
    }

    #[test]
    fn zero_weight_stays_below_tag() {
        let raw = WeightSlot::Weight(0.0).to_raw();
        assert_eq!(raw, 0x7FFF_FFFF);
        assert_eq!(WeightSlot::from_raw(raw).unwrap(), WeightSlot::Weight(0.0));
        // Negative and NaN weights are stored as zero so they never look like a root
        assert_eq!(WeightSlot::Weight(-3.0).to_raw(), raw);
        assert_eq!(WeightSlot::Weight(f32::NAN).to_raw(), raw);
    }

    #[test]
    fn subtree_roots_decode_as_roots() {
        let key = encode_subtree_root_key(b"common", TreeRoot(42), 300);
        let decoded = decode_posting_key(&key).unwrap();
        assert_eq!(decoded.word, b"common");
        assert_eq!(decoded.entry, KeyEntry::SubTreeRoot { root: TreeRoot(42), doc_count: 300 });

        // Roots sort after every real posting of the same word
        let posting = encode_posting_key(b"common", DocId(u64::MAX), 0.0);
        assert!(posting < key);
    }

    #[test]
    fn tag_without_count_is_corrupt() {
        let err = WeightSlot::from_raw(0x8000_0000).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexCorrupt);
    }

    #[test]
    fn secondary_keys_drop_the_word() {
        let key = encode_subtree_key(DocId(5), 0.75);
        assert_eq!(key.len(), SUBTREE_KEY_LEN);
        assert_eq!(decode_subtree_key(&key).unwrap(), (DocId(5), 0.75));
        assert!(decode_subtree_key(&key[1..]).is_err());
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(decode_posting_key(&[0u8; KEY_TAIL_LEN]).is_err());
        assert_eq!(key_word(&encode_posting_key(b"abc", DocId(1), 1.0)), Some(&b"abc"[..]));
        assert_eq!(key_word(&[0u8; 3]), None);
    }
}
