use serde::{Serialize, Deserialize};

/// Width in bytes of the row back-reference stored in every posting key
pub const DOC_REF_LEN: usize = 8;

/// Opaque row reference handed out by the storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn to_key_bytes(self) -> [u8; DOC_REF_LEN] {
        self.0.to_be_bytes()
    }

    pub fn from_key_bytes(bytes: [u8; DOC_REF_LEN]) -> Self {
        DocId(u64::from_be_bytes(bytes))
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        DocId(id)
    }
}

/// Root of a key tree inside the storage engine.
/// The primary tree of a fulltext key is `TreeRoot::PRIMARY`; any other value
/// names a secondary (sub-index) tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeRoot(pub u64);

impl TreeRoot {
    pub const PRIMARY: TreeRoot = TreeRoot(0);

    pub fn is_primary(&self) -> bool {
        *self == TreeRoot::PRIMARY
    }
}

/// A table row as the storage engine hands it over: one optional byte value
/// per column, `None` meaning SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Row {
    pub columns: Vec<Option<Vec<u8>>>,
}

impl Row {
    pub fn new(columns: Vec<Option<Vec<u8>>>) -> Self {
        Row { columns }
    }

    /// Build a row of non-null text columns
    pub fn from_texts(texts: &[&str]) -> Self {
        Row {
            columns: texts.iter().map(|t| Some(t.as_bytes().to_vec())).collect(),
        }
    }

    pub fn column(&self, index: usize) -> Option<&[u8]> {
        self.columns.get(index).and_then(|c| c.as_deref())
    }
}

/// Query evaluation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    Natural,
    Boolean,
}

/// Search flags (natural-language mode only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchFlags {
    pub sorted: bool,  // Emit by descending relevance
    pub expand: bool,  // One round of pseudo-relevance feedback
}

impl SearchFlags {
    pub const NONE: SearchFlags = SearchFlags { sorted: false, expand: false };
    pub const SORTED: SearchFlags = SearchFlags { sorted: true, expand: false };
    pub const EXPAND: SearchFlags = SearchFlags { sorted: false, expand: true };

    pub fn with_sorted(mut self) -> Self {
        self.sorted = true;
        self
    }

    pub fn with_expand(mut self) -> Self {
        self.expand = true;
        self
    }
}
