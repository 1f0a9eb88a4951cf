use std::cmp::Ordering;
use serde::{Serialize, Deserialize};
use crate::analysis::charset::Collation;
use crate::core::types::Row;

/// Definition of one fulltext key over a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulltextKeyDef {
    pub name: String,
    pub columns: Vec<usize>,      // Indexed column positions, in key order
    pub collation: Collation,
    pub column_max_len: Option<usize>,  // Bytes of a column value that are indexed
}

impl FulltextKeyDef {
    pub fn new(name: &str, columns: Vec<usize>) -> Self {
        FulltextKeyDef {
            name: name.to_string(),
            columns,
            collation: Collation::default(),
            column_max_len: None,
        }
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    pub fn with_column_max_len(mut self, len: usize) -> Self {
        self.column_max_len = Some(len);
        self
    }

    /// Indexed, non-null column values of `row`
    pub fn segments<'a>(&'a self, row: &'a Row) -> RecordSegments<'a> {
        RecordSegments {
            def: self,
            row,
            next: 0,
        }
    }

    /// Collation-aware comparison of the indexed columns of two rows
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for &column in &self.columns {
            let left = self.segment_of(a, column);
            let right = self.segment_of(b, column);
            let ord = match (left, right) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(l), Some(r)) => self.collation.compare(l, r),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn segment_of<'a>(&self, row: &'a Row, column: usize) -> Option<&'a [u8]> {
        let value = row.column(column)?;
        Some(match self.column_max_len {
            Some(max) if value.len() > max => &value[..max],
            _ => value,
        })
    }
}

/// Iterator over the indexed segments of one row
pub struct RecordSegments<'a> {
    def: &'a FulltextKeyDef,
    row: &'a Row,
    next: usize,
}

impl<'a> Iterator for RecordSegments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        while let Some(&column) = self.def.columns.get(self.next) {
            self.next += 1;
            if let Some(segment) = self.def.segment_of(self.row, column) {
                return Some(segment);
            }
        }
        None
    }
}
