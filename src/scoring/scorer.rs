//! Per-document and query-time weighting.
//!
//! A posting stores `w = pw / (1 + pivot * U)` where `pw = lw / S * U`,
//! `lw = ln(c) + 1`, `S` the sum of `lw` over the document and `U` its number
//! of unique words. At query time each word is scaled by a global weight
//! derived from how many documents contain it.

/// Weight of a word occurring `count` times in one document
pub fn local_weight(count: u32) -> f64 {
    (count.max(1) as f64).ln() + 1.0
}

/// Seed weight of a query word: its raw count in the query
pub fn query_weight(count: u32) -> f64 {
    count as f64
}

/// Probabilistic IDF, `ln((N - d) / d)`.
/// Zero when it would be non-positive or when the word is in more than
/// `frequent_limit` documents.
pub fn global_weight(total_docs: u64, doc_count: u64, frequent_limit: u64) -> f64 {
    if doc_count == 0 || doc_count > frequent_limit || total_docs <= doc_count {
        return 0.0;
    }
    let gw = ((total_docs - doc_count) as f64 / doc_count as f64).ln();
    if gw > 0.0 { gw } else { 0.0 }
}

/// Turns word counts of one document into stored weights
#[derive(Debug, Clone, Copy)]
pub struct DocumentScorer {
    pub pivot: f64,
}

impl DocumentScorer {
    pub fn new(pivot: f64) -> Self {
        DocumentScorer { pivot }
    }

    /// Normalized weights, in the order of `counts`
    pub fn normalize(&self, counts: &[u32]) -> Vec<f32> {
        if counts.is_empty() {
            return Vec::new();
        }
        let local: Vec<f64> = counts.iter().map(|&c| local_weight(c)).collect();
        let sum: f64 = local.iter().sum();
        let uniq = counts.len() as f64;
        let norm = 1.0 + self.pivot * uniq;

        local
            .iter()
            .map(|lw| {
                let prenormalized = lw / sum * uniq;
                (prenormalized / norm) as f32
            })
            .collect()
    }
}

/// Stored weights compare by bit pattern: a posting is rewritten only when
/// the value that would land in the key actually changes.
pub fn weights_differ(a: f32, b: f32) -> bool {
    a.to_bits() != b.to_bits()
}

/// Node weight of a boolean query term.
/// `1.5^plusminus`, or `-0.5 * 1.5^plusminus` after a negating sign.
pub fn boolean_weight(plusminus: i8, pmsign: bool) -> f64 {
    let magnitude = 1.5f64.powi(plusminus.clamp(-5, 5) as i32);
    if pmsign { -0.5 * magnitude } else { magnitude }
}
