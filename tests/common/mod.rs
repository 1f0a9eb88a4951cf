#![allow(dead_code)]

use ftindex::core::config::Config;
use ftindex::core::engine::FulltextEngine;
use ftindex::core::types::{DocId, Row, SearchFlags, SearchMode};
use ftindex::schema::schema::FulltextKeyDef;
use ftindex::search::results::{FulltextResult, Hit};
use ftindex::storage::memory::MemoryTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const VOCABULARY: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel",
    "india", "juliet", "kilo", "lima", "Rust", "RUST", "rust", "with", "the",
    "and", "cat", "of", "engine", "engines", "search", "searching",
];

pub const STOPWORDS: &[&str] = &["the", "and", "with"];

pub fn engine(config: Config, stopwords: &[&str]) -> FulltextEngine {
    FulltextEngine::new(config, vec![FulltextKeyDef::new("body", vec![0])])
        .unwrap()
        .with_stopwords(stopwords)
        .unwrap()
}

/// Insert, index and publish one row per text
pub fn load(engine: &FulltextEngine, table: &MemoryTable, texts: &[&str]) -> Vec<DocId> {
    let mut cursor = table.cursor(0);
    texts
        .iter()
        .map(|text| {
            let row = Row::from_texts(&[*text]);
            let docid = table.insert_row(row.clone());
            engine.add_row(0, &mut cursor, &row, docid).unwrap();
            table.publish(docid);
            docid
        })
        .collect()
}

pub fn search(engine: &FulltextEngine, table: &MemoryTable, mode: SearchMode, query: &str, flags: SearchFlags) -> Vec<Hit> {
    let mut result = engine
        .init_search(table.cursor(0), 0, mode, query.as_bytes(), flags)
        .unwrap();
    let mut hits = Vec::new();
    while let Some(hit) = result.read_next().unwrap() {
        hits.push(hit);
    }
    result.close();
    hits
}

pub fn docids(hits: &[Hit]) -> Vec<u64> {
    hits.iter().map(|h| h.docid.value()).collect()
}

pub fn random_texts(seed: u64, docs: usize, max_words: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..docs)
        .map(|_| {
            let n = rng.gen_range(1..=max_words);
            (0..n)
                .map(|_| VOCABULARY[rng.gen_range(0..VOCABULARY.len())])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
