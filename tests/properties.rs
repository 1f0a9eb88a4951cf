mod common;

use std::collections::{BTreeMap, BTreeSet};
use common::{docids, engine, load, random_texts, search, STOPWORDS};
use ftindex::core::config::Config;
use ftindex::core::error::ErrorKind;
use ftindex::core::types::{DocId, Row, SearchFlags, SearchMode, TreeRoot};
use ftindex::index::inverted::{PostingCursor, WordMatch};
use ftindex::index::posting::{encode_posting_key, encode_subtree_root_key};
use ftindex::search::results::FulltextResult;
use ftindex::storage::cursor::KeyCursor;
use ftindex::storage::memory::MemoryTable;

fn expected_words(text: &str, min_len: usize) -> BTreeSet<Vec<u8>> {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= min_len && !STOPWORDS.contains(&w.as_str()))
        .map(String::into_bytes)
        .collect()
}

fn as_refs(texts: &[String]) -> Vec<&str> {
    texts.iter().map(String::as_str).collect()
}

#[test]
fn postings_mirror_document_words() {
    let engine = engine(Config::default(), STOPWORDS);
    let table = MemoryTable::new(1);
    let texts = random_texts(7, 60, 12);
    let ids = load(&engine, &table, &as_refs(&texts));

    let mut by_doc: BTreeMap<DocId, BTreeSet<Vec<u8>>> = BTreeMap::new();
    for (word, docid, _) in table.postings(0) {
        assert!(by_doc.entry(docid).or_default().insert(word), "one posting per distinct word");
    }
    for (docid, text) in ids.iter().zip(&texts) {
        let expected = expected_words(text, 4);
        assert_eq!(by_doc.remove(docid).unwrap_or_default(), expected, "doc {:?}: {}", docid, text);
    }
    assert!(by_doc.is_empty());
}

#[test]
fn postings_scan_heaviest_first() {
    let engine = engine(Config::default(), STOPWORDS);
    let table = MemoryTable::with_subtree_threshold(1, 5);
    let texts = random_texts(11, 80, 10);
    load(&engine, &table, &as_refs(&texts));
    assert!(table.subtree_count(0) > 0);

    let words: BTreeSet<Vec<u8>> = table.postings(0).into_iter().map(|p| p.0).collect();
    let mut cursor = table.cursor(0);
    for word in words {
        let mut postings = PostingCursor::new(&word, WordMatch::Exact);
        let mut previous: Option<(f32, DocId)> = None;
        while let Some(p) = postings.next(&mut cursor).unwrap() {
            if let Some((weight, docid)) = previous {
                assert!(weight > p.weight || (weight == p.weight && docid < p.docid));
            }
            previous = Some((p.weight, p.docid));
        }
    }
}

#[test]
fn add_then_delete_is_a_round_trip() {
    let engine = engine(Config::default(), STOPWORDS);
    let table = MemoryTable::with_subtree_threshold(1, 4);
    let base = random_texts(3, 30, 8);
    load(&engine, &table, &as_refs(&base));
    let before = table.postings(0);

    let extra = random_texts(4, 10, 8);
    let mut cursor = table.cursor(0);
    let rows: Vec<(DocId, Row)> = extra
        .iter()
        .enumerate()
        .map(|(i, t)| (DocId(1000 + i as u64), Row::from_texts(&[t.as_str()])))
        .collect();
    for (docid, row) in &rows {
        engine.add_row(0, &mut cursor, row, *docid).unwrap();
    }
    for (docid, row) in rows.iter().rev() {
        engine.del_row(0, &mut cursor, row, *docid).unwrap();
    }
    assert_eq!(table.postings(0), before);
}

#[test]
fn rewriting_a_row_with_itself_writes_nothing() {
    let engine = engine(Config::default(), STOPWORDS);
    let table = MemoryTable::new(1);
    let texts = random_texts(5, 20, 10);
    let ids = load(&engine, &table, &as_refs(&texts));
    table.reset_write_stats();

    let mut cursor = table.cursor(0);
    for docid in ids {
        let row = table.row(docid).unwrap();
        engine.update_row(0, &mut cursor, &row, &row, docid).unwrap();
    }
    assert_eq!(table.write_stats().total(), 0);
}

#[test]
fn update_equals_fresh_index() {
    let engine = engine(Config::default(), STOPWORDS);
    let old_texts = random_texts(21, 25, 10);
    let new_texts = random_texts(22, 25, 10);

    let table = MemoryTable::with_subtree_threshold(1, 6);
    let ids = load(&engine, &table, &as_refs(&old_texts));
    let mut cursor = table.cursor(0);
    for (docid, text) in ids.iter().zip(&new_texts) {
        let old = table.row(*docid).unwrap();
        let new = Row::from_texts(&[text.as_str()]);
        engine.update_row(0, &mut cursor, &old, &new, *docid).unwrap();
    }

    let fresh = MemoryTable::new(1);
    load(&engine, &fresh, &as_refs(&new_texts));
    assert_eq!(table.postings(0), fresh.postings(0));
}

#[test]
fn stopwords_never_reach_the_accumulators() {
    let engine = engine(Config::default(), STOPWORDS);
    let table = MemoryTable::new(1);
    let texts = random_texts(9, 40, 10);
    load(&engine, &table, &as_refs(&texts));

    assert!(table.postings(0).iter().all(|(w, _, _)| !STOPWORDS.iter().any(|s| s.as_bytes() == w.as_slice())));
    for mode in [SearchMode::Natural, SearchMode::Boolean] {
        let plain = search(&engine, &table, mode, "alpha engine", SearchFlags::NONE);
        let padded = search(&engine, &table, mode, "with alpha the engine and", SearchFlags::NONE);
        assert_eq!(plain, padded);
        assert!(search(&engine, &table, mode, "with", SearchFlags::NONE).is_empty());
    }
}

#[test]
fn higher_count_never_lowers_score() {
    let engine = engine(Config::default(), &[]);
    let mut previous = 0.0f32;
    for count in 1..=6 {
        let table = MemoryTable::new(1);
        let target = vec!["target"; count].join(" ");
        let text = format!("{} other words here", target);
        load(&engine, &table, &[text.as_str(), "filler rows only", "more filler rows", "filler again"]);

        let hits = search(&engine, &table, SearchMode::Natural, "target", SearchFlags::NONE);
        assert_eq!(docids(&hits), vec![1]);
        assert!(hits[0].relevance >= previous, "count {}: {} < {}", count, hits[0].relevance, previous);
        previous = hits[0].relevance;
    }
}

#[test]
fn sub_indexes_do_not_change_results() {
    let engine = engine(Config::default(), STOPWORDS);
    let texts = random_texts(13, 70, 10);
    let flat = MemoryTable::new(1);
    let nested = MemoryTable::with_subtree_threshold(1, 3);
    load(&engine, &flat, &as_refs(&texts));
    load(&engine, &nested, &as_refs(&texts));
    assert!(nested.subtree_count(0) > 0);

    let queries = [
        (SearchMode::Natural, "alpha engine search", SearchFlags::SORTED),
        (SearchMode::Natural, "rust kilo", SearchFlags::NONE),
        (SearchMode::Boolean, "+rust -alpha", SearchFlags::NONE),
        (SearchMode::Boolean, "engine* (bravo charlie)", SearchFlags::NONE),
    ];
    for (mode, query, flags) in queries {
        assert_eq!(
            search(&engine, &flat, mode, query, flags),
            search(&engine, &nested, mode, query, flags),
            "{}",
            query
        );
    }
}

#[test]
fn unpublished_rows_are_invisible() {
    let engine = engine(Config::default(), &[]);
    let table = MemoryTable::new(1);
    load(&engine, &table, &["visible apple"]);

    let row = Row::from_texts(&["hidden apple"]);
    let docid = table.insert_row(row.clone());
    engine.add_row(0, &mut table.cursor(0), &row, docid).unwrap();

    for mode in [SearchMode::Natural, SearchMode::Boolean] {
        assert_eq!(docids(&search(&engine, &table, mode, "apple", SearchFlags::NONE)), vec![1]);
    }
    table.publish(docid);
    assert_eq!(docids(&search(&engine, &table, SearchMode::Boolean, "apple", SearchFlags::NONE)), vec![1, 2]);
}

#[test]
fn corrupt_sub_index_is_reported() {
    let engine = engine(Config::default(), &[]);
    let table = MemoryTable::new(1);
    load(&engine, &table, &["solid ground"]);
    let real = encode_posting_key(b"broken", DocId(1), 0.5);
    table.cursor(0).insert(&real).unwrap();
    let root = encode_subtree_root_key(b"broken", TreeRoot(404), 2);
    table.corrupt_primary_key(0, &real, &root).unwrap();

    let err = engine
        .init_search(table.cursor(0), 0, SearchMode::Natural, b"broken", SearchFlags::NONE)
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::IndexCorrupt);

    let mut result = engine
        .init_search(table.cursor(0), 0, SearchMode::Boolean, b"broken", SearchFlags::NONE)
        .unwrap();
    assert_eq!(result.read_next().unwrap_err().kind, ErrorKind::IndexCorrupt);
}

#[test]
fn failed_write_leaves_earlier_keys_in_place() {
    let engine = engine(Config::default(), &[]);
    let table = MemoryTable::new(1);
    table.fail_writes_after(3);

    let row = Row::from_texts(&["alpha bravo charlie delta echo"]);
    let err = engine.add_row(0, &mut table.cursor(0), &row, DocId(1)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CursorIo);
    assert_eq!(table.postings(0).len(), 3);

    table.clear_faults();
    let err = engine.add_row(0, &mut table.cursor(0), &row, DocId(1)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::CursorIo, "re-adding hits the keys already written");
}

#[test]
fn bulk_load_matches_incremental_load() {
    let engine = engine(Config::default(), STOPWORDS);
    let texts = random_texts(31, 100, 12);
    let rows: Vec<(DocId, Row)> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| (DocId(i as u64 + 1), Row::from_texts(&[t.as_str()])))
        .collect();

    let bulk = MemoryTable::with_subtree_threshold(1, 8);
    engine.bulk_add(0, &mut bulk.cursor(0), &rows).unwrap();
    let incremental = MemoryTable::with_subtree_threshold(1, 8);
    let mut cursor = incremental.cursor(0);
    for (docid, row) in &rows {
        engine.add_row(0, &mut cursor, row, *docid).unwrap();
    }
    assert_eq!(bulk.postings(0), incremental.postings(0));
}
