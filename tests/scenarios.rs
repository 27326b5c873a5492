//! End-to-end scenarios (spec.md §8 "End-to-end scenarios"): each seeds an
//! empty store, drives it purely through `StorageClient`/`Transaction`, and
//! checks behavior a caller outside this crate could observe.

use std::sync::Arc;
use storage_core::blocks::meta::{MetaDescription, MetaType, MetaValue};
use storage_core::iter::difference::Difference;
use storage_core::iter::intersect::Intersect;
use storage_core::iter::sequence::Sequence;
use storage_core::iter::union::Union;
use storage_core::iter::within::Within;
use storage_core::iter::PostingIterator;
use storage_core::kv::{Kv, MemKv};
use storage_core::StorageClient;

fn open() -> StorageClient {
    let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
    StorageClient::open(kv, MetaDescription::new())
}

/// S1. Single-document round trip.
#[test]
fn s1_single_document_round_trip() {
    let client = open();
    let mut txn = client.create_transaction();
    txn.create_document(b"d1")
        .index_term(b"word", b"the", 1)
        .index_term(b"word", b"cat", 2)
        .index_term(b"word", b"sat", 3)
        .done()
        .unwrap();
    txn.commit().unwrap();

    let word = client.term_type_number(b"word");
    let the = client.term_value_number(b"the");
    let cat = client.term_value_number(b"cat");
    let sat = client.term_value_number(b"sat");

    // intersect(word:the, word:sat): one match at docno=1, no shared position.
    let a = client.create_term_posting_iterator(word, the);
    let b = client.create_term_posting_iterator(word, sat);
    let mut inter = Intersect::new(vec![a, b]);
    assert_eq!(inter.skip_doc(1), 1);
    assert_eq!(inter.frequency(), 0);

    // within(range=5, [the, cat, sat]): one match in the single document.
    let a = client.create_term_posting_iterator(word, the);
    let b = client.create_term_posting_iterator(word, cat);
    let c = client.create_term_posting_iterator(word, sat);
    let mut within = Within::new(vec![a, b, c], 5, 3);
    assert_eq!(within.skip_doc(1), 1);

    // sequence(range=3, [the, sat]): ordered match in the same document.
    let a = client.create_term_posting_iterator(word, the);
    let b = client.create_term_posting_iterator(word, sat);
    let mut seq = Sequence::new(vec![a, b], 3);
    assert_eq!(seq.skip_doc(1), 1);
}

/// S2. Document-set compaction: 10,000 documents all carry the same term;
/// the term's `'b'`-prefix document-set chain should settle into a single
/// contiguous range, `df` should read 10,000, and `skip_doc` over the
/// posting iterator should still land exactly on the requested docno.
#[test]
fn s2_term_docset_compacts_to_a_single_range_over_many_documents() {
    let client = open();
    let mut txn = client.create_transaction();
    for i in 1..=10_000u32 {
        txn.create_document(format!("doc-{i}").as_bytes()).index_term(b"word", b"x", 1).done().unwrap();
    }
    txn.commit().unwrap();

    let word = client.term_type_number(b"word");
    let x = client.term_value_number(b"x");

    let docset = client.create_term_docset_iterator(word, x).unwrap();
    assert_eq!(docset, (1..=10_000u32).collect::<Vec<_>>());

    let mut it = client.create_term_posting_iterator(word, x);
    assert_eq!(it.document_frequency(), 10_000);
    assert_eq!(it.skip_doc(5_000), 5_000);
}

/// S4. Metadata restriction (see also restriction.rs's own inline tests for
/// `CompiledRestriction::evaluate`'s per-column logic; this exercises the
/// same scenario end-to-end through `StorageClient`).
#[test]
fn s4_metadata_restriction_over_a_full_docno_scan() {
    use storage_core::restriction::{CmpOp, Restriction, RestrictionTerm};

    let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
    let desc = MetaDescription::new().with_column("year", MetaType::UInt16);
    let client = StorageClient::open(kv, desc);

    for year in [2000u32, 2005, 2010, 2015] {
        let mut txn = client.create_transaction();
        txn.create_document(format!("doc-{year}").as_bytes())
            .set_metadata("year", MetaValue::Int(year as i64))
            .done()
            .unwrap();
        txn.commit().unwrap();
    }

    let reader = client.create_metadata_reader();
    let restriction = Restriction::new().and_group(vec![
        RestrictionTerm { column: "year".into(), op: CmpOp::Ge, value: MetaValue::Int(2005) },
        RestrictionTerm { column: "year".into(), op: CmpOp::Le, value: MetaValue::Int(2010) },
    ]);
    let compiled = restriction.compile(reader.description()).unwrap();

    let mut matches = Vec::new();
    for docno in 1..=client.max_document_number() {
        if let Some(record) = reader.record(docno).unwrap() {
            if compiled.evaluate(&record) {
                matches.push(docno);
            }
        }
    }
    assert_eq!(matches, vec![2, 3]);
}

/// S5. Delete document.
#[test]
fn s5_delete_document_removes_postings_and_counts() {
    let client = open();
    let mut txn = client.create_transaction();
    txn.create_document(b"d1").index_term(b"word", b"the", 1).done().unwrap();
    txn.commit().unwrap();
    assert_eq!(client.nof_documents(), 1);

    let mut txn = client.create_transaction();
    txn.delete_document(b"d1").unwrap();
    txn.commit().unwrap();

    assert_eq!(client.nof_documents(), 0);
    let word = client.term_type_number(b"word");
    let the = client.term_value_number(b"the");
    let mut it = client.create_term_posting_iterator(word, the);
    assert_eq!(it.skip_doc(1), 0);
    assert_eq!(it.document_frequency(), 0);
}

/// S6. Commit durability: a fresh `StorageClient` over the same `Kv`
/// reproduces identical query results.
#[test]
fn s6_commit_durability_across_reopen() {
    let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
    let client = StorageClient::open(Arc::clone(&kv), MetaDescription::new());
    let mut txn = client.create_transaction();
    txn.create_document(b"d1")
        .index_term(b"word", b"the", 1)
        .index_term(b"word", b"sat", 3)
        .done()
        .unwrap();
    txn.commit().unwrap();
    client.close().unwrap();

    let reopened = StorageClient::open(kv, MetaDescription::new());
    let word = reopened.term_type_number(b"word");
    let the = reopened.term_value_number(b"the");
    let sat = reopened.term_value_number(b"sat");
    let a = reopened.create_term_posting_iterator(word, the);
    let b = reopened.create_term_posting_iterator(word, sat);
    let mut inter = Intersect::new(vec![a, b]);
    assert_eq!(inter.skip_doc(1), 1);
    assert_eq!(reopened.nof_documents(), 1);
}

/// Operator-algebra laws (spec.md §8 "Operator algebra").
#[test]
fn algebra_laws_hold_over_a_shared_term() {
    let client = open();
    let mut txn = client.create_transaction();
    txn.create_document(b"d1")
        .index_term(b"word", b"the", 1)
        .index_term(b"word", b"cat", 2)
        .done()
        .unwrap();
    txn.commit().unwrap();

    let word = client.term_type_number(b"word");
    let the = client.term_value_number(b"the");
    let cat = client.term_value_number(b"cat");

    // intersect(a, a) = a
    let a1 = client.create_term_posting_iterator(word, the);
    let a2 = client.create_term_posting_iterator(word, the);
    let mut inter = Intersect::new(vec![a1, a2]);
    let mut plain = client.create_term_posting_iterator(word, the);
    assert_eq!(inter.skip_doc(1), plain.skip_doc(1));

    // union(a, b) = union(b, a)
    let a = client.create_term_posting_iterator(word, the);
    let b = client.create_term_posting_iterator(word, cat);
    let mut u1 = Union::new(vec![a, b]);
    let a = client.create_term_posting_iterator(word, the);
    let b = client.create_term_posting_iterator(word, cat);
    let mut u2 = Union::new(vec![b, a]);
    assert_eq!(u1.skip_doc(1), u2.skip_doc(1));

    // difference(a, a) is empty
    let a1 = client.create_term_posting_iterator(word, the);
    let a2 = client.create_term_posting_iterator(word, the);
    let mut diff = Difference::new(a1, a2);
    assert_eq!(diff.skip_doc(1), 0);
}
