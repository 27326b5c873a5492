//! Storage client (spec.md §4.11): the process-scope object that owns the
//! KV handle, symbol tables, metadata description, df cache and live
//! transaction counter, and hands out transactions, posting iterators and
//! read handles.
//!
//! Grounded on `examples/kev1N916-keSE/src/query_processor/query_processor.rs`'s
//! role as the one long-lived object wiring together the index, the term
//! cache and the scorer; here it plays the analogous role for this crate's
//! write path and join algebra instead of query scoring.

use crate::blocks::docset::DocSetBlock;
use crate::blocks::forward::{ForwardBlock, ForwardEntry};
use crate::blocks::meta::{read_value, MetaDescription, MetaValue};
use crate::dfcache::DfCache;
use crate::error::{Result, StorageError};
use crate::ids::{Attrno, Docno, Termno, Typeno, Userno};
use crate::iter::term::TermIterator;
use crate::iter::PostingIterator;
use crate::key::{prefix_bounds, KeyBuilder, KeyPrefix};
use crate::kv::{Kv, Snapshot, WriteBatch};
use crate::symtab::{DeferredAllocator, ImmediateAllocator, SymbolTable};
use crate::txn::Transaction;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Shared state behind every `StorageClient` clone and every `Transaction`
/// it hands out. Kept separate from `StorageClient` itself so `Transaction`
/// can hold an `Arc` to exactly this and nothing more.
pub(crate) struct StoreShared {
    pub(crate) kv: Arc<dyn Kv>,
    pub(crate) term_type: SymbolTable<ImmediateAllocator>,
    pub(crate) term_value: SymbolTable<DeferredAllocator>,
    pub(crate) doc_id: SymbolTable<ImmediateAllocator>,
    pub(crate) user_name: SymbolTable<ImmediateAllocator>,
    pub(crate) attribute_name: SymbolTable<ImmediateAllocator>,
    pub(crate) meta_desc: RwLock<MetaDescription>,
    pub(crate) df_cache: DfCache,
    pub(crate) nof_docs: AtomicU32,
    pub(crate) commit_mutex: Mutex<()>,
    pub(crate) txn_counter: AtomicUsize,
}

impl StoreShared {
    fn load_counter(kv: &dyn Kv, name: &str) -> u32 {
        let key = KeyBuilder::new(KeyPrefix::Variable).name(name.as_bytes()).into_bytes();
        match kv.get(&key) {
            Some(bytes) => crate::key::unpack_u32(&bytes).map(|(v, _)| v).unwrap_or(0),
            None => 0,
        }
    }

    fn store_counter(batch: &mut dyn WriteBatch, name: &str, value: u32) {
        let key = KeyBuilder::new(KeyPrefix::Variable).name(name.as_bytes()).into_bytes();
        let mut buf = Vec::new();
        crate::key::pack_u32(value, &mut buf);
        batch.put(&key, &buf);
    }
}

/// Process-scope handle (spec.md §4.11). Cheap to clone: it is just an
/// `Arc` around the shared state.
#[derive(Clone)]
pub struct StorageClient {
    pub(crate) inner: Arc<StoreShared>,
}

impl StorageClient {
    /// Opens a client against `kv`, restoring persisted `NextXxx`/`NofDocs`
    /// counters (spec.md §3 "Global variables"). Symbol-table name/id
    /// mappings themselves are loaded lazily through `look_up`/
    /// `get_or_create`, which fall back to the store (SPEC_FULL.md D.5:
    /// only an in-memory reference `Kv` ships with this crate, so a cold
    /// open's symbol tables start empty and are repopulated the first time
    /// each name is looked up by a caller that already knows it).
    pub fn open(kv: Arc<dyn Kv>, meta_desc: MetaDescription) -> Self {
        let next_typeno = StoreShared::load_counter(kv.as_ref(), "NextTypeno");
        let next_docno = StoreShared::load_counter(kv.as_ref(), "NextDocno");
        let next_userno = StoreShared::load_counter(kv.as_ref(), "NextUserno");
        let next_attrno = StoreShared::load_counter(kv.as_ref(), "NextAttrno");
        let next_termno = StoreShared::load_counter(kv.as_ref(), "NextTermno");
        let nof_docs = StoreShared::load_counter(kv.as_ref(), "NofDocs");

        // The persisted schema (`'M'` key) wins over the caller-supplied one
        // on reopen; a genuinely fresh store has no `'M'` key yet, so the
        // caller's description is both used and written out immediately.
        let desc_key = KeyBuilder::new(KeyPrefix::MetaDescr).into_bytes();
        let meta_desc = match kv.get(&desc_key) {
            Some(bytes) => MetaDescription::decode(&bytes).unwrap_or(meta_desc),
            None => {
                let mut batch = kv.new_batch();
                batch.put(&desc_key, &meta_desc.encode());
                let _ = kv.commit_batch(batch);
                meta_desc
            }
        };

        let inner = StoreShared {
            kv,
            term_type: SymbolTable::new(ImmediateAllocator::new(next_typeno)),
            term_value: SymbolTable::new(DeferredAllocator::new(next_termno)),
            doc_id: SymbolTable::new(ImmediateAllocator::new(next_docno)),
            user_name: SymbolTable::new(ImmediateAllocator::new(next_userno)),
            attribute_name: SymbolTable::new(ImmediateAllocator::new(next_attrno)),
            meta_desc: RwLock::new(meta_desc),
            df_cache: DfCache::new(),
            nof_docs: AtomicU32::new(nof_docs),
            commit_mutex: Mutex::new(()),
            txn_counter: AtomicUsize::new(0),
        };
        StorageClient { inner: Arc::new(inner) }
    }

    /// Increments the live-transaction counter; the caller must commit or
    /// drop the returned `Transaction` (spec.md §4.11).
    pub fn create_transaction(&self) -> Transaction {
        self.inner.txn_counter.fetch_add(1, Ordering::SeqCst);
        Transaction::new(Arc::clone(&self.inner))
    }

    pub fn document_number(&self, docid: &[u8]) -> Docno {
        self.inner.doc_id.look_up(docid)
    }

    pub fn user_number(&self, user: &[u8]) -> Userno {
        self.inner.user_name.look_up(user)
    }

    pub fn term_type_number(&self, name: &[u8]) -> Typeno {
        self.inner.term_type.look_up(name)
    }

    pub fn term_value_number(&self, name: &[u8]) -> Termno {
        self.inner.term_value.look_up(name)
    }

    pub fn attribute_number(&self, name: &[u8]) -> Attrno {
        self.inner.attribute_name.look_up(name)
    }

    pub fn nof_documents(&self) -> u32 {
        self.inner.nof_docs.load(Ordering::SeqCst)
    }

    pub fn max_document_number(&self) -> Docno {
        self.inner.doc_id.current_id()
    }

    /// Builds a posting iterator over `(typeno, termno)`'s chain, seeded
    /// with the cached document frequency (spec.md §4.11
    /// `create_term_posting_iterator`).
    pub fn create_term_posting_iterator(&self, typeno: Typeno, termno: Termno) -> Box<dyn PostingIterator> {
        let df = self.inner.df_cache.get(typeno, termno) as u64;
        Box::new(TermIterator::new(self.inner.kv.snapshot(), typeno, termno, df))
    }

    /// Builds a forward-index iterator for `typeno`'s block chain.
    pub fn create_forward_iterator(&self, typeno: Typeno) -> ForwardIterator {
        ForwardIterator::new(self.inner.kv.snapshot(), typeno)
    }

    pub fn create_metadata_reader(&self) -> MetadataReader {
        MetadataReader {
            snapshot: self.inner.kv.snapshot(),
            desc: self.inner.meta_desc.read().unwrap().clone(),
        }
    }

    pub fn create_attribute_reader(&self) -> AttributeReader {
        AttributeReader { snapshot: self.inner.kv.snapshot() }
    }

    /// Documents `userno` may read (ACL forward direction, spec.md §3
    /// "ACL forward").
    pub fn create_inverted_acl_iterator(&self, userno: Userno) -> Result<Vec<Docno>> {
        let prefix = KeyBuilder::new(KeyPrefix::UserAclBlock).id(userno).into_bytes();
        load_docset_chain(self.inner.kv.snapshot().as_ref(), &prefix)
    }

    /// Users who may read `docno` (ACL inverse direction).
    pub fn create_acl_iterator(&self, docno: Docno) -> Result<Vec<Userno>> {
        let prefix = KeyBuilder::new(KeyPrefix::AclBlock).id(docno).into_bytes();
        load_docset_chain(self.inner.kv.snapshot().as_ref(), &prefix)
    }

    /// Documents containing `(typeno, termno)` at all, read straight off
    /// the term's `'b'`-prefix document-set chain (spec.md §3
    /// "Document-set index") rather than by decoding posting blocks.
    pub fn create_term_docset_iterator(&self, typeno: Typeno, termno: Termno) -> Result<Vec<Docno>> {
        let prefix = KeyBuilder::new(KeyPrefix::DocSetBlock).id(typeno).id(termno).into_bytes();
        load_docset_chain(self.inner.kv.snapshot().as_ref(), &prefix)
    }

    /// Refuses if a transaction is still live; otherwise persists the
    /// global counters (spec.md §4.11 `close`).
    pub fn close(&self) -> Result<()> {
        if self.inner.txn_counter.load(Ordering::SeqCst) != 0 {
            return Err(StorageError::InvalidArgument(
                "cannot close a storage client with a live transaction".into(),
            ));
        }
        let mut batch = self.inner.kv.new_batch();
        StoreShared::store_counter(batch.as_mut(), "NextTypeno", self.inner.term_type.current_id());
        StoreShared::store_counter(batch.as_mut(), "NextDocno", self.inner.doc_id.current_id());
        StoreShared::store_counter(batch.as_mut(), "NextUserno", self.inner.user_name.current_id());
        StoreShared::store_counter(
            batch.as_mut(),
            "NextAttrno",
            self.inner.attribute_name.current_id(),
        );
        StoreShared::store_counter(batch.as_mut(), "NextTermno", self.inner.term_value.current_id());
        StoreShared::store_counter(batch.as_mut(), "NofDocs", self.inner.nof_docs.load(Ordering::SeqCst));
        self.inner.kv.commit_batch(batch)
    }

    /// Metadata rewrite (spec.md §3 "A metadata rewrite operation"): adopts
    /// `new_desc`, migrating every existing record with
    /// `MetaDescription::migrate_record` (undisturbed columns keep their
    /// values, new or reset columns are zero-initialised, dropped columns
    /// are discarded) and rebuilding the block chain at the new record
    /// width. A store-wide schema change, not scoped to any one
    /// `Transaction`, so it takes the commit mutex itself to serialize with
    /// document commits.
    pub fn alter_metadata_description(&self, new_desc: MetaDescription) -> Result<()> {
        let _guard = self.inner.commit_mutex.lock().unwrap();
        let old_desc = self.inner.meta_desc.read().unwrap().clone();

        let prefix = KeyBuilder::new(KeyPrefix::MetaBlock).into_bytes();
        let (lower, upper) = prefix_bounds(&prefix);
        let mut batch = self.inner.kv.new_batch();
        let mut migrated = Vec::new();
        {
            let snapshot = self.inner.kv.snapshot();
            let mut cursor = snapshot.range_scan(&lower, &upper);
            while cursor.valid() {
                let key = cursor.key().to_vec();
                let block = crate::blocks::meta::MetaBlock::decode(cursor.value())?;
                for docno in block.first_doc()..=block.block_id() {
                    if let Some(record) = block.record(docno) {
                        migrated.push(crate::maps::PendingOp::Upsert(docno, old_desc.migrate_record(record, &new_desc)));
                    }
                }
                batch.delete(&key);
                cursor.next();
            }
        }

        let new_width = new_desc.record_width();
        let rebuilt = crate::maps::metadata::merge_metadata_records(&[], new_width, migrated)?;
        for block in &rebuilt {
            let key = KeyBuilder::new(KeyPrefix::MetaBlock).id(block.block_id()).into_bytes();
            batch.put(&key, &block.encode());
        }

        let desc_key = KeyBuilder::new(KeyPrefix::MetaDescr).into_bytes();
        batch.put(&desc_key, &new_desc.encode());

        self.inner.kv.commit_batch(batch)?;
        *self.inner.meta_desc.write().unwrap() = new_desc;
        Ok(())
    }
}

/// Decodes every `DocSetBlock` under `prefix` (in block-id order, though the
/// result is sorted regardless) and returns the union of their members.
fn load_docset_chain(snapshot: &dyn Snapshot, prefix: &[u8]) -> Result<Vec<Docno>> {
    let (lower, upper) = prefix_bounds(prefix);
    let mut cursor = snapshot.range_scan(&lower, &upper);
    let mut out = Vec::new();
    while cursor.valid() {
        let block = DocSetBlock::decode(cursor.value())?;
        out.extend(block.nodes().iter().flat_map(|n| n.members()));
        cursor.next();
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

/// Forward-index read handle: reconstructs a document's `(position, text)`
/// entries from the block chain for its type (spec.md §3 "Forward index").
pub struct ForwardIterator {
    snapshot: Arc<dyn Snapshot>,
    typeno: Typeno,
}

impl ForwardIterator {
    fn new(snapshot: Arc<dyn Snapshot>, typeno: Typeno) -> Self {
        ForwardIterator { snapshot, typeno }
    }

    /// Entries for `docno`, or `None` if the document has no forward
    /// entries for this type.
    pub fn entries(&self, docno: Docno) -> Result<Option<Vec<ForwardEntry>>> {
        let prefix = KeyBuilder::new(KeyPrefix::Forward).id(self.typeno).into_bytes();
        let (_, upper) = prefix_bounds(&prefix);
        let mut lower = prefix;
        crate::key::pack_u32(docno, &mut lower);
        let mut cursor = self.snapshot.range_scan(&lower, &upper);
        if !cursor.valid() {
            return Ok(None);
        }
        let block = ForwardBlock::decode(cursor.value())?;
        let (found, cur) = block.skip_doc(docno);
        if found != docno {
            return Ok(None);
        }
        Ok(Some(block.entries_at(cur.unwrap())?))
    }
}

/// Metadata read handle (spec.md §3 "Metadata").
pub struct MetadataReader {
    snapshot: Arc<dyn Snapshot>,
    desc: MetaDescription,
}

impl MetadataReader {
    pub fn record(&self, docno: Docno) -> Result<Option<Vec<u8>>> {
        let prefix = KeyBuilder::new(KeyPrefix::MetaBlock).into_bytes();
        let (_, upper) = prefix_bounds(&prefix);
        let mut lower = prefix;
        crate::key::pack_u32(docno, &mut lower);
        let mut cursor = self.snapshot.range_scan(&lower, &upper);
        if !cursor.valid() {
            return Ok(None);
        }
        let block = crate::blocks::meta::MetaBlock::decode(cursor.value())?;
        Ok(block.record(docno).map(|r| r.to_vec()))
    }

    pub fn value(&self, docno: Docno, column: &str) -> Result<Option<MetaValue>> {
        let (offset, ty) = match self.desc.offset_of(column) {
            Some(v) => v,
            None => return Err(StorageError::UnknownIdentifier(column.to_string())),
        };
        Ok(self.record(docno)?.map(|r| read_value(&r, offset, ty)))
    }

    pub fn description(&self) -> &MetaDescription {
        &self.desc
    }
}

/// Attribute read handle (spec.md §3 "Attributes").
pub struct AttributeReader {
    snapshot: Arc<dyn Snapshot>,
}

impl AttributeReader {
    pub fn get(&self, docno: Docno, attrno: Attrno) -> Result<Option<String>> {
        let key = KeyBuilder::new(KeyPrefix::DocAttribute).id(docno).id(attrno).into_bytes();
        match self.snapshot.get(&key) {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::integrity(e.as_bytes(), "attribute value is not valid utf-8")),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::meta::MetaType;
    use crate::kv::MemKv;

    #[test]
    fn nof_documents_starts_at_zero_on_a_fresh_store() {
        let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
        let client = StorageClient::open(kv, MetaDescription::new().with_column("year", MetaType::Int32));
        assert_eq!(client.nof_documents(), 0);
        assert_eq!(client.max_document_number(), 0);
    }

    #[test]
    fn close_refuses_with_a_live_transaction() {
        let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
        let client = StorageClient::open(kv, MetaDescription::new());
        let _txn = client.create_transaction();
        assert!(client.close().is_err());
    }

    #[test]
    fn unknown_attribute_column_is_reported() {
        let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
        let client = StorageClient::open(kv, MetaDescription::new());
        let reader = client.create_metadata_reader();
        assert!(reader.value(1, "nope").is_err());
    }

    #[test]
    fn metadata_description_survives_reopen() {
        let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
        let desc = MetaDescription::new().with_column("year", MetaType::Int32);
        let client = StorageClient::open(Arc::clone(&kv), desc.clone());
        client.close().unwrap();

        let reopened = StorageClient::open(kv, MetaDescription::new());
        assert_eq!(reopened.create_metadata_reader().description(), &desc);
    }

    #[test]
    fn alter_metadata_description_migrates_existing_records() {
        let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
        let desc = MetaDescription::new().with_column("rank", MetaType::UInt32);
        let client = StorageClient::open(kv, desc.clone());

        let mut txn = client.create_transaction();
        txn.create_document(b"doc-1").set_metadata("rank", crate::blocks::meta::MetaValue::Int(7)).done().unwrap();
        txn.commit().unwrap();

        let new_desc = desc.drop_column("rank").add_column("views", MetaType::UInt16);
        client.alter_metadata_description(new_desc.clone()).unwrap();

        let reader = client.create_metadata_reader();
        assert_eq!(reader.description(), &new_desc);
        assert_eq!(reader.value(1, "views").unwrap(), Some(crate::blocks::meta::MetaValue::Int(0)));
        assert!(reader.value(1, "rank").is_err());
    }
}
