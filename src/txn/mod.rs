//! Transaction: the write-path orchestrator (spec.md §4.6). A `Transaction`
//! accumulates `DocumentBuilder`/`UpdateBuilder` edits and document
//! deletions into per-family pending-operation buffers, then at `commit`
//! re-merges each touched block chain (via `crate::maps::*`), applies the
//! resulting writes as one atomic KV batch, and only then publishes the new
//! document-frequency and document-count counters.
//!
//! Grounded on spec.md §4.6's write-path contract and on the general shape
//! of `StorageTransaction`/`DocumentBuilder` commit sequences in
//! `examples/original_source/src/lvdbstorage/`: stage edits in memory,
//! merge each touched block family once, write one batch, then update the
//! caches that sit in front of the store.

use crate::blocks::docset::DocSetBlock;
use crate::blocks::forward::{ForwardBlock, ForwardEntry};
use crate::blocks::invterm::{InvTermBlock, InvTermEntry};
use crate::blocks::meta::{write_value, MetaBlock, MetaValue};
use crate::blocks::posting::PostingBlock;
use crate::client::StoreShared;
use crate::error::Result;
use crate::ids::{Attrno, Docno, Position, Termno, Typeno, Userno};
use crate::key::{pack_u32, prefix_bounds, unpack_u32, KeyBuilder, KeyPrefix};
use crate::kv::Cursor;
use crate::maps::{self, PendingOp};
use crate::txn::stats::StatisticsBuilder;
use rustc_hash::FxHashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub mod stats;

/// A single buffered write-path transaction. Must be committed or rolled
/// back (dropping without either rolls back) before the owning
/// `StorageClient` can close (spec.md §4.11).
pub struct Transaction {
    shared: Arc<StoreShared>,
    postings: FxHashMap<(Typeno, Termno), Vec<PendingOp<Vec<Position>>>>,
    forward: FxHashMap<Typeno, Vec<PendingOp<Vec<ForwardEntry>>>>,
    metadata: Vec<PendingOp<Vec<u8>>>,
    attributes: Vec<(Docno, Attrno, Option<String>)>,
    acl_user_docs: FxHashMap<Userno, (Vec<Docno>, Vec<Docno>)>,
    acl_doc_users: FxHashMap<Docno, (Vec<Userno>, Vec<Userno>)>,
    inv_term: FxHashMap<Docno, Option<Vec<InvTermEntry>>>,
    stats: StatisticsBuilder,
}

impl Transaction {
    pub(crate) fn new(shared: Arc<StoreShared>) -> Self {
        Transaction {
            shared,
            postings: FxHashMap::default(),
            forward: FxHashMap::default(),
            metadata: Vec::new(),
            attributes: Vec::new(),
            acl_user_docs: FxHashMap::default(),
            acl_doc_users: FxHashMap::default(),
            inv_term: FxHashMap::default(),
            stats: StatisticsBuilder::new(),
        }
    }

    /// Begins building a document. Looks up `docid` first: an existing id
    /// is an overwrite (its old index/forward entries are retracted before
    /// the new ones are staged), an unseen one mints a fresh docno.
    pub fn create_document<'a>(&'a mut self, docid: &[u8]) -> DocumentBuilder<'a> {
        let existing = self.shared.doc_id.look_up(docid);
        let (docno, is_new) = if existing != 0 {
            (existing, false)
        } else {
            (self.shared.doc_id.get_or_create(docid), true)
        };
        DocumentBuilder {
            txn: self,
            docno,
            is_new,
            index_terms: Vec::new(),
            forward_terms: FxHashMap::default(),
            metadata: Vec::new(),
            attributes: Vec::new(),
            acl_users: Vec::new(),
        }
    }

    /// Begins a metadata/attribute/ACL-only edit of an already-indexed
    /// document; cannot touch the inverted or forward index (spec.md
    /// §4.6 `update_document`).
    pub fn update_document<'a>(&'a mut self, docno: Docno) -> UpdateBuilder<'a> {
        UpdateBuilder {
            txn: self,
            docno,
            metadata: Vec::new(),
            attributes: Vec::new(),
            acl_grants: Vec::new(),
            acl_revokes: Vec::new(),
        }
    }

    /// Retracts every trace of `docid`: posting/docset entries (via its
    /// inverse term list), forward entries, metadata, attributes and ACL
    /// membership, and frees the document id itself.
    pub fn delete_document(&mut self, docid: &[u8]) -> Result<()> {
        let docno = self.shared.doc_id.look_up(docid);
        if docno == 0 {
            return Ok(());
        }

        if let Some(block) = self.read_invterm(docno) {
            let mut seen_types: Vec<Typeno> = block.entries().iter().map(|e| e.typeno).collect();
            seen_types.sort_unstable();
            seen_types.dedup();
            for typeno in seen_types {
                self.forward.entry(typeno).or_default().push(PendingOp::Delete(docno));
            }
        }
        self.retract_old_index_entries(docno);
        self.inv_term.insert(docno, None);

        self.metadata.push(PendingOp::Delete(docno));

        for attrno in self.existing_attrnos(docno) {
            self.attributes.push((docno, attrno, None));
        }

        let existing_users = self.existing_acl_users(docno);
        for &userno in &existing_users {
            self.acl_user_docs.entry(userno).or_default().1.push(docno);
        }
        self.acl_doc_users.entry(docno).or_default().1.extend(existing_users);

        self.shared.doc_id.remove(docid);
        self.stats.remove_document();
        Ok(())
    }

    /// Discards every buffered edit. Equivalent to simply dropping the
    /// transaction: nothing has touched the store yet, so there is nothing
    /// to undo (spec.md §4.6 `rollback`).
    pub fn rollback(self) {}

    /// Merges every touched block family against the store, writes one
    /// atomic batch, and -- only once that batch succeeds -- publishes the
    /// new df-cache entries and document count (spec.md §4.6 `commit`:
    /// "store I/O error during commit rolls back the store transaction,
    /// in-memory caches unchanged").
    pub fn commit(mut self) -> Result<()> {
        let _guard = self.shared.commit_mutex.lock().unwrap();
        let mut batch = self.shared.kv.new_batch();

        for ((typeno, termno), ops) in std::mem::take(&mut self.postings) {
            // Last op per docno wins (spec.md §5 "later mutations in the
            // staged maps override earlier ones on the same key") before
            // splitting into the docset chain's grants/revokes, so a
            // document re-indexed under the same term within one
            // transaction doesn't land in both lists.
            let mut last_op: FxHashMap<Docno, bool> = FxHashMap::default();
            for op in &ops {
                match op {
                    PendingOp::Upsert(docno, _) => {
                        last_op.insert(*docno, true);
                    }
                    PendingOp::Delete(docno) => {
                        last_op.insert(*docno, false);
                    }
                }
            }
            let mut term_grants = Vec::new();
            let mut term_revokes = Vec::new();
            for (docno, is_grant) in last_op {
                if is_grant {
                    term_grants.push(docno);
                } else {
                    term_revokes.push(docno);
                }
            }

            let existing = self.load_posting_chain(typeno, termno)?;
            for block in &existing {
                batch.delete(&posting_key(typeno, termno, block.block_id()));
            }
            let rebuilt = maps::inverted::merge_term_postings(&existing, ops)?;
            for block in &rebuilt {
                batch.put(&posting_key(typeno, termno, block.block_id()), &block.encode());
            }

            let existing_docset = self.load_term_docset_chain(typeno, termno)?;
            for block in &existing_docset {
                batch.delete(&term_docset_key(typeno, termno, block.block_id()));
            }
            let rebuilt_docset = maps::inverted::merge_term_docset(&existing_docset, &term_grants, &term_revokes)?;
            for block in &rebuilt_docset {
                batch.put(&term_docset_key(typeno, termno, block.block_id()), &block.encode());
            }
        }

        for (typeno, ops) in std::mem::take(&mut self.forward) {
            let existing = self.load_forward_chain(typeno)?;
            for block in &existing {
                batch.delete(&forward_key(typeno, block.block_id()));
            }
            let rebuilt = maps::forward::merge_forward_entries(&existing, ops)?;
            for block in &rebuilt {
                batch.put(&forward_key(typeno, block.block_id()), &block.encode());
            }
        }

        if !self.metadata.is_empty() {
            let existing = self.load_meta_chain()?;
            for block in &existing {
                batch.delete(&meta_key(block.block_id()));
            }
            let width = self.shared.meta_desc.read().unwrap().record_width();
            let rebuilt = maps::metadata::merge_metadata_records(&existing, width, std::mem::take(&mut self.metadata))?;
            for block in &rebuilt {
                batch.put(&meta_key(block.block_id()), &block.encode());
            }
        }

        for (docno, attrno, value) in std::mem::take(&mut self.attributes) {
            let key = KeyBuilder::new(KeyPrefix::DocAttribute).id(docno).id(attrno).into_bytes();
            match value {
                Some(text) => batch.put(&key, text.as_bytes()),
                None => batch.delete(&key),
            }
        }

        for (userno, (grants, revokes)) in std::mem::take(&mut self.acl_user_docs) {
            let existing = self.load_docset_chain(KeyPrefix::UserAclBlock, userno)?;
            for block in &existing {
                batch.delete(&docset_key(KeyPrefix::UserAclBlock, userno, block.block_id()));
            }
            let rebuilt = maps::useracl::merge_membership(&existing, &grants, &revokes)?;
            for block in &rebuilt {
                batch.put(&docset_key(KeyPrefix::UserAclBlock, userno, block.block_id()), &block.encode());
            }
        }

        for (docno, (grants, revokes)) in std::mem::take(&mut self.acl_doc_users) {
            let existing = self.load_docset_chain(KeyPrefix::AclBlock, docno)?;
            for block in &existing {
                batch.delete(&docset_key(KeyPrefix::AclBlock, docno, block.block_id()));
            }
            let rebuilt = maps::useracl::merge_membership(&existing, &grants, &revokes)?;
            for block in &rebuilt {
                batch.put(&docset_key(KeyPrefix::AclBlock, docno, block.block_id()), &block.encode());
            }
        }

        for (docno, entries) in std::mem::take(&mut self.inv_term) {
            let key = KeyBuilder::new(KeyPrefix::InvTerm).id(docno).into_bytes();
            match entries {
                Some(entries) => batch.put(&key, &InvTermBlock::new(docno, entries).encode()),
                None => batch.delete(&key),
            }
        }

        self.shared.kv.commit_batch(batch)?;

        for (typeno, termno, delta) in self.stats.df_deltas() {
            self.shared.df_cache.apply_delta(typeno, termno, delta);
        }
        let delta = self.stats.nof_docs_delta();
        if delta != 0 {
            let cur = self.shared.nof_docs.load(Ordering::SeqCst);
            let next = (cur as i64 + delta).max(0) as u32;
            self.shared.nof_docs.store(next, Ordering::SeqCst);
        }
        Ok(())
    }

    fn apply_document(
        &mut self,
        docno: Docno,
        is_new: bool,
        index_terms: Vec<(Typeno, Termno, Position)>,
        forward_terms: FxHashMap<Typeno, Vec<ForwardEntry>>,
        metadata: Vec<(String, MetaValue)>,
        attributes: Vec<(String, String)>,
        acl_users: Vec<Userno>,
    ) -> Result<()> {
        if !is_new {
            self.retract_old_index_entries(docno);
        }

        let mut grouped: FxHashMap<(Typeno, Termno), Vec<Position>> = FxHashMap::default();
        for (typeno, termno, pos) in index_terms {
            grouped.entry((typeno, termno)).or_default().push(pos);
        }
        let mut new_entries = Vec::with_capacity(grouped.len());
        for ((typeno, termno), mut positions) in grouped {
            positions.sort_unstable();
            positions.dedup();
            self.stats.add_df_delta(typeno, termno, 1);
            new_entries.push(InvTermEntry {
                typeno,
                termno,
                ff: positions.len() as u32,
                first_pos: positions[0],
            });
            self.postings.entry((typeno, termno)).or_default().push(PendingOp::Upsert(docno, positions));
        }
        self.inv_term.insert(docno, Some(new_entries));

        for (typeno, mut entries) in forward_terms {
            entries.sort_by_key(|e| e.position);
            self.forward.entry(typeno).or_default().push(PendingOp::Upsert(docno, entries));
        }

        if !metadata.is_empty() {
            let record = self.build_metadata_record(docno, &metadata)?;
            self.metadata.push(PendingOp::Upsert(docno, record));
        }

        for (name, value) in attributes {
            let attrno = self.shared.attribute_name.get_or_create(name.as_bytes());
            self.attributes.push((docno, attrno, Some(value)));
        }

        for userno in acl_users {
            self.acl_user_docs.entry(userno).or_default().0.push(docno);
            self.acl_doc_users.entry(docno).or_default().0.push(userno);
        }

        if is_new {
            self.stats.add_document();
        }
        Ok(())
    }

    fn apply_update(
        &mut self,
        docno: Docno,
        metadata: Vec<(String, MetaValue)>,
        attributes: Vec<(String, Option<String>)>,
        acl_grants: Vec<Userno>,
        acl_revokes: Vec<Userno>,
    ) -> Result<()> {
        if !metadata.is_empty() {
            let record = self.build_metadata_record(docno, &metadata)?;
            self.metadata.push(PendingOp::Upsert(docno, record));
        }
        for (name, value) in attributes {
            match value {
                Some(text) => {
                    let attrno = self.shared.attribute_name.get_or_create(name.as_bytes());
                    self.attributes.push((docno, attrno, Some(text)));
                }
                None => {
                    let attrno = self.shared.attribute_name.look_up(name.as_bytes());
                    if attrno != 0 {
                        self.attributes.push((docno, attrno, None));
                    }
                }
            }
        }
        for userno in acl_grants {
            self.acl_user_docs.entry(userno).or_default().0.push(docno);
            self.acl_doc_users.entry(docno).or_default().0.push(userno);
        }
        for userno in acl_revokes {
            self.acl_user_docs.entry(userno).or_default().1.push(docno);
            self.acl_doc_users.entry(docno).or_default().1.push(userno);
        }
        Ok(())
    }

    fn retract_old_index_entries(&mut self, docno: Docno) {
        if let Some(block) = self.read_invterm(docno) {
            for e in block.entries() {
                self.stats.add_df_delta(e.typeno, e.termno, -1);
                self.postings.entry((e.typeno, e.termno)).or_default().push(PendingOp::Delete(docno));
            }
        }
    }

    fn read_invterm(&self, docno: Docno) -> Option<InvTermBlock> {
        let key = KeyBuilder::new(KeyPrefix::InvTerm).id(docno).into_bytes();
        self.shared.kv.get(&key).and_then(|bytes| InvTermBlock::decode(&bytes).ok())
    }

    fn build_metadata_record(&self, docno: Docno, updates: &[(String, MetaValue)]) -> Result<Vec<u8>> {
        let desc = self.shared.meta_desc.read().unwrap();
        let mut record = self
            .read_metadata_record(docno)
            .unwrap_or_else(|| vec![0u8; desc.record_width()]);
        for (name, value) in updates {
            if let Some((offset, ty)) = desc.offset_of(name) {
                write_value(&mut record, offset, ty, *value)?;
            }
        }
        Ok(record)
    }

    fn read_metadata_record(&self, docno: Docno) -> Option<Vec<u8>> {
        let prefix = KeyBuilder::new(KeyPrefix::MetaBlock).into_bytes();
        let (_, upper) = prefix_bounds(&prefix);
        let mut lower = prefix;
        pack_u32(docno, &mut lower);
        let mut cursor = self.shared.kv.range_scan(&lower, &upper);
        if !cursor.valid() {
            return None;
        }
        let block = MetaBlock::decode(cursor.value()).ok()?;
        block.record(docno).map(|r| r.to_vec())
    }

    fn existing_attrnos(&self, docno: Docno) -> Vec<Attrno> {
        let prefix = KeyBuilder::new(KeyPrefix::DocAttribute).id(docno).into_bytes();
        let (lower, upper) = prefix_bounds(&prefix);
        let mut cursor = self.shared.kv.range_scan(&lower, &upper);
        let mut out = Vec::new();
        while cursor.valid() {
            let key = cursor.key();
            if key.len() > prefix.len() {
                if let Ok((attrno, _)) = unpack_u32(&key[prefix.len()..]) {
                    out.push(attrno);
                }
            }
            cursor.next();
        }
        out
    }

    fn existing_acl_users(&self, docno: Docno) -> Vec<Userno> {
        let prefix = KeyBuilder::new(KeyPrefix::AclBlock).id(docno).into_bytes();
        let (lower, upper) = prefix_bounds(&prefix);
        let mut cursor = self.shared.kv.range_scan(&lower, &upper);
        let mut out = Vec::new();
        while cursor.valid() {
            if let Ok(block) = DocSetBlock::decode(cursor.value()) {
                out.extend(block.nodes().iter().flat_map(|n| n.members()));
            }
            cursor.next();
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn load_posting_chain(&self, typeno: Typeno, termno: Termno) -> Result<Vec<PostingBlock>> {
        let prefix = KeyBuilder::new(KeyPrefix::PostingBlock).id(typeno).id(termno).into_bytes();
        let (lower, upper) = prefix_bounds(&prefix);
        let mut cursor = self.shared.kv.range_scan(&lower, &upper);
        let mut out = Vec::new();
        while cursor.valid() {
            out.push(PostingBlock::decode(cursor.value())?);
            cursor.next();
        }
        Ok(out)
    }

    fn load_forward_chain(&self, typeno: Typeno) -> Result<Vec<ForwardBlock>> {
        let prefix = KeyBuilder::new(KeyPrefix::Forward).id(typeno).into_bytes();
        let (lower, upper) = prefix_bounds(&prefix);
        let mut cursor = self.shared.kv.range_scan(&lower, &upper);
        let mut out = Vec::new();
        while cursor.valid() {
            out.push(ForwardBlock::decode(cursor.value())?);
            cursor.next();
        }
        Ok(out)
    }

    fn load_meta_chain(&self) -> Result<Vec<MetaBlock>> {
        let prefix = KeyBuilder::new(KeyPrefix::MetaBlock).into_bytes();
        let (lower, upper) = prefix_bounds(&prefix);
        let mut cursor = self.shared.kv.range_scan(&lower, &upper);
        let mut out = Vec::new();
        while cursor.valid() {
            out.push(MetaBlock::decode(cursor.value())?);
            cursor.next();
        }
        Ok(out)
    }

    fn load_term_docset_chain(&self, typeno: Typeno, termno: Termno) -> Result<Vec<DocSetBlock>> {
        let prefix = KeyBuilder::new(KeyPrefix::DocSetBlock).id(typeno).id(termno).into_bytes();
        let (lower, upper) = prefix_bounds(&prefix);
        let mut cursor = self.shared.kv.range_scan(&lower, &upper);
        let mut out = Vec::new();
        while cursor.valid() {
            out.push(DocSetBlock::decode(cursor.value())?);
            cursor.next();
        }
        Ok(out)
    }

    fn load_docset_chain(&self, prefix_byte: KeyPrefix, id: u32) -> Result<Vec<DocSetBlock>> {
        let prefix = KeyBuilder::new(prefix_byte).id(id).into_bytes();
        let (lower, upper) = prefix_bounds(&prefix);
        let mut cursor = self.shared.kv.range_scan(&lower, &upper);
        let mut out = Vec::new();
        while cursor.valid() {
            out.push(DocSetBlock::decode(cursor.value())?);
            cursor.next();
        }
        Ok(out)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.shared.txn_counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn posting_key(typeno: Typeno, termno: Termno, block_id: Docno) -> Vec<u8> {
    KeyBuilder::new(KeyPrefix::PostingBlock).id(typeno).id(termno).id(block_id).into_bytes()
}

fn term_docset_key(typeno: Typeno, termno: Termno, block_id: Docno) -> Vec<u8> {
    KeyBuilder::new(KeyPrefix::DocSetBlock).id(typeno).id(termno).id(block_id).into_bytes()
}

fn forward_key(typeno: Typeno, block_id: Docno) -> Vec<u8> {
    KeyBuilder::new(KeyPrefix::Forward).id(typeno).id(block_id).into_bytes()
}

fn meta_key(block_id: Docno) -> Vec<u8> {
    KeyBuilder::new(KeyPrefix::MetaBlock).id(block_id).into_bytes()
}

fn docset_key(prefix: KeyPrefix, id: u32, block_id: u32) -> Vec<u8> {
    KeyBuilder::new(prefix).id(id).id(block_id).into_bytes()
}

/// Accumulates one document's search-index terms, forward-index terms,
/// metadata, attributes and ACL grants before staging them into the owning
/// `Transaction` (spec.md §4.6 `create_document`).
pub struct DocumentBuilder<'a> {
    txn: &'a mut Transaction,
    docno: Docno,
    is_new: bool,
    index_terms: Vec<(Typeno, Termno, Position)>,
    forward_terms: FxHashMap<Typeno, Vec<ForwardEntry>>,
    metadata: Vec<(String, MetaValue)>,
    attributes: Vec<(String, String)>,
    acl_users: Vec<Userno>,
}

impl<'a> DocumentBuilder<'a> {
    pub fn docno(&self) -> Docno {
        self.docno
    }

    /// Records one occurrence of `value` (of type `type_name`) at
    /// `position` in the search index.
    pub fn index_term(mut self, type_name: &[u8], value: &[u8], position: Position) -> Self {
        let typeno = self.txn.shared.term_type.get_or_create(type_name);
        let termno = self.txn.shared.term_value.get_or_create(value);
        self.index_terms.push((typeno, termno, position));
        self
    }

    /// Records the original term text at `position` for phrase
    /// reconstruction (spec.md §3 "Forward index").
    pub fn forward_term(mut self, type_name: &[u8], position: Position, text: impl Into<String>) -> Self {
        let typeno = self.txn.shared.term_type.get_or_create(type_name);
        self.forward_terms
            .entry(typeno)
            .or_default()
            .push(ForwardEntry { position, text: text.into() });
        self
    }

    pub fn set_metadata(mut self, name: impl Into<String>, value: MetaValue) -> Self {
        self.metadata.push((name.into(), value));
        self
    }

    pub fn set_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn grant_access(mut self, user: &[u8]) -> Self {
        let userno = self.txn.shared.user_name.get_or_create(user);
        self.acl_users.push(userno);
        self
    }

    /// Finalizes this document into the owning transaction.
    pub fn done(self) -> Result<()> {
        let DocumentBuilder {
            txn,
            docno,
            is_new,
            index_terms,
            forward_terms,
            metadata,
            attributes,
            acl_users,
        } = self;
        txn.apply_document(docno, is_new, index_terms, forward_terms, metadata, attributes, acl_users)
    }
}

/// Metadata/attribute/ACL-only edit of an existing document (spec.md §4.6
/// `update_document`): cannot add, remove or alter index or forward
/// entries.
pub struct UpdateBuilder<'a> {
    txn: &'a mut Transaction,
    docno: Docno,
    metadata: Vec<(String, MetaValue)>,
    attributes: Vec<(String, Option<String>)>,
    acl_grants: Vec<Userno>,
    acl_revokes: Vec<Userno>,
}

impl<'a> UpdateBuilder<'a> {
    pub fn docno(&self) -> Docno {
        self.docno
    }

    pub fn set_metadata(mut self, name: impl Into<String>, value: MetaValue) -> Self {
        self.metadata.push((name.into(), value));
        self
    }

    pub fn set_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), Some(value.into())));
        self
    }

    pub fn delete_attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push((name.into(), None));
        self
    }

    pub fn grant_access(mut self, user: &[u8]) -> Self {
        let userno = self.txn.shared.user_name.get_or_create(user);
        self.acl_grants.push(userno);
        self
    }

    pub fn revoke_access(mut self, user: &[u8]) -> Self {
        let userno = self.txn.shared.user_name.look_up(user);
        if userno != 0 {
            self.acl_revokes.push(userno);
        }
        self
    }

    pub fn done(self) -> Result<()> {
        let UpdateBuilder {
            txn,
            docno,
            metadata,
            attributes,
            acl_grants,
            acl_revokes,
        } = self;
        txn.apply_update(docno, metadata, attributes, acl_grants, acl_revokes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::meta::MetaType;
    use crate::client::StorageClient;
    use crate::kv::{Kv, MemKv};

    fn client_with_schema() -> StorageClient {
        let kv: Arc<dyn Kv> = Arc::new(MemKv::new());
        let desc = crate::blocks::meta::MetaDescription::new().with_column("year", MetaType::Int32);
        StorageClient::open(kv, desc)
    }

    #[test]
    fn indexing_a_document_makes_it_searchable() {
        let client = client_with_schema();
        let mut txn = client.create_transaction();
        txn.create_document(b"doc1")
            .index_term(b"word", b"hello", 1)
            .index_term(b"word", b"world", 2)
            .set_metadata("year", MetaValue::Int(2020))
            .done()
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(client.nof_documents(), 1);
        let docno = client.document_number(b"doc1");
        assert_ne!(docno, 0);

        let typeno = client.term_type_number(b"word");
        let termno = client.term_value_number(b"hello");
        let mut it = client.create_term_posting_iterator(typeno, termno);
        assert_eq!(it.skip_doc(1), docno);

        let reader = client.create_metadata_reader();
        assert_eq!(reader.value(docno, "year").unwrap(), Some(MetaValue::Int(2020)));
    }

    #[test]
    fn deleting_a_document_removes_its_postings() {
        let client = client_with_schema();
        let mut txn = client.create_transaction();
        txn.create_document(b"doc1").index_term(b"word", b"hello", 1).done().unwrap();
        txn.commit().unwrap();

        let typeno = client.term_type_number(b"word");
        let termno = client.term_value_number(b"hello");

        let mut txn = client.create_transaction();
        txn.delete_document(b"doc1").unwrap();
        txn.commit().unwrap();

        assert_eq!(client.nof_documents(), 0);
        let mut it = client.create_term_posting_iterator(typeno, termno);
        assert_eq!(it.skip_doc(1), 0);
    }

    #[test]
    fn rollback_discards_buffered_edits() {
        let client = client_with_schema();
        let txn = client.create_transaction();
        txn.rollback();
        assert_eq!(client.nof_documents(), 0);
    }

    #[test]
    fn update_document_cannot_touch_the_index_but_can_change_metadata() {
        let client = client_with_schema();
        let mut txn = client.create_transaction();
        let docno = txn
            .create_document(b"doc1")
            .set_metadata("year", MetaValue::Int(2000))
            .done()
            .map(|_| client.document_number(b"doc1"))
            .unwrap();
        txn.commit().unwrap();

        let mut txn = client.create_transaction();
        txn.update_document(docno).set_metadata("year", MetaValue::Int(2024)).done().unwrap();
        txn.commit().unwrap();

        let reader = client.create_metadata_reader();
        assert_eq!(reader.value(docno, "year").unwrap(), Some(MetaValue::Int(2024)));
    }

    #[test]
    fn acl_grant_makes_document_visible_to_user() {
        let client = client_with_schema();
        let mut txn = client.create_transaction();
        txn.create_document(b"doc1").grant_access(b"alice").done().unwrap();
        txn.commit().unwrap();

        let docno = client.document_number(b"doc1");
        let userno = client.user_number(b"alice");
        let visible = client.create_inverted_acl_iterator(userno).unwrap();
        assert_eq!(visible, vec![docno]);
        let readers = client.create_acl_iterator(docno).unwrap();
        assert_eq!(readers, vec![userno]);
    }
}
