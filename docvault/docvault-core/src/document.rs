//! Namespaced documents and the store that runs the option pipeline.
//!
//! Meta and data live in two buckets under the same key, so listing a
//! namespace never decodes payloads.

use crate::decorator::DocumentDecorator;
use crate::error::{Error, Result};
use crate::id::{self, IdGenerator};
use crate::index::TxIndex;
use crate::kv::{Store, StoreExt, Tx};
use crate::options::{self, CreateOption, FindOption};
use crate::tenant::{self, Label};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl DocumentMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub meta: DocumentMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Populated by finds that ask for labels; ignored on writes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

impl Document {
    /// A document not yet stored. Its id is assigned on create.
    pub fn new(meta: DocumentMeta, data: Option<Value>) -> Self {
        Self {
            id: Uuid::nil(),
            meta,
            data,
            labels: Vec::new(),
        }
    }
}

/// Bucket names `(data, meta)` for a namespace.
pub(crate) fn bucket_names(namespace: &str) -> (String, String) {
    let ns = namespace.trim_end_matches('/');
    if ns.is_empty() {
        ("documents/data".to_string(), "documents/meta".to_string())
    } else {
        (format!("{}/documents/data", ns), format!("{}/documents/meta", ns))
    }
}

/// Documents of one namespace. Every call runs in exactly one transaction.
pub struct DocumentStore {
    store: Arc<dyn Store>,
    ids: Arc<dyn IdGenerator>,
    namespace: String,
    data_bucket: String,
    meta_bucket: String,
}

impl DocumentStore {
    pub(crate) fn new(store: Arc<dyn Store>, ids: Arc<dyn IdGenerator>, namespace: &str) -> Self {
        let (data_bucket, meta_bucket) = bucket_names(namespace);
        Self {
            store,
            ids,
            namespace: namespace.to_string(),
            data_bucket,
            meta_bucket,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Store `doc` under a fresh id and run `opts` against it. `doc.id` is
    /// set only once the transaction has committed.
    pub fn create_document(&self, doc: &mut Document, opts: &[CreateOption]) -> Result<()> {
        let doc_id = self.ids.id();
        self.store.update(|tx| {
            self.put_document(tx, doc_id, &doc.meta, doc.data.as_ref())?;
            let mut idx = TxIndex::writable(tx);
            for opt in opts {
                opt.apply(doc_id, &mut idx)?;
            }
            Ok(())
        })?;
        doc.id = doc_id;
        info!("created document {} in {:?}", doc_id, self.namespace);
        Ok(())
    }

    /// Run `opts`, then replace meta and data of an existing document.
    pub fn update_document(&self, doc: &Document, opts: &[CreateOption]) -> Result<()> {
        self.store.update(|tx| {
            {
                let mut idx = TxIndex::writable(tx);
                for opt in opts {
                    opt.apply(doc.id, &mut idx)?;
                }
            }
            self.find_meta(tx, doc.id)?;
            self.put_document(tx, doc.id, &doc.meta, doc.data.as_ref())
        })?;
        info!("updated document {} in {:?}", doc.id, self.namespace);
        Ok(())
    }

    /// With no options, lists the meta of every document in the namespace.
    /// Otherwise returns the documents selected by `opts` in option order,
    /// duplicates included. Selected ids without a document are skipped.
    pub fn find_documents(&self, opts: &[FindOption]) -> Result<Vec<Document>> {
        let docs = self.store.view(|tx| {
            if opts.is_empty() {
                return self.list_documents(tx);
            }

            let mut dec = DocumentDecorator::default();
            let ids = {
                let mut idx = TxIndex::read_only(tx);
                options::resolve_all(opts, &mut idx, &mut dec)?
            };

            let mut docs = Vec::with_capacity(ids.len());
            for doc_id in ids {
                let meta = match self.find_meta(tx, doc_id) {
                    Ok(meta) => meta,
                    Err(Error::NotFound(_)) => continue,
                    Err(e) => return Err(e),
                };
                let mut doc = Document::new(meta, None);
                doc.id = doc_id;
                if dec.wants_data() {
                    doc.data = self.find_data(tx, doc_id)?;
                }
                if dec.wants_labels() {
                    doc.labels = tenant::find_resource_labels(tx, doc_id)?;
                }
                docs.push(doc);
            }
            Ok(docs)
        })?;
        debug!("found {} documents in {:?}", docs.len(), self.namespace);
        Ok(docs)
    }

    /// Delete every document selected by `opts` together with all of its
    /// ownership and label relations. Returns the number deleted.
    pub fn delete_documents(&self, opts: &[FindOption]) -> Result<usize> {
        let deleted = self.store.update(|tx| {
            let ids = {
                let mut idx = TxIndex::writable(tx);
                let mut dec = DocumentDecorator::writable();
                options::resolve_all(opts, &mut idx, &mut dec)?
            };
            for &doc_id in &ids {
                {
                    let mut idx = TxIndex::writable(tx);
                    CreateOption::WithoutOwners.apply(doc_id, &mut idx)?;
                }
                tenant::purge_resource_relations(tx, doc_id)?;
                self.delete_document(tx, doc_id)?;
            }
            Ok(ids.len())
        })?;
        info!("deleted {} documents from {:?}", deleted, self.namespace);
        Ok(deleted)
    }

    fn put_document(
        &self,
        tx: &mut dyn Tx,
        doc_id: Uuid,
        meta: &DocumentMeta,
        data: Option<&Value>,
    ) -> Result<()> {
        let key = id::encode(doc_id);
        tx.put(&self.meta_bucket, &key, serde_json::to_vec(meta)?)?;
        tx.put(&self.data_bucket, &key, serde_json::to_vec(&data)?)
    }

    fn find_meta(&self, tx: &dyn Tx, doc_id: Uuid) -> Result<DocumentMeta> {
        let raw = tx
            .get(&self.meta_bucket, &id::encode(doc_id))
            .map_err(|e| match e {
                Error::NotFound(_) => Error::not_found(format!("document {}", doc_id)),
                other => other,
            })?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn find_data(&self, tx: &dyn Tx, doc_id: Uuid) -> Result<Option<Value>> {
        let raw = tx
            .get(&self.data_bucket, &id::encode(doc_id))
            .map_err(|e| match e {
                Error::NotFound(_) => Error::not_found(format!("data of document {}", doc_id)),
                other => other,
            })?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn list_documents(&self, tx: &dyn Tx) -> Result<Vec<Document>> {
        tx.cursor(&self.meta_bucket)?
            .map(|(k, v)| -> Result<Document> {
                let mut doc = Document::new(serde_json::from_slice(&v)?, None);
                doc.id = id::decode(&k)?;
                Ok(doc)
            })
            .collect()
    }

    fn delete_document(&self, tx: &mut dyn Tx, doc_id: Uuid) -> Result<()> {
        self.find_meta(tx, doc_id)?;
        let key = id::encode(doc_id);
        tx.delete(&self.meta_bucket, &key)?;
        tx.delete(&self.data_bucket, &key)
    }
}
