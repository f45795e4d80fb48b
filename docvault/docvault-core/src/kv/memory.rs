//! In-memory store with snapshot reads and a single writer.
//!
//! State is an immutable `Arc` snapshot. Readers clone the `Arc`; the writer
//! clones it too and copies each bucket on first write, then swaps the new
//! snapshot in on commit. When opened with a [`Config`], every commit is
//! appended to the write-ahead log before it is published.

use super::{Cursor, Store, Tx};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::wal::{Operation, WriteAheadLog};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tracing::info;

type Bucket = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Clone, Default)]
struct State {
    buckets: HashMap<String, Arc<Bucket>>,
}

impl State {
    fn apply(&mut self, op: &Operation) {
        match op {
            Operation::CreateBucket { bucket } => {
                self.buckets.entry(bucket.clone()).or_default();
            }
            Operation::Put { bucket, key, value } => {
                let b = self.buckets.entry(bucket.clone()).or_default();
                Arc::make_mut(b).insert(key.clone(), value.clone());
            }
            Operation::Delete { bucket, key } => {
                if let Some(b) = self.buckets.get_mut(bucket) {
                    Arc::make_mut(b).remove(key);
                }
            }
        }
    }

    fn bucket(&self, name: &str) -> Result<&Bucket> {
        self.buckets
            .get(name)
            .map(|b| b.as_ref())
            .ok_or_else(|| bucket_not_found(name))
    }
}

fn bucket_not_found(name: &str) -> Error {
    Error::NotFound(format!("bucket {} not found", name))
}

pub struct MemStore {
    state: RwLock<Arc<State>>,
    writer: Mutex<()>,
    wal: Option<WriteAheadLog>,
}

impl MemStore {
    /// A volatile store; everything is lost when it is dropped.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(Arc::new(State::default())),
            writer: Mutex::new(()),
            wal: None,
        }
    }

    /// Open a durable store under `config.data_dir`, replaying the WAL.
    pub fn open(config: &Config) -> Result<Self> {
        let wal = WriteAheadLog::open(config.wal_dir(), config.wal_segment_size, config.sync_writes)?;
        let entries = wal.read_from(0)?;

        let mut state = State::default();
        for entry in &entries {
            for op in &entry.ops {
                state.apply(op);
            }
        }
        info!(
            "replayed {} transactions into {} buckets from {}",
            entries.len(),
            state.buckets.len(),
            config.data_dir.display()
        );

        Ok(Self {
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            wal: Some(wal),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }
}

impl Store for MemStore {
    /// Write transactions are serialized; beginning a second one on the same
    /// thread while the first is alive deadlocks.
    fn begin(&self, writable: bool) -> Result<Box<dyn Tx + '_>> {
        let guard = if writable {
            Some(self.writer.lock())
        } else {
            None
        };
        let state = self.state.read().clone();
        Ok(Box::new(MemTx {
            store: self,
            state,
            writable,
            ops: Vec::new(),
            _guard: guard,
        }))
    }
}

struct MemTx<'a> {
    store: &'a MemStore,
    state: Arc<State>,
    writable: bool,
    ops: Vec<Operation>,
    _guard: Option<MutexGuard<'a, ()>>,
}

impl MemTx<'_> {
    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::internal("transaction is not writable"))
        }
    }

    fn logging(&self) -> bool {
        self.store.wal.is_some()
    }
}

impl Tx for MemTx<'_> {
    fn create_bucket(&mut self, bucket: &str) -> Result<()> {
        self.ensure_writable()?;
        if self.state.buckets.contains_key(bucket) {
            return Ok(());
        }
        let op = Operation::CreateBucket {
            bucket: bucket.to_string(),
        };
        Arc::make_mut(&mut self.state).apply(&op);
        if self.logging() {
            self.ops.push(op);
        }
        Ok(())
    }

    fn has_bucket(&self, bucket: &str) -> bool {
        self.state.buckets.contains_key(bucket)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Vec<u8>> {
        self.state
            .bucket(bucket)?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("key not found in {}", bucket)))
    }

    fn put(&mut self, bucket: &str, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.ensure_writable()?;
        let logging = self.logging();
        let b = Arc::make_mut(&mut self.state)
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| bucket_not_found(bucket))?;
        if logging {
            Arc::make_mut(b).insert(key.to_vec(), value.clone());
            self.ops.push(Operation::Put {
                bucket: bucket.to_string(),
                key: key.to_vec(),
                value,
            });
        } else {
            Arc::make_mut(b).insert(key.to_vec(), value);
        }
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.state.bucket(bucket)?;
        let op = Operation::Delete {
            bucket: bucket.to_string(),
            key: key.to_vec(),
        };
        Arc::make_mut(&mut self.state).apply(&op);
        if self.logging() {
            self.ops.push(op);
        }
        Ok(())
    }

    fn cursor(&self, bucket: &str) -> Result<Cursor<'_>> {
        let b = self.state.bucket(bucket)?;
        Ok(Box::new(b.iter().map(|(k, v)| (k.clone(), v.clone()))))
    }

    fn cursor_prefix(&self, bucket: &str, prefix: &[u8]) -> Result<Cursor<'_>> {
        let b = self.state.bucket(bucket)?;
        let prefix = prefix.to_vec();
        let range = b.range::<[u8], _>((Bound::Included(prefix.as_slice()), Bound::Unbounded));
        Ok(Box::new(
            range
                .take_while(move |(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone())),
        ))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemTx {
            store,
            state,
            writable,
            ops,
            _guard,
        } = *self;
        if !writable {
            return Ok(());
        }
        if let Some(wal) = &store.wal {
            if !ops.is_empty() {
                wal.append(ops)?;
            }
        }
        *store.state.write() = state;
        Ok(())
    }
}
