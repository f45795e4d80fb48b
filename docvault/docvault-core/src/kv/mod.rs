//! Byte-keyed bucket storage with atomic multi-bucket transactions.
//!
//! The document layer only talks to the [`Store`] and [`Tx`] traits, so any
//! engine offering ordered buckets and all-or-nothing commits can back it.
//! [`MemStore`] is the bundled engine.

mod memory;

pub use memory::MemStore;

use crate::error::Result;

/// Ordered iterator over `(key, value)` pairs of one bucket.
pub type Cursor<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

/// A read or write transaction. Dropping a transaction without calling
/// [`Tx::commit`] rolls back everything it wrote.
pub trait Tx {
    /// Create `bucket` if it does not exist yet.
    fn create_bucket(&mut self, bucket: &str) -> Result<()>;

    fn has_bucket(&self, bucket: &str) -> bool;

    /// Fails with `NotFound` if the bucket or the key is missing.
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Vec<u8>>;

    fn put(&mut self, bucket: &str, key: &[u8], value: Vec<u8>) -> Result<()>;

    /// Deleting a missing key is not an error.
    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<()>;

    fn cursor(&self, bucket: &str) -> Result<Cursor<'_>>;

    /// Entries whose key starts with `prefix`, in key order.
    fn cursor_prefix(&self, bucket: &str, prefix: &[u8]) -> Result<Cursor<'_>> {
        let skip = prefix.to_vec();
        let take = prefix.to_vec();
        Ok(Box::new(
            self.cursor(bucket)?
                .skip_while(move |(k, _)| k.as_slice() < skip.as_slice())
                .take_while(move |(k, _)| k.starts_with(&take)),
        ))
    }

    fn commit(self: Box<Self>) -> Result<()>;
}

pub trait Store: Send + Sync {
    fn begin(&self, writable: bool) -> Result<Box<dyn Tx + '_>>;
}

/// Closure-scoped transactions on top of [`Store::begin`].
pub trait StoreExt: Store {
    /// Run `f` in a read-only transaction.
    fn view<T>(&self, f: impl FnOnce(&mut dyn Tx) -> Result<T>) -> Result<T> {
        let mut tx = self.begin(false)?;
        f(tx.as_mut())
    }

    /// Run `f` in a write transaction, committing only if it returns `Ok`.
    fn update<T>(&self, f: impl FnOnce(&mut dyn Tx) -> Result<T>) -> Result<T> {
        let mut tx = self.begin(true)?;
        let out = f(tx.as_mut())?;
        tx.commit()?;
        Ok(out)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
