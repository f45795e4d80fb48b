//! Identifier generation and the fixed key encoding used in every bucket.

use crate::error::{Error, Result};
use uuid::Uuid;

/// Length of an encoded identifier key.
pub const ID_LEN: usize = 16;

/// Source of fresh identifiers. Generation is not transactional: an aborted
/// create leaves its identifier unused.
pub trait IdGenerator: Send + Sync {
    fn id(&self) -> Uuid;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

pub fn encode(id: Uuid) -> [u8; ID_LEN] {
    id.into_bytes()
}

pub fn decode(key: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(key)
        .map_err(|_| Error::Invalid(format!("malformed id key of {} bytes", key.len())))
}

/// Concatenation of two encoded identifiers, used for relation keys.
pub(crate) fn pair(first: Uuid, second: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2);
    key.extend_from_slice(first.as_bytes());
    key.extend_from_slice(second.as_bytes());
    key
}
