//! Namespaced document storage with a transaction-scoped ownership and
//! authorization pipeline.

pub mod authz;
pub mod config;
pub mod decorator;
pub mod document;
pub mod error;
pub mod id;
pub mod index;
pub mod kv;
pub mod options;
pub mod service;
pub mod tenant;
pub mod wal;

pub use authz::{Action, Authorization, Authorizer, Identity, Permission, Resource, ResourceType};
pub use document::{Document, DocumentMeta, DocumentStore};
pub use error::{Error, ErrorCode, Result};
pub use options::{CreateOption, FindOption};
pub use service::Service;
