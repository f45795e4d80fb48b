//! Composable units evaluated against a [`DocumentIndex`] inside the
//! enclosing transaction.
//!
//! Create options run in order and the first failure aborts the whole
//! operation. Find options each contribute candidate IDs; the results are
//! concatenated in option order without deduplication.

mod create;
mod find;

pub use create::{
    authorized, authorized_with_org, with_label, with_org, without_label, without_owners,
    CreateOption,
};
pub use find::{
    authorized_where, authorized_where_id, authorized_where_org, include_data, include_labels,
    where_id, where_org, FindOption,
};

pub(crate) use find::resolve_all;

use crate::authz::Authorizer;
use crate::error::{Error, ErrorCode, Result};
use crate::index::DocumentIndex;
use tracing::debug;
use uuid::Uuid;

/// Access check for a single document.
///
/// Identities need membership in one of the organizations owning the
/// document. Tokens need a matching document permission; when `write` is
/// set, read permissions are not considered.
fn authorize_document(
    idx: &dyn DocumentIndex,
    authorizer: &Authorizer,
    doc_id: Uuid,
    write: bool,
) -> Result<()> {
    match authorizer {
        Authorizer::Identity(identity) => {
            for org_id in idx.document_accessors(doc_id)? {
                match idx.is_org_accessor(identity.user_id, org_id) {
                    Ok(()) => return Ok(()),
                    Err(e) if e.code() == ErrorCode::Unauthorized => continue,
                    Err(e) => return Err(e),
                }
            }
            debug!("user {} has no org granting access to document {}", identity.user_id, doc_id);
            Err(denied())
        }
        Authorizer::Token(token) => {
            if !token.is_active() {
                return Err(inactive());
            }
            let owners = idx.document_accessors(doc_id)?;
            let granted = if write {
                token.can_write_document(doc_id, &owners)
            } else {
                token.can_access_document(doc_id, &owners)
            };
            if granted {
                Ok(())
            } else {
                debug!("token {} grants no access to document {}", token.id, doc_id);
                Err(denied())
            }
        }
    }
}

fn denied() -> Error {
    Error::unauthorized("not authorized to access document")
}

fn inactive() -> Error {
    Error::unauthorized("authorization is not active")
}
