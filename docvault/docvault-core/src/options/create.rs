use super::{authorize_document, denied, inactive};
use crate::authz::{Action, Authorizer, Permission, Resource, ResourceType};
use crate::error::Result;
use crate::index::DocumentIndex;
use crate::tenant::SubjectKind;
use tracing::debug;
use uuid::Uuid;

/// A step run against a document while it is created or updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOption {
    /// Make the named organization an owner. No permission check.
    WithOrg(String),
    WithLabel(String),
    WithoutLabel(String),
    /// Remove every organization currently owning the document.
    WithoutOwners,
    /// Require write access to the document as it stands.
    Authorized(Authorizer),
    /// Require write access to the named organization, then make it an owner.
    AuthorizedWithOrg(Authorizer, String),
}

pub fn with_org(name: impl Into<String>) -> CreateOption {
    CreateOption::WithOrg(name.into())
}

pub fn with_label(name: impl Into<String>) -> CreateOption {
    CreateOption::WithLabel(name.into())
}

pub fn without_label(name: impl Into<String>) -> CreateOption {
    CreateOption::WithoutLabel(name.into())
}

pub fn without_owners() -> CreateOption {
    CreateOption::WithoutOwners
}

pub fn authorized(authorizer: impl Into<Authorizer>) -> CreateOption {
    CreateOption::Authorized(authorizer.into())
}

pub fn authorized_with_org(authorizer: impl Into<Authorizer>, org: impl Into<String>) -> CreateOption {
    CreateOption::AuthorizedWithOrg(authorizer.into(), org.into())
}

impl CreateOption {
    pub fn apply(&self, doc_id: Uuid, idx: &mut dyn DocumentIndex) -> Result<()> {
        match self {
            CreateOption::WithOrg(name) => add_org_owner(idx, doc_id, name),
            CreateOption::WithLabel(name) => {
                let label_id = idx.find_label_by_name(name)?;
                idx.add_document_label(doc_id, label_id)
            }
            CreateOption::WithoutLabel(name) => {
                let label_id = idx.find_label_by_name(name)?;
                idx.remove_document_label(doc_id, label_id)
            }
            CreateOption::WithoutOwners => remove_owners(idx, doc_id),
            CreateOption::Authorized(authorizer) => authorize_document(idx, authorizer, doc_id, true),
            CreateOption::AuthorizedWithOrg(authorizer, name) => {
                authorize_with_org(idx, authorizer, doc_id, name)
            }
        }
    }
}

fn add_org_owner(idx: &mut dyn DocumentIndex, doc_id: Uuid, name: &str) -> Result<()> {
    let org_id = idx.find_organization_by_name(name)?;
    idx.add_document_owner(doc_id, SubjectKind::Org, org_id)
}

fn remove_owners(idx: &mut dyn DocumentIndex, doc_id: Uuid) -> Result<()> {
    for org_id in idx.document_accessors(doc_id)? {
        idx.remove_document_owner(doc_id, SubjectKind::Org, org_id)?;
    }
    Ok(())
}

fn authorize_with_org(
    idx: &mut dyn DocumentIndex,
    authorizer: &Authorizer,
    doc_id: Uuid,
    name: &str,
) -> Result<()> {
    let org_id = idx.find_organization_by_name(name)?;
    match authorizer {
        Authorizer::Identity(identity) => idx.is_org_accessor(identity.user_id, org_id)?,
        Authorizer::Token(token) => {
            if !token.is_active() {
                return Err(inactive());
            }
            let wanted = Permission::new(Action::Write, Resource::in_org(ResourceType::Documents, org_id));
            if !token.grants_exactly(&wanted) {
                debug!("token {} cannot write documents of org {}", token.id, org_id);
                return Err(denied());
            }
        }
    }
    idx.add_document_owner(doc_id, SubjectKind::Org, org_id)
}
