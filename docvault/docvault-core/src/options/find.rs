use super::{authorize_document, denied, inactive};
use crate::authz::{Action, Authorization, Authorizer, Identity, Permission, Resource, ResourceType};
use crate::decorator::DocumentDecorator;
use crate::error::Result;
use crate::index::DocumentIndex;
use crate::tenant::SubjectKind;
use tracing::debug;
use uuid::Uuid;

/// A step contributing candidate document IDs (or hydration flags) to a
/// find or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOption {
    /// Every document owned by the named organization.
    WhereOrg(String),
    WhereId(Uuid),
    /// Every document the authorizer can reach.
    AuthorizedWhere(Authorizer),
    AuthorizedWhereOrg(Authorizer, String),
    AuthorizedWhereId(Authorizer, Uuid),
    IncludeData,
    IncludeLabels,
}

pub fn where_org(name: impl Into<String>) -> FindOption {
    FindOption::WhereOrg(name.into())
}

pub fn where_id(id: Uuid) -> FindOption {
    FindOption::WhereId(id)
}

pub fn authorized_where(authorizer: impl Into<Authorizer>) -> FindOption {
    FindOption::AuthorizedWhere(authorizer.into())
}

pub fn authorized_where_org(authorizer: impl Into<Authorizer>, org: impl Into<String>) -> FindOption {
    FindOption::AuthorizedWhereOrg(authorizer.into(), org.into())
}

pub fn authorized_where_id(authorizer: impl Into<Authorizer>, id: Uuid) -> FindOption {
    FindOption::AuthorizedWhereId(authorizer.into(), id)
}

pub fn include_data() -> FindOption {
    FindOption::IncludeData
}

pub fn include_labels() -> FindOption {
    FindOption::IncludeLabels
}

impl FindOption {
    /// Append this option's IDs to `found`. Nothing is appended on error.
    pub fn resolve(
        &self,
        idx: &mut dyn DocumentIndex,
        dec: &mut DocumentDecorator,
        found: &mut Vec<Uuid>,
    ) -> Result<()> {
        let ids = match self {
            FindOption::WhereOrg(name) => {
                let org_id = idx.find_organization_by_name(name)?;
                idx.accessor_documents(SubjectKind::Org, org_id)?
            }
            FindOption::WhereId(id) => vec![*id],
            FindOption::AuthorizedWhere(Authorizer::Identity(identity)) => {
                identity_documents(idx, identity)?
            }
            FindOption::AuthorizedWhere(Authorizer::Token(token)) => token_documents(idx, token)?,
            FindOption::AuthorizedWhereOrg(authorizer, name) => org_documents(idx, authorizer, name)?,
            FindOption::AuthorizedWhereId(authorizer, id) => {
                authorize_document(idx, authorizer, *id, false)?;
                vec![*id]
            }
            FindOption::IncludeData => {
                dec.include_data()?;
                Vec::new()
            }
            FindOption::IncludeLabels => {
                dec.include_labels()?;
                Vec::new()
            }
        };
        found.extend(ids);
        Ok(())
    }
}

/// Run every option in order, returning the concatenated IDs.
pub(crate) fn resolve_all(
    opts: &[FindOption],
    idx: &mut dyn DocumentIndex,
    dec: &mut DocumentDecorator,
) -> Result<Vec<Uuid>> {
    let mut found = Vec::new();
    for opt in opts {
        opt.resolve(idx, dec, &mut found)?;
    }
    Ok(found)
}

fn identity_documents(idx: &dyn DocumentIndex, identity: &Identity) -> Result<Vec<Uuid>> {
    let mut ids = idx.accessor_documents(SubjectKind::User, identity.user_id)?;
    for org_id in idx.user_orgs(identity.user_id)? {
        ids.extend(idx.accessor_documents(SubjectKind::Org, org_id)?);
    }
    Ok(ids)
}

/// Documents reachable through org-scoped permissions, then those named
/// directly by id. Wildcard permissions do not enumerate anything.
fn token_documents(idx: &dyn DocumentIndex, token: &Authorization) -> Result<Vec<Uuid>> {
    if !token.is_active() {
        return Err(inactive());
    }
    let mut ids = Vec::new();
    for org_id in token.document_orgs() {
        ids.extend(idx.accessor_documents(SubjectKind::Org, org_id)?);
    }
    ids.extend(token.document_ids());
    Ok(ids)
}

fn org_documents(idx: &dyn DocumentIndex, authorizer: &Authorizer, name: &str) -> Result<Vec<Uuid>> {
    let org_id = idx.find_organization_by_name(name)?;
    match authorizer {
        Authorizer::Identity(identity) => idx.is_org_accessor(identity.user_id, org_id)?,
        Authorizer::Token(token) => {
            if !token.is_active() {
                return Err(inactive());
            }
            let wanted = Permission::new(Action::Read, Resource::in_org(ResourceType::Documents, org_id));
            if !token.allowed(&wanted) {
                debug!("token {} cannot read documents of org {}", token.id, org_id);
                return Err(denied());
            }
        }
    }
    idx.accessor_documents(SubjectKind::Org, org_id)
}
