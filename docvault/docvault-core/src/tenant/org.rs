use super::{get_json, put_json, scan_json, ORGANIZATIONS_BUCKET, USERS_BUCKET};
use crate::error::{Error, Result};
use crate::id;
use crate::kv::Tx;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct OrganizationFilter {
    pub id: Option<Uuid>,
    pub name: Option<String>,
}

impl OrganizationFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    fn matches(&self, org: &Organization) -> bool {
        self.id.map_or(true, |id| org.id == id)
            && self.name.as_deref().map_or(true, |name| org.name == name)
    }
}

pub fn put_organization(tx: &mut dyn Tx, org: &Organization) -> Result<()> {
    put_json(tx, ORGANIZATIONS_BUCKET, &id::encode(org.id), org)
}

pub fn find_organization_by_id(tx: &dyn Tx, org_id: Uuid) -> Result<Organization> {
    get_json(tx, ORGANIZATIONS_BUCKET, &id::encode(org_id)).map_err(|e| match e {
        Error::NotFound(_) => Error::not_found(format!("organization {}", org_id)),
        other => other,
    })
}

pub fn find_organizations(tx: &dyn Tx, filter: &OrganizationFilter) -> Result<Vec<Organization>> {
    if let Some(org_id) = filter.id {
        return match find_organization_by_id(tx, org_id) {
            Ok(org) if filter.matches(&org) => Ok(vec![org]),
            Ok(_) | Err(Error::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        };
    }
    let orgs: Vec<Organization> = scan_json(tx, ORGANIZATIONS_BUCKET)?;
    Ok(orgs.into_iter().filter(|o| filter.matches(o)).collect())
}

pub fn put_user(tx: &mut dyn Tx, user: &User) -> Result<()> {
    put_json(tx, USERS_BUCKET, &id::encode(user.id), user)
}

pub fn find_user_by_id(tx: &dyn Tx, user_id: Uuid) -> Result<User> {
    get_json(tx, USERS_BUCKET, &id::encode(user_id)).map_err(|e| match e {
        Error::NotFound(_) => Error::not_found(format!("user {}", user_id)),
        other => other,
    })
}
