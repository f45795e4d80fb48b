use super::{get_json, put_json, scan_json, USER_RESOURCE_MAPPINGS_BUCKET, USER_RESOURCE_MAPPINGS_BY_SUBJECT_BUCKET};
use crate::authz::ResourceType;
use crate::error::{Error, Result};
use crate::id;
use crate::kv::Tx;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Member,
}

/// Kind of subject on the left side of a relation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    User,
    Org,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::User => "user",
            SubjectKind::Org => "org",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(SubjectKind::User),
            "org" => Ok(SubjectKind::Org),
            other => Err(Error::internal(format!("unknown owner type {:?}", other))),
        }
    }
}

/// A subject's role on a resource. The same record models a user's
/// membership in an organization and an organization's (or user's)
/// ownership of a document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResourceMapping {
    #[serde(rename = "userID")]
    pub subject_id: Uuid,
    #[serde(rename = "userType")]
    pub subject_role: Role,
    #[serde(rename = "mappingType")]
    pub subject_kind: SubjectKind,
    #[serde(rename = "resourceType")]
    pub resource_type: ResourceType,
    #[serde(rename = "resourceID")]
    pub resource_id: Uuid,
}

impl UserResourceMapping {
    fn key(&self) -> Vec<u8> {
        id::pair(self.resource_id, self.subject_id)
    }

    fn subject_key(&self) -> Vec<u8> {
        id::pair(self.subject_id, self.resource_id)
    }
}

/// Every set field must match; unset fields match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingFilter {
    pub subject_id: Option<Uuid>,
    pub subject_role: Option<Role>,
    pub subject_kind: Option<SubjectKind>,
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<Uuid>,
}

impl MappingFilter {
    pub fn matches(&self, m: &UserResourceMapping) -> bool {
        self.subject_id.map_or(true, |v| m.subject_id == v)
            && self.subject_role.map_or(true, |v| m.subject_role == v)
            && self.subject_kind.map_or(true, |v| m.subject_kind == v)
            && self.resource_type.map_or(true, |v| m.resource_type == v)
            && self.resource_id.map_or(true, |v| m.resource_id == v)
    }
}

pub fn create_user_resource_mapping(tx: &mut dyn Tx, m: &UserResourceMapping) -> Result<()> {
    let key = m.key();
    if tx.get(USER_RESOURCE_MAPPINGS_BUCKET, &key).is_ok() {
        return Err(Error::internal(format!(
            "mapping for {} {} on {} {} already exists",
            m.subject_kind, m.subject_id, m.resource_type, m.resource_id
        )));
    }
    put_json(tx, USER_RESOURCE_MAPPINGS_BUCKET, &key, m)?;
    tx.put(USER_RESOURCE_MAPPINGS_BY_SUBJECT_BUCKET, &m.subject_key(), Vec::new())
}

pub fn find_user_resource_mappings(
    tx: &dyn Tx,
    filter: &MappingFilter,
) -> Result<Vec<UserResourceMapping>> {
    let candidates: Vec<UserResourceMapping> = match (filter.resource_id, filter.subject_id) {
        (Some(resource_id), _) => tx
            .cursor_prefix(USER_RESOURCE_MAPPINGS_BUCKET, resource_id.as_bytes())?
            .map(|(_, v)| serde_json::from_slice(&v).map_err(Into::into))
            .collect::<Result<_>>()?,
        (None, Some(subject_id)) => tx
            .cursor_prefix(USER_RESOURCE_MAPPINGS_BY_SUBJECT_BUCKET, subject_id.as_bytes())?
            .map(|(k, _)| {
                let resource_id = id::decode(k.get(id::ID_LEN..).unwrap_or_default())?;
                get_json(tx, USER_RESOURCE_MAPPINGS_BUCKET, &id::pair(resource_id, subject_id))
            })
            .collect::<Result<_>>()?,
        (None, None) => scan_json(tx, USER_RESOURCE_MAPPINGS_BUCKET)?,
    };
    Ok(candidates.into_iter().filter(|m| filter.matches(m)).collect())
}

/// Delete every mapping matching `filter`; `NotFound` if none does.
pub fn delete_user_resource_mappings(tx: &mut dyn Tx, filter: &MappingFilter) -> Result<usize> {
    let found = find_user_resource_mappings(tx, filter)?;
    if found.is_empty() {
        return Err(Error::not_found("user resource mapping"));
    }
    for m in &found {
        tx.delete(USER_RESOURCE_MAPPINGS_BUCKET, &m.key())?;
        tx.delete(USER_RESOURCE_MAPPINGS_BY_SUBJECT_BUCKET, &m.subject_key())?;
    }
    Ok(found.len())
}
