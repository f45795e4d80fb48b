//! Identities, tokens and permission matching.
//!
//! Nothing in this module touches storage: callers pass in the owning
//! organizations of a document and get a yes/no answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Documents,
    Orgs,
    Users,
    Labels,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Documents => "documents",
            ResourceType::Orgs => "orgs",
            ResourceType::Users => "users",
            ResourceType::Labels => "labels",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
}

/// What a permission applies to. With neither `id` nor `org_id` set the
/// resource stands for every resource of its type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "orgID")]
    pub org_id: Option<Uuid>,
}

impl Resource {
    pub fn all(kind: ResourceType) -> Self {
        Self {
            kind,
            id: None,
            org_id: None,
        }
    }

    pub fn in_org(kind: ResourceType, org_id: Uuid) -> Self {
        Self {
            kind,
            id: None,
            org_id: Some(org_id),
        }
    }

    pub fn with_id(kind: ResourceType, id: Uuid) -> Self {
        Self {
            kind,
            id: Some(id),
            org_id: None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.id.is_none() && self.org_id.is_none()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Permission {
    pub action: Action,
    pub resource: Resource,
}

impl Permission {
    pub fn new(action: Action, resource: Resource) -> Self {
        Self { action, resource }
    }

    /// Whether this granted permission covers `requested`: same action and
    /// type, and either a wildcard grant or a matching org or id scope.
    pub fn matches(&self, requested: &Permission) -> bool {
        if self.action != requested.action || self.resource.kind != requested.resource.kind {
            return false;
        }
        if self.resource.is_wildcard() {
            return true;
        }
        if let (Some(granted), None) = (self.resource.org_id, self.resource.id) {
            if requested.resource.org_id == Some(granted) {
                return true;
            }
        }
        if let Some(granted) = self.resource.id {
            if requested.resource.id == Some(granted) {
                return true;
            }
        }
        false
    }

    /// Whether this permission reaches document `doc_id`, given the
    /// organizations currently owning it.
    fn reaches_document(&self, doc_id: Uuid, owners: &[Uuid]) -> bool {
        let resource = &self.resource;
        if resource.kind != ResourceType::Documents {
            return false;
        }
        if resource.id == Some(doc_id) {
            return true;
        }
        if resource.is_wildcard() {
            return true;
        }
        matches!(resource.org_id, Some(org) if owners.contains(&org))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

/// A token carrying an ordered list of granted permissions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Authorization {
    pub id: Uuid,
    #[serde(rename = "userID")]
    pub user_id: Uuid,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub permissions: Vec<Permission>,
}

impl Authorization {
    pub fn new(user_id: Uuid, permissions: Vec<Permission>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: Status::Active,
            expires_at: None,
            permissions,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == Status::Active && self.expires_at.map_or(true, |exp| now < exp)
    }

    /// Whether an active token holds a permission covering `requested`.
    pub fn allowed(&self, requested: &Permission) -> bool {
        self.is_active() && self.permissions.iter().any(|p| p.matches(requested))
    }

    /// Whether an active token holds exactly `requested`, without wildcard
    /// fallback.
    pub fn grants_exactly(&self, requested: &Permission) -> bool {
        self.is_active() && self.permissions.iter().any(|p| p == requested)
    }

    /// Write-class access to a document: read permissions never count.
    pub fn can_write_document(&self, doc_id: Uuid, owners: &[Uuid]) -> bool {
        self.is_active()
            && self
                .permissions
                .iter()
                .filter(|p| p.action != Action::Read)
                .any(|p| p.reaches_document(doc_id, owners))
    }

    /// Any access to a document, whatever the action.
    pub fn can_access_document(&self, doc_id: Uuid, owners: &[Uuid]) -> bool {
        self.is_active()
            && self
                .permissions
                .iter()
                .any(|p| p.reaches_document(doc_id, owners))
    }

    /// Organizations named by org-scoped document permissions, in
    /// permission order.
    pub fn document_orgs(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.document_permissions().filter_map(|p| p.resource.org_id)
    }

    /// Documents named directly by id-scoped permissions, in permission order.
    pub fn document_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.document_permissions().filter_map(|p| p.resource.id)
    }

    fn document_permissions(&self) -> impl Iterator<Item = &Permission> + '_ {
        self.permissions
            .iter()
            .filter(|p| p.resource.kind == ResourceType::Documents)
    }
}

/// An ambient, already-authenticated user. Access is decided by
/// organization membership instead of a permission list.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    #[serde(rename = "userID")]
    pub user_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Authorizer {
    Token(Authorization),
    Identity(Identity),
}

impl Authorizer {
    pub fn user_id(&self) -> Uuid {
        match self {
            Authorizer::Token(a) => a.user_id,
            Authorizer::Identity(i) => i.user_id,
        }
    }
}

impl From<Authorization> for Authorizer {
    fn from(a: Authorization) -> Self {
        Authorizer::Token(a)
    }
}

impl From<Identity> for Authorizer {
    fn from(i: Identity) -> Self {
        Authorizer::Identity(i)
    }
}
