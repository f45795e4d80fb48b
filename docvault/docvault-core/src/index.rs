//! Transaction-bound view of document ownership, labels and org membership.
//!
//! An index is either writable (bound to a mutation) or read-only. Writable
//! indexes only see `Owner` relations: changing who may touch a document
//! requires proven ownership, while reading it only requires some relation.

use crate::authz::ResourceType;
use crate::error::{Error, Result};
use crate::kv::Tx;
use crate::tenant::{
    self, LabelFilter, LabelMapping, MappingFilter, OrganizationFilter, Role, SubjectKind,
    UserResourceMapping,
};
use uuid::Uuid;

/// Capability handed to every create and find option.
pub trait DocumentIndex {
    fn add_document_owner(&mut self, doc_id: Uuid, kind: SubjectKind, owner_id: Uuid) -> Result<()>;
    fn remove_document_owner(&mut self, doc_id: Uuid, kind: SubjectKind, owner_id: Uuid) -> Result<()>;

    /// Documents the given owner has a relation to.
    fn accessor_documents(&self, kind: SubjectKind, owner_id: Uuid) -> Result<Vec<Uuid>>;
    /// Organizations with a relation to the document.
    fn document_accessors(&self, doc_id: Uuid) -> Result<Vec<Uuid>>;

    fn user_orgs(&self, user_id: Uuid) -> Result<Vec<Uuid>>;
    /// `Ok` iff the user is an owner or member of the org, else `Unauthorized`.
    fn is_org_accessor(&self, user_id: Uuid, org_id: Uuid) -> Result<()>;

    fn find_organization_by_name(&self, name: &str) -> Result<Uuid>;
    fn find_label_by_name(&self, name: &str) -> Result<Uuid>;

    fn add_document_label(&mut self, doc_id: Uuid, label_id: Uuid) -> Result<()>;
    fn remove_document_label(&mut self, doc_id: Uuid, label_id: Uuid) -> Result<()>;
}

pub struct TxIndex<'a> {
    tx: &'a mut dyn Tx,
    writable: bool,
}

impl<'a> TxIndex<'a> {
    pub fn read_only(tx: &'a mut dyn Tx) -> Self {
        Self { tx, writable: false }
    }

    pub fn writable(tx: &'a mut dyn Tx) -> Self {
        Self { tx, writable: true }
    }

    fn role_filter(&self) -> Option<Role> {
        self.writable.then_some(Role::Owner)
    }

    fn owner_exists(&self, kind: SubjectKind, owner_id: Uuid) -> Result<()> {
        match kind {
            SubjectKind::Org => tenant::find_organization_by_id(&*self.tx, owner_id).map(|_| ()),
            SubjectKind::User => tenant::find_user_by_id(&*self.tx, owner_id).map(|_| ()),
        }
    }

    fn mappings(&self, filter: MappingFilter) -> Result<Vec<UserResourceMapping>> {
        tenant::find_user_resource_mappings(&*self.tx, &filter)
    }
}

impl DocumentIndex for TxIndex<'_> {
    fn add_document_owner(&mut self, doc_id: Uuid, kind: SubjectKind, owner_id: Uuid) -> Result<()> {
        self.owner_exists(kind, owner_id)?;
        let m = UserResourceMapping {
            subject_id: owner_id,
            subject_role: Role::Owner,
            subject_kind: kind,
            resource_type: ResourceType::Documents,
            resource_id: doc_id,
        };
        tenant::create_user_resource_mapping(&mut *self.tx, &m)
    }

    fn remove_document_owner(&mut self, doc_id: Uuid, kind: SubjectKind, owner_id: Uuid) -> Result<()> {
        let filter = MappingFilter {
            subject_id: Some(owner_id),
            subject_role: self.role_filter(),
            subject_kind: Some(kind),
            resource_type: Some(ResourceType::Documents),
            resource_id: Some(doc_id),
        };
        tenant::delete_user_resource_mappings(&mut *self.tx, &filter).map(|_| ())
    }

    fn accessor_documents(&self, kind: SubjectKind, owner_id: Uuid) -> Result<Vec<Uuid>> {
        self.owner_exists(kind, owner_id)?;
        let ms = self.mappings(MappingFilter {
            subject_id: Some(owner_id),
            subject_role: self.role_filter(),
            resource_type: Some(ResourceType::Documents),
            ..Default::default()
        })?;
        Ok(ms.into_iter().map(|m| m.resource_id).collect())
    }

    fn document_accessors(&self, doc_id: Uuid) -> Result<Vec<Uuid>> {
        let ms = self.mappings(MappingFilter {
            subject_role: self.role_filter(),
            subject_kind: Some(SubjectKind::Org),
            resource_type: Some(ResourceType::Documents),
            resource_id: Some(doc_id),
            ..Default::default()
        })?;
        Ok(ms.into_iter().map(|m| m.subject_id).collect())
    }

    fn user_orgs(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ms = self.mappings(MappingFilter {
            subject_id: Some(user_id),
            resource_type: Some(ResourceType::Orgs),
            ..Default::default()
        })?;
        Ok(ms.into_iter().map(|m| m.resource_id).collect())
    }

    fn is_org_accessor(&self, user_id: Uuid, org_id: Uuid) -> Result<()> {
        let ms = self.mappings(MappingFilter {
            subject_id: Some(user_id),
            subject_role: self.role_filter(),
            resource_type: Some(ResourceType::Orgs),
            resource_id: Some(org_id),
            ..Default::default()
        })?;
        if ms
            .iter()
            .any(|m| matches!(m.subject_role, Role::Owner | Role::Member))
        {
            Ok(())
        } else {
            Err(Error::unauthorized("user is not org member"))
        }
    }

    fn find_organization_by_name(&self, name: &str) -> Result<Uuid> {
        let orgs = tenant::find_organizations(&*self.tx, &OrganizationFilter::by_name(name))?;
        match orgs.as_slice() {
            [org] => Ok(org.id),
            [] => Err(Error::internal(format!("no organization named {:?}", name))),
            _ => Err(Error::internal(format!(
                "found multiple organizations named {:?}",
                name
            ))),
        }
    }

    fn find_label_by_name(&self, name: &str) -> Result<Uuid> {
        let filter = LabelFilter {
            name: Some(name.to_string()),
        };
        let labels = tenant::find_labels(&*self.tx, &filter)?;
        match labels.as_slice() {
            [label] => Ok(label.id),
            [] => Err(Error::internal(format!("no label named {:?}", name))),
            _ => Err(Error::internal(
                "found multiple labels matching the name provided",
            )),
        }
    }

    fn add_document_label(&mut self, doc_id: Uuid, label_id: Uuid) -> Result<()> {
        let m = LabelMapping {
            label_id,
            resource_type: ResourceType::Documents,
            resource_id: doc_id,
        };
        tenant::create_label_mapping(&mut *self.tx, &m)
    }

    fn remove_document_label(&mut self, doc_id: Uuid, label_id: Uuid) -> Result<()> {
        let m = LabelMapping {
            label_id,
            resource_type: ResourceType::Documents,
            resource_id: doc_id,
        };
        tenant::delete_label_mapping(&mut *self.tx, &m)
    }
}
