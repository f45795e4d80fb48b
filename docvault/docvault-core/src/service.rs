//! Entry point owning the store, the id generator and the tenant
//! collaborators documents are related to.

use crate::authz::ResourceType;
use crate::document::{bucket_names, DocumentStore};
use crate::error::{Error, Result};
use crate::id::{IdGenerator, UuidGenerator};
use crate::kv::{Store, StoreExt};
use crate::tenant::{
    self, Label, MappingFilter, Organization, OrganizationFilter, Role, SubjectKind, User,
    UserResourceMapping,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct Service {
    store: Arc<dyn Store>,
    ids: Arc<dyn IdGenerator>,
}

impl Service {
    /// Wrap `store`, creating the collaborator buckets if needed.
    pub fn new(store: Arc<dyn Store>) -> Result<Self> {
        Self::with_id_generator(store, Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(store: Arc<dyn Store>, ids: Arc<dyn IdGenerator>) -> Result<Self> {
        store.update(tenant::initialize)?;
        Ok(Self { store, ids })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Create the buckets for `namespace` if missing and return its store.
    pub fn create_document_store(&self, namespace: &str) -> Result<DocumentStore> {
        let (data, meta) = bucket_names(namespace);
        self.store.update(|tx| {
            tx.create_bucket(&data)?;
            tx.create_bucket(&meta)
        })?;
        info!("document store {:?} ready", namespace);
        Ok(self.document_store(namespace))
    }

    /// The store for an existing `namespace`; `NotFound` if it was never
    /// created.
    pub fn find_document_store(&self, namespace: &str) -> Result<DocumentStore> {
        let (data, meta) = bucket_names(namespace);
        self.store.view(|tx| {
            if tx.has_bucket(&data) && tx.has_bucket(&meta) {
                Ok(())
            } else {
                Err(Error::not_found(format!("document store {:?}", namespace)))
            }
        })?;
        Ok(self.document_store(namespace))
    }

    fn document_store(&self, namespace: &str) -> DocumentStore {
        DocumentStore::new(self.store.clone(), self.ids.clone(), namespace)
    }

    pub fn create_organization(&self, name: &str) -> Result<Organization> {
        let org = Organization {
            id: self.ids.id(),
            name: name.to_string(),
        };
        self.store.update(|tx| tenant::put_organization(tx, &org))?;
        info!("created organization {} ({})", org.name, org.id);
        Ok(org)
    }

    pub fn find_organizations(&self, filter: &OrganizationFilter) -> Result<Vec<Organization>> {
        self.store.view(|tx| tenant::find_organizations(tx, filter))
    }

    pub fn create_user(&self, name: &str) -> Result<User> {
        let user = User {
            id: self.ids.id(),
            name: name.to_string(),
        };
        self.store.update(|tx| tenant::put_user(tx, &user))?;
        info!("created user {} ({})", user.name, user.id);
        Ok(user)
    }

    pub fn create_label(&self, name: &str, properties: BTreeMap<String, String>) -> Result<Label> {
        let label = Label {
            id: self.ids.id(),
            name: name.to_string(),
            properties,
        };
        self.store.update(|tx| tenant::put_label(tx, &label))?;
        info!("created label {} ({})", label.name, label.id);
        Ok(label)
    }

    /// Give `user_id` a role in `org_id`. Both must exist.
    pub fn add_member(&self, user_id: Uuid, org_id: Uuid, role: Role) -> Result<()> {
        self.store.update(|tx| {
            tenant::find_user_by_id(tx, user_id)?;
            tenant::find_organization_by_id(tx, org_id)?;
            let m = UserResourceMapping {
                subject_id: user_id,
                subject_role: role,
                subject_kind: SubjectKind::User,
                resource_type: ResourceType::Orgs,
                resource_id: org_id,
            };
            tenant::create_user_resource_mapping(tx, &m)
        })
    }

    pub fn create_user_resource_mapping(&self, m: &UserResourceMapping) -> Result<()> {
        self.store
            .update(|tx| tenant::create_user_resource_mapping(tx, m))
    }

    pub fn find_user_resource_mappings(&self, filter: &MappingFilter) -> Result<Vec<UserResourceMapping>> {
        self.store
            .view(|tx| tenant::find_user_resource_mappings(tx, filter))
    }

    pub fn find_resource_labels(&self, resource_id: Uuid) -> Result<Vec<Label>> {
        self.store.view(|tx| tenant::find_resource_labels(tx, resource_id))
    }
}
