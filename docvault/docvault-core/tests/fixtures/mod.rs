#![allow(dead_code)]

use docvault_core::kv::MemStore;
use docvault_core::tenant::{MappingFilter, Role};
use docvault_core::{
    Action, Authorization, CreateOption, Document, DocumentMeta, DocumentStore, Permission,
    Resource, ResourceType, Result, Service,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub const NAMESPACE: &str = "templates";

pub struct Fixture {
    pub service: Service,
    pub docs: DocumentStore,
}

pub fn fixture() -> Fixture {
    let service = Service::new(Arc::new(MemStore::in_memory())).unwrap();
    let docs = service.create_document_store(NAMESPACE).unwrap();
    Fixture { service, docs }
}

impl Fixture {
    pub fn org(&self, name: &str) -> Uuid {
        self.service.create_organization(name).unwrap().id
    }

    pub fn user(&self, name: &str) -> Uuid {
        self.service.create_user(name).unwrap().id
    }

    pub fn join(&self, user: Uuid, org: Uuid, role: Role) {
        self.service.add_member(user, org, role).unwrap();
    }

    pub fn label(&self, name: &str) -> Uuid {
        self.service.create_label(name, BTreeMap::new()).unwrap().id
    }

    pub fn create(&self, name: &str, data: Value, opts: &[CreateOption]) -> Result<Document> {
        let mut doc = Document::new(DocumentMeta::new(name), Some(data));
        self.docs.create_document(&mut doc, opts)?;
        Ok(doc)
    }

    /// Every relation that points at `doc_id`.
    pub fn relations(&self, doc_id: Uuid) -> usize {
        let filter = MappingFilter {
            resource_id: Some(doc_id),
            ..Default::default()
        };
        self.service.find_user_resource_mappings(&filter).unwrap().len()
            + self.service.find_resource_labels(doc_id).unwrap().len()
    }
}

pub fn token(user: Uuid, permissions: Vec<Permission>) -> Authorization {
    Authorization::new(user, permissions)
}

pub fn docs_in_org(action: Action, org: Uuid) -> Permission {
    Permission::new(action, Resource::in_org(ResourceType::Documents, org))
}

pub fn all_docs(action: Action) -> Permission {
    Permission::new(action, Resource::all(ResourceType::Documents))
}

pub fn one_doc(action: Action, doc: Uuid) -> Permission {
    Permission::new(action, Resource::with_id(ResourceType::Documents, doc))
}

pub fn ids(docs: &[Document]) -> Vec<Uuid> {
    docs.iter().map(|d| d.id).collect()
}
