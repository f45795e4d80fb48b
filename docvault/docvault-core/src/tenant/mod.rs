//! Organizations, users, labels and their relations to resources.
//!
//! These collaborators live in the same store as the documents and every
//! function takes the caller's transaction, so relation changes commit or
//! roll back together with the document they belong to.

mod label;
mod mapping;
mod org;

pub use label::{
    create_label_mapping, delete_label_mapping, find_label_by_id, find_label_mappings, find_labels,
    find_resource_labels, put_label, Label, LabelFilter, LabelMapping,
};
pub use mapping::{
    create_user_resource_mapping, delete_user_resource_mappings, find_user_resource_mappings,
    MappingFilter, Role, SubjectKind, UserResourceMapping,
};
pub use org::{
    find_organization_by_id, find_organizations, find_user_by_id, put_organization, put_user,
    Organization, OrganizationFilter, User,
};

use crate::error::Result;
use crate::kv::Tx;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

pub(crate) const ORGANIZATIONS_BUCKET: &str = "organizations";
pub(crate) const USERS_BUCKET: &str = "users";
pub(crate) const LABELS_BUCKET: &str = "labels";
pub(crate) const LABEL_MAPPINGS_BUCKET: &str = "labelmappings";
pub(crate) const USER_RESOURCE_MAPPINGS_BUCKET: &str = "userresourcemappings";
pub(crate) const USER_RESOURCE_MAPPINGS_BY_SUBJECT_BUCKET: &str = "userresourcemappingsbysubject";

/// Create every bucket the collaborators need.
pub fn initialize(tx: &mut dyn Tx) -> Result<()> {
    for bucket in [
        ORGANIZATIONS_BUCKET,
        USERS_BUCKET,
        LABELS_BUCKET,
        LABEL_MAPPINGS_BUCKET,
        USER_RESOURCE_MAPPINGS_BUCKET,
        USER_RESOURCE_MAPPINGS_BY_SUBJECT_BUCKET,
    ] {
        tx.create_bucket(bucket)?;
    }
    Ok(())
}

/// Drop every relation that points at `resource_id`, whatever its role or
/// kind, including label associations.
pub fn purge_resource_relations(tx: &mut dyn Tx, resource_id: Uuid) -> Result<()> {
    let filter = MappingFilter {
        resource_id: Some(resource_id),
        ..Default::default()
    };
    if !find_user_resource_mappings(tx, &filter)?.is_empty() {
        delete_user_resource_mappings(tx, &filter)?;
    }
    for m in find_label_mappings(tx, resource_id)? {
        delete_label_mapping(tx, &m)?;
    }
    Ok(())
}

fn put_json<T: Serialize>(tx: &mut dyn Tx, bucket: &str, key: &[u8], value: &T) -> Result<()> {
    tx.put(bucket, key, serde_json::to_vec(value)?)
}

fn get_json<T: DeserializeOwned>(tx: &dyn Tx, bucket: &str, key: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(&tx.get(bucket, key)?)?)
}

fn scan_json<T: DeserializeOwned>(tx: &dyn Tx, bucket: &str) -> Result<Vec<T>> {
    tx.cursor(bucket)?
        .map(|(_, v)| serde_json::from_slice(&v).map_err(Into::into))
        .collect()
}
