use super::{get_json, put_json, scan_json, LABELS_BUCKET, LABEL_MAPPINGS_BUCKET};
use crate::authz::ResourceType;
use crate::error::{Error, Result};
use crate::id;
use crate::kv::Tx;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default)]
pub struct LabelFilter {
    pub name: Option<String>,
}

/// Association of a label with a resource.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelMapping {
    #[serde(rename = "labelID")]
    pub label_id: Uuid,
    #[serde(rename = "resourceType")]
    pub resource_type: ResourceType,
    #[serde(rename = "resourceID")]
    pub resource_id: Uuid,
}

impl LabelMapping {
    fn key(&self) -> Vec<u8> {
        id::pair(self.resource_id, self.label_id)
    }
}

pub fn put_label(tx: &mut dyn Tx, label: &Label) -> Result<()> {
    put_json(tx, LABELS_BUCKET, &id::encode(label.id), label)
}

pub fn find_label_by_id(tx: &dyn Tx, label_id: Uuid) -> Result<Label> {
    get_json(tx, LABELS_BUCKET, &id::encode(label_id)).map_err(|e| match e {
        Error::NotFound(_) => Error::not_found(format!("label {}", label_id)),
        other => other,
    })
}

pub fn find_labels(tx: &dyn Tx, filter: &LabelFilter) -> Result<Vec<Label>> {
    let labels: Vec<Label> = scan_json(tx, LABELS_BUCKET)?;
    Ok(labels
        .into_iter()
        .filter(|l| filter.name.as_deref().map_or(true, |n| l.name == n))
        .collect())
}

pub fn create_label_mapping(tx: &mut dyn Tx, m: &LabelMapping) -> Result<()> {
    find_label_by_id(tx, m.label_id)?;
    let key = m.key();
    if tx.get(LABEL_MAPPINGS_BUCKET, &key).is_ok() {
        return Err(Error::internal(format!(
            "label {} is already mapped to {} {}",
            m.label_id, m.resource_type, m.resource_id
        )));
    }
    put_json(tx, LABEL_MAPPINGS_BUCKET, &key, m)
}

pub fn delete_label_mapping(tx: &mut dyn Tx, m: &LabelMapping) -> Result<()> {
    let key = m.key();
    tx.get(LABEL_MAPPINGS_BUCKET, &key)
        .map_err(|_| Error::not_found("label mapping"))?;
    tx.delete(LABEL_MAPPINGS_BUCKET, &key)
}

/// Label associations of one resource, ordered by label id.
pub fn find_label_mappings(tx: &dyn Tx, resource_id: Uuid) -> Result<Vec<LabelMapping>> {
    tx.cursor_prefix(LABEL_MAPPINGS_BUCKET, resource_id.as_bytes())?
        .map(|(_, v)| serde_json::from_slice(&v).map_err(Into::into))
        .collect()
}

pub fn find_resource_labels(tx: &dyn Tx, resource_id: Uuid) -> Result<Vec<Label>> {
    find_label_mappings(tx, resource_id)?
        .iter()
        .map(|m| find_label_by_id(tx, m.label_id))
        .collect()
}
