use crate::{DocAction, DocFields, Hydrate, LabelAction, MemberAction, OrgAction, StoreAction, UserAction};
use anyhow::{anyhow, bail, Context, Result};
use docvault_core::config::Config;
use docvault_core::kv::MemStore;
use docvault_core::options::{
    include_data, include_labels, where_id, where_org, with_label, with_org, without_label,
    without_owners,
};
use docvault_core::tenant::{OrganizationFilter, Role};
use docvault_core::{CreateOption, Document, DocumentMeta, DocumentStore, FindOption, Service};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_service(config: &Config) -> Result<Service> {
    let store = MemStore::open(config)
        .with_context(|| format!("failed to open store in {}", config.data_dir.display()))?;
    Ok(Service::new(Arc::new(store))?)
}

fn open_documents(config: &Config) -> Result<(Service, DocumentStore)> {
    let service = open_service(config)?;
    let docs = service
        .find_document_store(&config.namespace)
        .with_context(|| format!("run `docvault store init -n {}` first", config.namespace))?;
    Ok((service, docs))
}

pub fn store(action: StoreAction, config: &Config) -> Result<()> {
    let service = open_service(config)?;
    match action {
        StoreAction::Init => {
            service.create_document_store(&config.namespace)?;
            info!("initialized namespace {:?} in {}", config.namespace, config.data_dir.display());
            print_json(&json!({ "namespace": config.namespace }))
        }
        StoreAction::Check => {
            let docs = service.find_document_store(&config.namespace)?;
            let count = docs.find_documents(&[])?.len();
            print_json(&json!({ "namespace": docs.namespace(), "documents": count }))
        }
    }
}

pub fn org(action: OrgAction, config: &Config) -> Result<()> {
    let service = open_service(config)?;
    match action {
        OrgAction::Create { name } => print_json(&service.create_organization(&name)?),
        OrgAction::List { name } => {
            let filter = OrganizationFilter { id: None, name };
            print_json(&service.find_organizations(&filter)?)
        }
    }
}

pub fn user(action: UserAction, config: &Config) -> Result<()> {
    let service = open_service(config)?;
    match action {
        UserAction::Create { name } => print_json(&service.create_user(&name)?),
    }
}

pub fn member(action: MemberAction, config: &Config) -> Result<()> {
    let service = open_service(config)?;
    match action {
        MemberAction::Add { user, org, owner } => {
            let orgs = service.find_organizations(&OrganizationFilter::by_name(org.as_str()))?;
            let [found] = orgs.as_slice() else {
                bail!("expected exactly one organization named {:?}, found {}", org, orgs.len());
            };
            let role = if owner { Role::Owner } else { Role::Member };
            service.add_member(user, found.id, role)?;
            print_json(&json!({ "user": user, "org": found.id, "role": role }))
        }
    }
}

pub fn label(action: LabelAction, config: &Config) -> Result<()> {
    let service = open_service(config)?;
    match action {
        LabelAction::Create { name, properties } => {
            let properties = properties
                .iter()
                .map(|p| {
                    p.split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .ok_or_else(|| anyhow!("property {:?} is not key=value", p))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            print_json(&service.create_label(&name, properties)?)
        }
    }
}

pub fn doc(action: DocAction, config: &Config) -> Result<()> {
    let (_service, docs) = open_documents(config)?;
    match action {
        DocAction::Create { fields } => {
            let opts = owner_and_label_options(&fields);
            let mut doc = build_document(&fields)?;
            docs.create_document(&mut doc, &opts)?;
            print_json(&doc)
        }
        DocAction::Update {
            id,
            fields,
            replace_owners,
            unlabel,
        } => {
            let mut opts = Vec::new();
            if replace_owners {
                opts.push(without_owners());
            }
            opts.extend(unlabel.into_iter().map(without_label));
            opts.extend(owner_and_label_options(&fields));
            let mut doc = build_document(&fields)?;
            doc.id = id;
            docs.update_document(&doc, &opts)?;
            print_json(&doc)
        }
        DocAction::List { org, hydrate } => {
            print_json(&docs.find_documents(&list_options(org, &hydrate)?)?)
        }
        DocAction::Get { id, hydrate } => {
            let mut opts = vec![where_id(id)];
            opts.extend(hydrate_options(&hydrate));
            let found = docs.find_documents(&opts)?;
            let doc = found
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("document {} not found", id))?;
            print_json(&doc)
        }
        DocAction::Delete { ids, org } => {
            let mut opts: Vec<FindOption> = ids.into_iter().map(where_id).collect();
            opts.extend(org.into_iter().map(where_org));
            if opts.is_empty() {
                bail!("refusing to delete without --id or --org");
            }
            let deleted = docs.delete_documents(&opts)?;
            print_json(&json!({ "deleted": deleted }))
        }
    }
}

fn build_document(fields: &DocFields) -> Result<Document> {
    let data = fields
        .data
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("--data is not valid JSON")?;
    let mut meta = DocumentMeta::new(fields.name.as_str());
    if let Some(version) = &fields.version {
        meta = meta.with_version(version.as_str());
    }
    Ok(Document::new(meta, data))
}

fn owner_and_label_options(fields: &DocFields) -> Vec<CreateOption> {
    fields
        .orgs
        .iter()
        .map(|o| with_org(o.as_str()))
        .chain(fields.labels.iter().map(|l| with_label(l.as_str())))
        .collect()
}

/// A listing without `--org` walks the meta bucket directly and carries no
/// payloads or labels.
fn list_options(org: Option<String>, hydrate: &Hydrate) -> Result<Vec<FindOption>> {
    let Some(org) = org else {
        if hydrate.data || hydrate.labels {
            bail!("--data and --labels need --org; a plain listing returns meta only");
        }
        return Ok(Vec::new());
    };
    let mut opts = vec![where_org(org)];
    opts.extend(hydrate_options(hydrate));
    Ok(opts)
}

fn hydrate_options(hydrate: &Hydrate) -> Vec<FindOption> {
    let mut opts = Vec::new();
    if hydrate.data {
        opts.push(include_data());
    }
    if hydrate.labels {
        opts.push(include_labels());
    }
    opts
}
