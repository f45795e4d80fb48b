use docvault_core::config::Config;
use docvault_core::kv::{MemStore, Store, StoreExt};
use docvault_core::options::{include_data, include_labels, where_id, where_org, with_label, with_org};
use docvault_core::{Document, DocumentMeta, ErrorCode, Service};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

fn open(config: &Config) -> Service {
    Service::new(Arc::new(MemStore::open(config).unwrap())).unwrap()
}

#[test]
fn test_committed_documents_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::default().with_data_dir(temp_dir.path());

    let kept = {
        let service = open(&config);
        service.create_organization("acme").unwrap();
        service.create_label("prod", BTreeMap::new()).unwrap();
        let docs = service.create_document_store("templates").unwrap();

        let mut kept = Document::new(DocumentMeta::new("kept"), Some(json!({"n": 1})));
        docs.create_document(&mut kept, &[with_org("acme"), with_label("prod")])
            .unwrap();

        let mut dropped = Document::new(DocumentMeta::new("dropped"), None);
        let err = docs
            .create_document(&mut dropped, &[with_org("acme"), with_label("missing")])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
        kept
    };

    let service = open(&config);
    let docs = service.find_document_store("templates").unwrap();
    let listed = docs.find_documents(&[]).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, kept.id);

    let found = docs
        .find_documents(&[where_org("acme"), include_data(), include_labels()])
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].data, kept.data);
    assert_eq!(found[0].labels[0].name, "prod");
}

#[test]
fn test_deletes_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::default().with_data_dir(temp_dir.path());

    let doc_id = {
        let service = open(&config);
        let docs = service.create_document_store("").unwrap();
        let mut doc = Document::new(DocumentMeta::new("gone"), None);
        docs.create_document(&mut doc, &[]).unwrap();
        assert_eq!(docs.delete_documents(&[where_id(doc.id)]).unwrap(), 1);
        doc.id
    };

    let service = open(&config);
    let docs = service.find_document_store("").unwrap();
    assert!(docs.find_documents(&[where_id(doc_id)]).unwrap().is_empty());
    assert!(docs.find_documents(&[]).unwrap().is_empty());
}

#[test]
fn test_reader_snapshot_ignores_later_commits() {
    let service = Service::new(Arc::new(MemStore::in_memory())).unwrap();
    let docs = service.create_document_store("templates").unwrap();

    let before = service.store().begin(false).unwrap();
    let mut doc = Document::new(DocumentMeta::new("late"), None);
    docs.create_document(&mut doc, &[]).unwrap();

    assert!(before.cursor("templates/documents/meta").unwrap().next().is_none());
    drop(before);

    let count = service
        .store()
        .view(|tx| Ok(tx.cursor("templates/documents/meta")?.count()))
        .unwrap();
    assert_eq!(count, 1);
}
