mod fixtures;

use docvault_core::authz::Status;
use docvault_core::options::{
    authorized, authorized_where, authorized_where_id, authorized_where_org, authorized_with_org,
    include_data, include_labels, where_id, where_org, with_label, with_org, without_label,
    without_owners,
};
use docvault_core::tenant::{Role, SubjectKind, UserResourceMapping};
use docvault_core::{Action, Document, DocumentMeta, ErrorCode, Identity, ResourceType};
use fixtures::*;
use serde_json::json;
use uuid::Uuid;

#[test]
fn test_create_then_find_round_trips() {
    let f = fixture();
    f.org("acme");
    let doc = f
        .create("dash", json!({"cells": [1, 2, 3]}), &[with_org("acme")])
        .unwrap();
    assert!(!doc.id.is_nil());

    let found = f.docs.find_documents(&[where_id(doc.id), include_data()]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, doc.id);
    assert_eq!(found[0].meta, doc.meta);
    assert_eq!(found[0].data, Some(json!({"cells": [1, 2, 3]})));

    let bare = f.docs.find_documents(&[where_id(doc.id)]).unwrap();
    assert_eq!(bare[0].data, None);
}

#[test]
fn test_failed_option_leaves_nothing_behind() {
    let f = fixture();
    f.org("acme");
    let err = f
        .create("dash", json!(1), &[with_org("acme"), with_label("missing")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);

    assert!(f.docs.find_documents(&[]).unwrap().is_empty());
    assert!(f.docs.find_documents(&[where_org("acme")]).unwrap().is_empty());
}

#[test]
fn test_id_is_assigned_only_on_success() {
    let f = fixture();
    let mut doc = Document::new(DocumentMeta::new("dash"), None);
    let err = f.docs.create_document(&mut doc, &[with_org("nobody")]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);
    assert!(doc.id.is_nil());
}

#[test]
fn test_raw_listing_returns_meta_only() {
    let f = fixture();
    f.create("a", json!("x"), &[]).unwrap();
    f.create("b", json!("y"), &[]).unwrap();

    let listed = f.docs.find_documents(&[]).unwrap();
    let mut names: Vec<_> = listed.iter().map(|d| d.meta.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
    assert!(listed.iter().all(|d| d.data.is_none() && d.labels.is_empty()));
}

#[test]
fn test_namespaces_are_isolated() {
    let f = fixture();
    f.create("a", json!(null), &[]).unwrap();
    let other = f.service.create_document_store("other").unwrap();
    assert_eq!(other.namespace(), "other");
    assert!(other.find_documents(&[]).unwrap().is_empty());
}

#[test]
fn test_missing_document_store_is_not_found() {
    let f = fixture();
    let err = f.service.find_document_store("nope").err().unwrap();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(f.service.find_document_store(NAMESPACE).unwrap().namespace(), NAMESPACE);
}

#[test]
fn test_null_data_reads_back_as_none() {
    let f = fixture();
    let mut doc = Document::new(DocumentMeta::new("empty"), None);
    f.docs.create_document(&mut doc, &[]).unwrap();
    let found = f.docs.find_documents(&[where_id(doc.id), include_data()]).unwrap();
    assert_eq!(found[0].data, None);
}

#[test]
fn test_find_options_union_without_dedup() {
    let f = fixture();
    let a = f.create("a", json!(1), &[]).unwrap();
    let b = f.create("b", json!(2), &[]).unwrap();

    let found = f
        .docs
        .find_documents(&[where_id(a.id), where_id(b.id), where_id(a.id)])
        .unwrap();
    assert_eq!(ids(&found), vec![a.id, b.id, a.id]);
}

#[test]
fn test_where_org_lists_owned_documents() {
    let f = fixture();
    f.org("acme");
    f.org("other");
    let a = f.create("a", json!(1), &[with_org("acme")]).unwrap();
    f.create("b", json!(2), &[with_org("other")]).unwrap();

    let found = f.docs.find_documents(&[where_org("acme")]).unwrap();
    assert_eq!(ids(&found), vec![a.id]);
}

#[test]
fn test_labels_are_added_removed_and_hydrated() {
    let f = fixture();
    f.label("prod");
    f.label("draft");
    let doc = f
        .create("a", json!(1), &[with_label("prod"), with_label("draft")])
        .unwrap();

    let found = f.docs.find_documents(&[where_id(doc.id), include_labels()]).unwrap();
    let mut names: Vec<_> = found[0].labels.iter().map(|l| l.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["draft", "prod"]);

    f.docs.update_document(&doc, &[without_label("draft")]).unwrap();
    let found = f.docs.find_documents(&[where_id(doc.id), include_labels()]).unwrap();
    assert_eq!(found[0].labels.len(), 1);
    assert_eq!(found[0].labels[0].name, "prod");

    let err = f
        .docs
        .update_document(&doc, &[without_label("draft")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[test]
fn test_update_replaces_meta_and_data() {
    let f = fixture();
    let mut doc = f.create("a", json!({"v": 1}), &[]).unwrap();
    doc.meta = DocumentMeta::new("renamed").with_version("2");
    doc.data = Some(json!({"v": 2}));
    f.docs.update_document(&doc, &[]).unwrap();

    let found = f.docs.find_documents(&[where_id(doc.id), include_data()]).unwrap();
    assert_eq!(found[0].meta, doc.meta);
    assert_eq!(found[0].data, doc.data);
}

#[test]
fn test_update_missing_document_is_not_found() {
    let f = fixture();
    let mut doc = Document::new(DocumentMeta::new("ghost"), None);
    doc.id = Uuid::new_v4();
    let err = f.docs.update_document(&doc, &[]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(f.docs.find_documents(&[]).unwrap().is_empty());
}

#[test]
fn test_update_can_transfer_ownership() {
    let f = fixture();
    f.org("old");
    f.org("new");
    let doc = f.create("a", json!(1), &[with_org("old")]).unwrap();

    f.docs
        .update_document(&doc, &[without_owners(), with_org("new")])
        .unwrap();
    assert!(f.docs.find_documents(&[where_org("old")]).unwrap().is_empty());
    assert_eq!(ids(&f.docs.find_documents(&[where_org("new")]).unwrap()), vec![doc.id]);
}

#[test]
fn test_delete_cascades_to_relations() {
    let f = fixture();
    f.org("acme");
    let user = f.user("ann");
    f.label("prod");
    let doc = f.create("a", json!(1), &[with_org("acme"), with_label("prod")]).unwrap();
    f.service
        .create_user_resource_mapping(&UserResourceMapping {
            subject_id: user,
            subject_role: Role::Member,
            subject_kind: SubjectKind::User,
            resource_type: ResourceType::Documents,
            resource_id: doc.id,
        })
        .unwrap();
    assert_eq!(f.relations(doc.id), 3);

    assert_eq!(f.docs.delete_documents(&[where_id(doc.id)]).unwrap(), 1);
    assert_eq!(f.relations(doc.id), 0);
    assert!(f.docs.find_documents(&[where_id(doc.id)]).unwrap().is_empty());
    assert!(f.docs.find_documents(&[]).unwrap().is_empty());
}

#[test]
fn test_delete_with_overlapping_options_aborts() {
    let f = fixture();
    f.org("acme");
    let doc = f.create("a", json!(1), &[with_org("acme")]).unwrap();

    let err = f
        .docs
        .delete_documents(&[where_org("acme"), where_id(doc.id)])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(ids(&f.docs.find_documents(&[where_org("acme")]).unwrap()), vec![doc.id]);
}

#[test]
fn test_delete_rejects_hydration_options() {
    let f = fixture();
    let doc = f.create("a", json!(1), &[]).unwrap();
    for opt in [include_data(), include_labels()] {
        let err = f.docs.delete_documents(&[where_id(doc.id), opt]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
    }
    assert_eq!(f.docs.find_documents(&[]).unwrap().len(), 1);
}

#[test]
fn test_identity_needs_org_ownership_to_write() {
    let f = fixture();
    let org = f.org("acme");
    let owner = f.user("owner");
    let member = f.user("member");
    f.join(owner, org, Role::Owner);
    f.join(member, org, Role::Member);

    let doc = f
        .create("a", json!(1), &[authorized_with_org(Identity { user_id: owner }, "acme")])
        .unwrap();
    let err = f
        .create("b", json!(1), &[authorized_with_org(Identity { user_id: member }, "acme")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);

    f.docs
        .update_document(&doc, &[authorized(Identity { user_id: owner })])
        .unwrap();
    let err = f
        .docs
        .update_document(&doc, &[authorized(Identity { user_id: member })])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);

    // reading only needs membership
    let found = f
        .docs
        .find_documents(&[authorized_where_id(Identity { user_id: member }, doc.id)])
        .unwrap();
    assert_eq!(ids(&found), vec![doc.id]);
}

#[test]
fn test_identity_sees_own_and_org_documents() {
    let f = fixture();
    let org = f.org("acme");
    f.org("other");
    let user = f.user("ann");
    f.join(user, org, Role::Member);

    let org_doc = f.create("a", json!(1), &[with_org("acme")]).unwrap();
    f.create("b", json!(2), &[with_org("other")]).unwrap();

    let found = f
        .docs
        .find_documents(&[authorized_where(Identity { user_id: user })])
        .unwrap();
    assert_eq!(ids(&found), vec![org_doc.id]);

    let found = f
        .docs
        .find_documents(&[authorized_where_org(Identity { user_id: user }, "acme")])
        .unwrap();
    assert_eq!(ids(&found), vec![org_doc.id]);

    let err = f
        .docs
        .find_documents(&[authorized_where_org(Identity { user_id: user }, "other")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[test]
fn test_wildcard_and_org_scoped_tokens() {
    let f = fixture();
    let acme = f.org("acme");
    let other = f.org("other");
    let user = f.user("ann");

    let wildcard = token(user, vec![all_docs(Action::Write), all_docs(Action::Read)]);
    let scoped = token(user, vec![docs_in_org(Action::Write, other)]);

    let doc = f
        .create("a", json!(1), &[with_org("acme"), authorized(wildcard.clone())])
        .unwrap();
    let err = f
        .create("b", json!(1), &[with_org("acme"), authorized(scoped.clone())])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);

    // attaching an org requires an exact org-scoped write grant
    let err = f
        .create("c", json!(1), &[authorized_with_org(wildcard.clone(), "acme")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
    let exact = token(user, vec![docs_in_org(Action::Write, acme)]);
    let c = f
        .create("c", json!(1), &[authorized_with_org(exact, "acme")])
        .unwrap();

    // a wildcard read grant covers any org but enumerates nothing by itself
    let found = f
        .docs
        .find_documents(&[authorized_where_org(wildcard.clone(), "acme")])
        .unwrap();
    let mut found = ids(&found);
    found.sort();
    let mut expected = vec![doc.id, c.id];
    expected.sort();
    assert_eq!(found, expected);
    assert!(f.docs.find_documents(&[authorized_where(wildcard)]).unwrap().is_empty());

    // an org-scoped grant reaches only documents that org owns
    let err = f
        .docs
        .find_documents(&[authorized_where_id(scoped, doc.id)])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
    let acme_reader = token(user, vec![docs_in_org(Action::Read, acme)]);
    let found = f
        .docs
        .find_documents(&[authorized_where_id(acme_reader, doc.id)])
        .unwrap();
    assert_eq!(ids(&found), vec![doc.id]);
}

#[test]
fn test_token_authorized_where_walks_scoped_permissions() {
    let f = fixture();
    let acme = f.org("acme");
    f.org("other");
    let user = f.user("ann");
    let a = f.create("a", json!(1), &[with_org("acme")]).unwrap();
    let b = f.create("b", json!(2), &[with_org("other")]).unwrap();

    let t = token(
        user,
        vec![docs_in_org(Action::Read, acme), one_doc(Action::Read, b.id)],
    );
    let found = f.docs.find_documents(&[authorized_where(t)]).unwrap();
    assert_eq!(ids(&found), vec![a.id, b.id]);
}

#[test]
fn test_read_permission_does_not_grant_write() {
    let f = fixture();
    let user = f.user("ann");
    let doc = f.create("a", json!(1), &[]).unwrap();
    let reader = token(user, vec![one_doc(Action::Read, doc.id)]);

    let found = f
        .docs
        .find_documents(&[authorized_where_id(reader.clone(), doc.id)])
        .unwrap();
    assert_eq!(ids(&found), vec![doc.id]);

    let err = f
        .docs
        .update_document(&doc, &[authorized(reader)])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[test]
fn test_inactive_tokens_are_always_unauthorized() {
    let f = fixture();
    let org = f.org("acme");
    let user = f.user("ann");
    let doc = f.create("a", json!(1), &[with_org("acme")]).unwrap();

    let mut inactive = token(
        user,
        vec![all_docs(Action::Write), docs_in_org(Action::Write, org), one_doc(Action::Read, doc.id)],
    );
    inactive.status = Status::Inactive;
    let mut expired = inactive.clone();
    expired.status = Status::Active;
    expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::hours(1));

    for t in [inactive, expired] {
        let codes = [
            f.docs.update_document(&doc, &[authorized(t.clone())]).err(),
            f.create("b", json!(1), &[authorized_with_org(t.clone(), "acme")]).err(),
            f.docs.find_documents(&[authorized_where(t.clone())]).err(),
            f.docs.find_documents(&[authorized_where_org(t.clone(), "acme")]).err(),
            f.docs.find_documents(&[authorized_where_id(t.clone(), doc.id)]).err(),
        ];
        for err in codes {
            assert_eq!(err.map(|e| e.code()), Some(ErrorCode::Unauthorized));
        }
    }
}
