//! Tests for the in-memory target store.

use super::*;
use crate::bulk::plan_statements;
use crate::filename::zero_date;
use crate::schema::{DOC_LABEL_COLUMNS, LABEL_COLUMNS};

fn store() -> MemoryTarget {
    MemoryTarget::with_schema(&TableNames::default())
}

fn labels_statement(names: &[&str], mode: InsertMode) -> InsertStatement {
    plan_statements("labels", LABEL_COLUMNS, mode, 1_000_000, names, |n| {
        vec![SqlValue::from(*n)]
    })
    .remove(0)
}

fn doc(name: &str, barcode: &str) -> TargetDocument {
    TargetDocument {
        name: name.to_string(),
        barcode: barcode.to_string(),
        note: String::new(),
        date_of_scan: zero_date(),
        date_of_receipt: zero_date(),
    }
}

#[tokio::test]
async fn test_insert_assigns_sequential_ids() {
    let store = store();
    let written = store
        .execute_insert(&labels_statement(&["a", "b"], InsertMode::Strict))
        .await
        .unwrap();
    assert_eq!(written, 2);

    let labels = store.fetch_labels("labels").await.unwrap();
    assert_eq!(
        labels,
        vec![
            Label {
                id: 1,
                name: "a".to_string()
            },
            Label {
                id: 2,
                name: "b".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_strict_duplicate_is_atomic() {
    let store = store();
    store
        .execute_insert(&labels_statement(&["a"], InsertMode::Strict))
        .await
        .unwrap();

    let err = store
        .execute_insert(&labels_statement(&["b", "a"], InsertMode::Strict))
        .await
        .unwrap_err();
    assert!(err.is_duplicate_key());
    assert_eq!(store.count_rows("labels").await.unwrap(), 1);
}

#[tokio::test]
async fn test_strict_duplicate_within_statement() {
    let store = store();
    let err = store
        .execute_insert(&labels_statement(&["a", "a"], InsertMode::Strict))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { ref table, .. } if table == "labels"));
}

#[tokio::test]
async fn test_tolerant_skips_duplicates() {
    let store = store();
    store
        .execute_insert(&labels_statement(&["a"], InsertMode::Strict))
        .await
        .unwrap();

    let written = store
        .execute_insert(&labels_statement(&["a", "b", "b"], InsertMode::Tolerant))
        .await
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(store.count_rows("labels").await.unwrap(), 2);
}

#[tokio::test]
async fn test_not_null_is_enforced() {
    let store = store();
    let values = [SqlValue::from("a"), SqlValue::Null, SqlValue::F64(f64::NAN)];
    let statement = |mode| {
        plan_statements("labels", LABEL_COLUMNS, mode, 1_000_000, &values, |v| {
            vec![v.clone()]
        })
        .remove(0)
    };

    let err = store
        .execute_insert(&statement(InsertMode::Strict))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Loading(ref msg) if msg.contains("'name' cannot be null")));
    assert_eq!(store.count_rows("labels").await.unwrap(), 0);

    let written = store
        .execute_insert(&statement(InsertMode::Tolerant))
        .await
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(
        store.column_values("labels", "name").unwrap(),
        vec![SqlValue::from("a")]
    );
}

#[tokio::test]
async fn test_trailing_space_is_a_different_name() {
    let store = store();
    let written = store
        .execute_insert(&labels_statement(&["Neu", "Neu "], InsertMode::Strict))
        .await
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(store.find_label("labels", "Neu ").await.unwrap().unwrap().id, 2);
}

#[tokio::test]
async fn test_foreign_keys_are_enforced() {
    let store = store();
    let links = [(1_i64, 1_i64)];
    let strict = plan_statements(
        "docs_labels",
        DOC_LABEL_COLUMNS,
        InsertMode::Strict,
        1_000_000,
        &links,
        |(d, l)| vec![SqlValue::I64(*d), SqlValue::I64(*l)],
    );
    assert!(matches!(
        store.execute_insert(&strict[0]).await,
        Err(Error::Loading(_))
    ));

    let tolerant = plan_statements(
        "docs_labels",
        DOC_LABEL_COLUMNS,
        InsertMode::Tolerant,
        1_000_000,
        &links,
        |(d, l)| vec![SqlValue::I64(*d), SqlValue::I64(*l)],
    );
    assert_eq!(store.execute_insert(&tolerant[0]).await.unwrap(), 0);

    store.insert_document("docs", &doc("d.pdf", "")).await.unwrap();
    store
        .execute_insert(&labels_statement(&["Neu"], InsertMode::Strict))
        .await
        .unwrap();
    assert_eq!(store.execute_insert(&strict[0]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_insert_document_duplicate_name() {
    let store = store();
    let id = store.insert_document("docs", &doc("a.pdf", "1")).await.unwrap();
    assert_eq!(id, 1);

    let err = store
        .insert_document("docs", &doc("a.pdf", "2"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate_key());
}

#[tokio::test]
async fn test_upsert_document_updates_existing() {
    let store = store();
    let first = store.upsert_document("docs", &doc("a.pdf", "1")).await.unwrap();
    let other = store.upsert_document("docs", &doc("b.pdf", "1")).await.unwrap();
    let again = store.upsert_document("docs", &doc("a.pdf", "2")).await.unwrap();

    assert_eq!(first, DocumentWrite::Inserted(1));
    assert_eq!(other, DocumentWrite::Inserted(2));
    assert_eq!(again, DocumentWrite::Updated(1));
    assert_eq!(
        store.column_values("docs", "barcode").unwrap(),
        vec![SqlValue::from("2"), SqlValue::from("1")]
    );
}

#[tokio::test]
async fn test_find_label() {
    let store = store();
    store
        .execute_insert(&labels_statement(&["Neu", "Alt"], InsertMode::Strict))
        .await
        .unwrap();
    let label = store.find_label("labels", "Alt").await.unwrap().unwrap();
    assert_eq!(label.id, 2);
    assert!(store.find_label("labels", "Other").await.unwrap().is_none());
}

#[tokio::test]
async fn test_truncate_resets_ids() {
    let store = store();
    store
        .execute_insert(&labels_statement(&["a", "b"], InsertMode::Strict))
        .await
        .unwrap();
    store.truncate("labels").await.unwrap();
    assert_eq!(store.count_rows("labels").await.unwrap(), 0);

    store
        .execute_insert(&labels_statement(&["c"], InsertMode::Strict))
        .await
        .unwrap();
    assert_eq!(store.fetch_labels("labels").await.unwrap()[0].id, 1);
}

#[tokio::test]
async fn test_missing_table() {
    let store = MemoryTarget::new();
    assert!(store.count_rows("labels").await.is_err());

    store.ensure_schema(&TableNames::default()).await.unwrap();
    assert_eq!(store.count_rows("labels").await.unwrap(), 0);
}

#[tokio::test]
async fn test_ensure_schema_keeps_rows() {
    let store = store();
    store
        .execute_insert(&labels_statement(&["a"], InsertMode::Strict))
        .await
        .unwrap();
    store.ensure_schema(&TableNames::default()).await.unwrap();
    assert_eq!(store.count_rows("labels").await.unwrap(), 1);
}

#[tokio::test]
async fn test_fault_injection() {
    let store = store();
    store.under_report_inserts_into("labels");
    let written = store
        .execute_insert(&labels_statement(&["a", "b"], InsertMode::Strict))
        .await
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(store.count_rows("labels").await.unwrap(), 2);

    store.fail_inserts_into("docs");
    assert!(store.insert_document("docs", &doc("a.pdf", "")).await.is_err());
}
