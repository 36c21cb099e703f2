//! Integration tests for docma-migrate against real databases.
//!
//! These tests require environment variables to be set:
//! - `MYSQL_URL`: a MySQL database the tests may write to
//! - `MONGODB_URI`: a MongoDB server holding a docMa database
//! - `MONGODB_DATABASE`: the docMa database name (default `docma`)
//!
//! Run with: `cargo test --test integration_test -- --ignored`

#![allow(clippy::pedantic)]

use std::env;

use docma_migrate::connectors::json_file::{Snapshot, SnapshotConnector};
use docma_migrate::connectors::mongodb::{MongoDBConfig, MongoDBConnector};
use docma_migrate::model::SourceDocument;
use docma_migrate::target::mysql::MySqlTarget;
use docma_migrate::target::TargetStore;
use docma_migrate::{
    InsertMode, MigrationConfig, MigrationOptions, MigrationPhase, Pipeline, SourceConfig,
    SourceConnector, TableNames,
};
use futures::TryStreamExt;

fn mysql_url() -> Option<String> {
    env::var("MYSQL_URL").ok()
}

fn mongo_config() -> Option<MongoDBConfig> {
    let uri = env::var("MONGODB_URI").ok()?;
    Some(MongoDBConfig {
        uri,
        database: env::var("MONGODB_DATABASE").unwrap_or_else(|_| "docma".to_string()),
        documents_collection: "Docs".to_string(),
        transactions_collection: "AccProcess".to_string(),
    })
}

/// Table names unique to one test so runs do not collide.
fn scratch_tables(prefix: &str) -> TableNames {
    TableNames {
        labels: format!("{}_labels", prefix),
        docs: format!("{}_docs", prefix),
        doc_numbers: format!("{}_doc_numbers", prefix),
        doc_account_data: format!("{}_doc_account_data", prefix),
        docs_labels: format!("{}_docs_labels", prefix),
        accounting_data: format!("{}_accounting_data", prefix),
    }
}

/// Drop the scratch tables, referencing tables first.
async fn drop_tables(url: &str, tables: &TableNames) {
    let pool = sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(1)
        .connect(url)
        .await
        .expect("Failed to connect to MySQL");
    for table in tables.all().iter().rev() {
        sqlx::raw_sql(&format!("DROP TABLE IF EXISTS `{}`", table))
            .execute(&pool)
            .await
            .expect("Failed to drop table");
    }
    pool.close().await;
}

fn doc(name: &str, labels: &[&str]) -> SourceDocument {
    SourceDocument {
        name: name.to_string(),
        labels: labels.iter().map(|l| (*l).to_string()).collect(),
        ..Default::default()
    }
}

fn snapshot_config(url: &str, tables: &TableNames, label_mode: InsertMode) -> MigrationConfig {
    MigrationConfig {
        source: SourceConfig::JsonFile(docma_migrate::connectors::json_file::JsonFileConfig {
            path: "unused.json".into(),
        }),
        target: docma_migrate::config::TargetConfig {
            url: url.to_string(),
        },
        tables: tables.clone(),
        options: MigrationOptions {
            label_insert_mode: label_mode,
            progress: false,
            ..MigrationOptions::default()
        },
    }
}

async fn migrate_snapshot(config: &MigrationConfig, snapshot: Snapshot) -> Pipeline {
    let mut pipeline = Pipeline::with_stores(
        config.clone(),
        Box::new(SnapshotConnector::from_snapshot(snapshot)),
        Box::new(MySqlTarget::new(config.target.url.clone())),
    );
    let stats = pipeline.run().await.expect("Migration failed");
    assert_eq!(pipeline.phase(), MigrationPhase::Done);
    println!("✅ {:?}", stats.documents);
    pipeline
}

async fn connected(url: &str) -> MySqlTarget {
    let mut target = MySqlTarget::new(url.to_string());
    target.connect().await.expect("Failed to connect to MySQL");
    target
}

#[tokio::test]
#[ignore] // Run with --ignored flag when MYSQL_URL is set
async fn test_snapshot_into_mysql_twice() {
    let Some(url) = mysql_url() else {
        eprintln!("Skipping: MYSQL_URL not set");
        return;
    };
    let tables = scratch_tables("it_rerun");
    drop_tables(&url, &tables).await;

    let config = snapshot_config(&url, &tables, InsertMode::Tolerant);
    let snapshot = Snapshot {
        documents: vec![
            doc("20140101_0000001.pdf", &["Neu"]),
            doc("20140102_0000002.pdf", &["Neu", "Steuer"]),
        ],
        transactions: Vec::new(),
    };

    for _ in 0..2 {
        migrate_snapshot(&config, snapshot.clone()).await;
    }

    let mut target = connected(&url).await;
    assert_eq!(target.count_rows(&tables.labels).await.unwrap(), 2);
    assert_eq!(target.count_rows(&tables.docs).await.unwrap(), 2);
    assert_eq!(target.count_rows(&tables.docs_labels).await.unwrap(), 3);
    let neu = target.find_label(&tables.labels, "Neu").await.unwrap();
    assert!(neu.is_some());
    target.close().await.unwrap();

    drop_tables(&url, &tables).await;
}

#[tokio::test]
#[ignore] // Run with --ignored flag when MYSQL_URL is set
async fn test_trailing_space_labels_are_distinct() {
    let Some(url) = mysql_url() else {
        eprintln!("Skipping: MYSQL_URL not set");
        return;
    };
    let tables = scratch_tables("it_pad");
    drop_tables(&url, &tables).await;

    let config = snapshot_config(&url, &tables, InsertMode::Strict);
    let snapshot = Snapshot {
        documents: vec![
            doc("20140101_0000001.pdf", &["Neu"]),
            doc("20140102_0000002.pdf", &["Neu "]),
        ],
        transactions: Vec::new(),
    };
    migrate_snapshot(&config, snapshot).await;

    let mut target = connected(&url).await;
    let names: Vec<String> = target
        .fetch_labels(&tables.labels)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.name)
        .collect();
    assert_eq!(names, vec!["Neu".to_string(), "Neu ".to_string()]);
    assert_eq!(target.count_rows(&tables.docs_labels).await.unwrap(), 2);
    target.close().await.unwrap();

    drop_tables(&url, &tables).await;
}

#[tokio::test]
#[ignore] // Run with --ignored flag when MYSQL_URL is set; needs SUPER or SYSTEM_VARIABLES_ADMIN
async fn test_quotes_survive_no_backslash_escapes_server() {
    let Some(url) = mysql_url() else {
        eprintln!("Skipping: MYSQL_URL not set");
        return;
    };
    let tables = scratch_tables("it_escape");
    drop_tables(&url, &tables).await;

    let admin = sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .expect("Failed to connect to MySQL");
    let (global_mode,): (String,) = sqlx::query_as("SELECT @@GLOBAL.sql_mode")
        .fetch_one(&admin)
        .await
        .unwrap();
    sqlx::raw_sql("SET GLOBAL sql_mode = 'NO_BACKSLASH_ESCAPES'")
        .execute(&admin)
        .await
        .expect("Failed to change the global sql_mode");

    let config = snapshot_config(&url, &tables, InsertMode::Strict);
    let mut tricky = doc("20140101_0000001.pdf", &["O'Brien \\ Co"]);
    tricky.note = "it's a \\ note".to_string();
    let snapshot = Snapshot {
        documents: vec![tricky],
        transactions: Vec::new(),
    };
    let mut pipeline = Pipeline::with_stores(
        config,
        Box::new(SnapshotConnector::from_snapshot(snapshot)),
        Box::new(MySqlTarget::new(url.clone())),
    );
    let result = pipeline.run().await;

    sqlx::query("SET GLOBAL sql_mode = ?")
        .bind(&global_mode)
        .execute(&admin)
        .await
        .expect("Failed to restore the global sql_mode");
    admin.close().await;
    result.expect("Migration failed");

    let mut target = connected(&url).await;
    let label = target
        .find_label(&tables.labels, "O'Brien \\ Co")
        .await
        .unwrap();
    assert!(label.is_some());
    target.close().await.unwrap();

    drop_tables(&url, &tables).await;
}

#[tokio::test]
#[ignore] // Run with --ignored flag when MONGODB_URI is set
async fn test_mongodb_connection() {
    let Some(config) = mongo_config() else {
        eprintln!("Skipping: MONGODB_URI not set");
        return;
    };

    let mut connector = MongoDBConnector::new(config);
    connector.connect().await.expect("Failed to connect");

    let count = connector
        .count_documents()
        .await
        .expect("Failed to count documents");
    let documents: Vec<SourceDocument> = connector
        .documents()
        .await
        .expect("Failed to open cursor")
        .try_collect()
        .await
        .expect("Failed to read documents");
    let transactions = connector
        .transactions()
        .await
        .expect("Failed to read transactions");

    println!("✅ Connected to MongoDB!");
    println!("   Documents:    {:?} (read {})", count, documents.len());
    println!("   Transactions: {}", transactions.len());

    connector.close().await.expect("Failed to close");
}

#[tokio::test]
#[ignore] // Run with --ignored flag when both MONGODB_URI and MYSQL_URL are set
async fn test_full_migration() {
    let (Some(mongo), Some(url)) = (mongo_config(), mysql_url()) else {
        eprintln!("Skipping: MONGODB_URI and MYSQL_URL not set");
        return;
    };
    let tables = scratch_tables("it_full");
    drop_tables(&url, &tables).await;

    let config = MigrationConfig {
        source: SourceConfig::MongoDB(mongo),
        target: docma_migrate::config::TargetConfig { url: url.clone() },
        tables: tables.clone(),
        options: MigrationOptions {
            progress: false,
            ..MigrationOptions::default()
        },
    };
    config.validate().expect("Invalid config");

    let mut pipeline = Pipeline::new(config).expect("Failed to create pipeline");
    let stats = pipeline.run().await.expect("Migration failed");

    println!("✅ Migration complete!");
    println!("   Labels:       {}", stats.labels.unique);
    println!("   Documents:    {}", stats.documents.read);
    println!("   Transactions: {}", stats.accounting.inserted);
    println!("   Duration:     {:.2}s", stats.duration_secs);

    assert_eq!(
        stats.documents.inserted + stats.documents.updated,
        stats.documents.read
    );

    drop_tables(&url, &tables).await;
}
