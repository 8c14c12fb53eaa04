// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end coverage driven entirely through the umbrella crate's
//! re-exported surface, the way an embedding CLI would use it: a migration
//! directory on disk, a catalog backed by an on-disk SQLite file, and a
//! mock HTTP backend.

use httpmig::{Env, Migrator, MigratorConfig, SqliteStore, Store, TableNames};
use std::fs;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn applies_and_reverts_a_migration_through_the_umbrella_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "w-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/widgets/w-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("001_create_widget.yaml"),
        format!(
            r#"
up:
  name: create_widget
  request:
    method: POST
    url: "{}/widgets"
  response:
    result_code: ["201"]
    env_from:
      widget_id: id
down:
  name: delete_widget
  method: DELETE
  url: "{}/widgets/{{{{.env.widget_id}}}}"
"#,
            server.uri(),
            server.uri()
        ),
    )
    .unwrap();

    let db_path = dir.path().join("catalog.sqlite3");
    let store = SqliteStore::open(&db_path, TableNames::default()).unwrap();
    store.ensure().await.unwrap();
    let store: Arc<dyn Store> = Arc::new(store);

    let config = MigratorConfig {
        dir: dir.path().to_path_buf(),
        env0: Env::default(),
        ..MigratorConfig::default()
    };
    let migrator = Migrator::open(config, store.clone()).unwrap();

    let status_before = migrator.status().await.unwrap();
    assert_eq!(status_before.pending_up, 1);
    assert_eq!(status_before.pending_down, 0);

    migrator.run_up(0).await.unwrap();
    assert!(store.is_applied(1).await.unwrap());

    let status_after_up = migrator.status().await.unwrap();
    assert_eq!(status_after_up.pending_up, 0);
    assert_eq!(status_after_up.pending_down, 1);

    migrator.run_down(0).await.unwrap();
    assert!(!store.is_applied(1).await.unwrap());

    let status_after_down = migrator.status().await.unwrap();
    assert_eq!(status_after_down.pending_up, 1);
    assert_eq!(status_after_down.pending_down, 0);
}

#[tokio::test]
async fn dry_run_issues_no_requests_against_a_real_catalog_file() {
    let server = MockServer::start().await;
    // No mocks mounted: a real request here would fail the test, proving
    // the dry run never calls out.

    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("001_create_widget.yaml"),
        format!(
            r#"
up:
  name: create_widget
  request:
    method: POST
    url: "{}/widgets"
  response:
    result_code: ["201"]
"#,
            server.uri()
        ),
    )
    .unwrap();

    let db_path = dir.path().join("catalog.sqlite3");
    let store = SqliteStore::open(&db_path, TableNames::default()).unwrap();
    store.ensure().await.unwrap();
    let store: Arc<dyn Store> = Arc::new(store);

    let config = MigratorConfig {
        dir: dir.path().to_path_buf(),
        env0: Env::default(),
        ..MigratorConfig::default()
    };
    let migrator = Migrator::open(config, store.clone()).unwrap();

    let report = migrator.dry_run_up(0, None).await.unwrap();
    assert_eq!(report.previews.len(), 1);
    assert!(!store.is_applied(1).await.unwrap());
}
