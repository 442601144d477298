//! Configuration is re-read whenever the connection is rebuilt.

mod common;

use common::shop;
use quarry_core::Error;
use quarry_query::{ContextBuilder, TableQuery};
use quarry_storage::JsonFileConfig;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, password: &str) -> std::path::PathBuf {
    let path = dir.path().join("connection.json");
    let json = format!(
        r#"{{"server":"localhost","port":3306,"name":"shop","user":"admin","password":"{}"}}"#,
        password
    );
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_reconnect_reads_updated_config() {
    let db = shop();
    db.require_credentials("admin", "secret");
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "wrong");

    let ctx = ContextBuilder::new(db.clone())
        .config(JsonFileConfig::new(&path))
        .build()
        .unwrap();
    let items = TableQuery::new(&ctx, "items");
    let err = items.err().unwrap();
    assert!(matches!(err.root_cause(), Error::Connection { .. }));

    write_config(&dir, "secret");
    let items = TableQuery::new(&ctx, "items").unwrap();
    assert_eq!(items.rows().unwrap().len(), 1);
    assert_eq!(db.connect_count(), 1);

    db.drop_connections();
    write_config(&dir, "rotated");
    let err = items.rows().unwrap_err();
    assert!(matches!(err.root_cause(), Error::Connection { .. }));

    db.require_credentials("admin", "rotated");
    assert_eq!(items.rows().unwrap().len(), 1);
    assert_eq!(db.connect_count(), 2);
}

#[test]
fn test_missing_config_file_is_a_config_error() {
    let db = shop();
    let dir = TempDir::new().unwrap();
    let ctx = ContextBuilder::new(db)
        .config(JsonFileConfig::new(dir.path().join("absent.json")))
        .build()
        .unwrap();
    let err = ctx.connection().unwrap_err();
    assert!(matches!(err.root_cause(), Error::Config { .. }));
}
