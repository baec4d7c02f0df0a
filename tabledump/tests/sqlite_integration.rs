//! End-to-end command tests against file-backed SQLite databases.

use clap::Parser;
use std::path::Path;
use tabledump::{Cli, commands};
use tabledump_core::TableDumpError;
use tempfile::TempDir;

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, active BOOLEAN)",
    "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, body TEXT)",
    "CREATE TABLE ar_internal_metadata (key TEXT PRIMARY KEY, value TEXT)",
];

fn database_url(dir: &Path, name: &str) -> String {
    format!("sqlite://{}?mode=rwc", dir.join(name).display())
}

async fn execute_all(url: &str, statements: &[&str]) {
    let pool = sqlx::SqlitePool::connect(url).await.unwrap();
    for statement in statements {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

async fn fetch_users(url: &str) -> Vec<(i64, String, Option<bool>)> {
    let pool = sqlx::SqlitePool::connect(url).await.unwrap();
    let rows = sqlx::query_as("SELECT id, name, active FROM users ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    pool.close().await;
    rows
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

async fn prepared_databases(dir: &Path) -> (String, String) {
    let source = database_url(dir, "source.db");
    let target = database_url(dir, "target.db");
    execute_all(&source, SCHEMA).await;
    execute_all(
        &source,
        &[
            "INSERT INTO users VALUES (1, 'ada', 1), (2, 'bob', 0), (3, 'cy', NULL)",
            "INSERT INTO posts VALUES (1, 1, 'hello')",
            "INSERT INTO ar_internal_metadata VALUES ('environment', 'test')",
        ],
    )
    .await;
    execute_all(&target, SCHEMA).await;
    (source, target)
}

#[tokio::test]
async fn test_sqlite_dump_and_load_file() {
    let dir = TempDir::new().unwrap();
    let (source, target) = prepared_databases(dir.path()).await;
    let dump_path = dir.path().join("backup.json");
    let dump_arg = dump_path.to_string_lossy().to_string();

    temp_env::async_with_vars(
        [
            ("DATABASE_URL", None::<&str>),
            ("TABLEDUMP_TABLES", None),
            ("TABLEDUMP_EXCLUDE", None),
        ],
        async {
            tabledump::run(&cli(&["tabledump", "--database-url", &source, "dump", &dump_arg]))
                .await
                .unwrap();
            tabledump::run(&cli(&["tabledump", "--database-url", &target, "load", &dump_arg]))
                .await
                .unwrap();
        },
    )
    .await;

    let dump: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&dump_path).unwrap()).unwrap();
    assert!(dump.get("ar_internal_metadata").is_none());
    assert_eq!(dump["users"]["records"][0], serde_json::json!([1, "ada", true]));

    let manifest: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("backup.json.manifest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["tables"].as_array().unwrap().len(), 2);

    assert_eq!(
        fetch_users(&target).await,
        vec![
            (1, "ada".to_string(), Some(true)),
            (2, "bob".to_string(), Some(false)),
            (3, "cy".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn test_sqlite_data_only_directory_dump_with_filter() {
    let dir = TempDir::new().unwrap();
    let (source, target) = prepared_databases(dir.path()).await;
    let out = format!("{}/", dir.path().join("tables").display());

    temp_env::async_with_vars(
        [
            ("DATABASE_URL", Some(source.as_str())),
            ("TABLEDUMP_TABLES", Some("users:posts")),
            ("TABLEDUMP_EXCLUDE", Some("posts")),
        ],
        async {
            tabledump::run(&cli(&["tabledump", "dump-data-only", &out]))
                .await
                .unwrap();
        },
    )
    .await;

    let tables = dir.path().join("tables");
    assert!(tables.join("users.json").exists());
    assert!(!tables.join("posts.json").exists());
    assert!(!tables.join(".manifest.json").exists());

    let args = tabledump::LoadArgs {
        target: tables.to_string_lossy().to_string(),
        no_truncate: false,
        batch_size: 2,
    };
    let rows = commands::run_load(&target, &args).await.unwrap();
    assert_eq!(rows, 3);
    assert_eq!(fetch_users(&target).await.len(), 3);
}

#[tokio::test]
async fn test_sqlite_load_without_truncate_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let (_, target) = prepared_databases(dir.path()).await;
    execute_all(&target, &["INSERT INTO users VALUES (10, 'kept', 0)"]).await;

    let dump_path = dir.path().join("users.json");
    std::fs::write(
        &dump_path,
        r#"{"users": {"columns": ["id", "name", "active"], "records": [[11, "new", true]]}}"#,
    )
    .unwrap();

    let args = tabledump::LoadArgs {
        target: dump_path.to_string_lossy().to_string(),
        no_truncate: true,
        batch_size: 100,
    };
    commands::run_load(&target, &args).await.unwrap();

    let users = fetch_users(&target).await;
    assert_eq!(users.len(), 2);
    assert_eq!(users[1], (11, "new".to_string(), Some(true)));
}

#[tokio::test]
async fn test_sqlite_load_of_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let (_, target) = prepared_databases(dir.path()).await;

    let args = tabledump::LoadArgs {
        target: dir.path().join("absent.json").to_string_lossy().to_string(),
        no_truncate: false,
        batch_size: 100,
    };
    let err = commands::run_load(&target, &args).await.unwrap_err();
    assert!(matches!(err, TableDumpError::Io { .. }));
}

#[tokio::test]
async fn test_sqlite_connection_check() {
    let dir = TempDir::new().unwrap();
    let (source, _) = prepared_databases(dir.path()).await;
    commands::test_connection(&source).await.unwrap();
}
