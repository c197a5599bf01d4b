//! End-to-end sync tests against an in-memory SQLite database.

use std::io::Write;
use std::sync::Arc;

use oxide_sqlkit::{
    insert_sql, ColumnKind, ColumnSpec, Error, InsertMode, Query, RawQuery, Record, SqlValue,
    TableSpec,
};
use oxide_sqlkit_sync::{SchemaFile, SqliteSync, SyncError};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

#[derive(Debug, Clone, Default, Record)]
#[sqlkit(table = "users", unique_index = "email")]
struct User {
    #[sqlkit(auto_increment)]
    id: i64,
    #[sqlkit(width = 128, nullable = false)]
    email: String,
    #[sqlkit(nullable = true)]
    age: i32,
}

fn users_v2() -> TableSpec {
    TableSpec::builder("users")
        .column(
            ColumnSpec::builder("id", ColumnKind::BIGINT)
                .auto_increment()
                .build()
                .unwrap(),
        )
        .column(
            ColumnSpec::builder("email", ColumnKind::TEXT)
                .width(128)
                .not_null()
                .build()
                .unwrap(),
        )
        .column(
            ColumnSpec::builder("nickname", ColumnKind::TEXT)
                .width(16)
                .not_null()
                .default("none")
                .build()
                .unwrap(),
        )
        .unique_index(&["email"])
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_create_then_up_to_date() {
    let sync = SqliteSync::new(create_test_pool().await);
    let spec = User::table_spec().unwrap();

    let applied = sync.sync_table(&spec).await.unwrap();
    assert_eq!(
        applied,
        vec![
            "CREATE TABLE IF NOT EXISTS `users` (\n`id` INTEGER PRIMARY KEY NOT NULL,\n`email` TEXT NOT NULL COLLATE NOCASE,\n`age` INTEGER\n)",
            "CREATE UNIQUE INDEX `ix_users_email` ON `users` (`email`)",
        ]
    );
    assert_eq!(sync.table_names().await.unwrap(), vec!["users"]);

    let live = sync.live_columns("users").await.unwrap();
    assert_eq!(live.len(), 3);
    assert!(live[0].is_auto_increment());
    let indexes = sync.live_indexes("users").await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].is_unique() && indexes[0].is_identical(&["email"]));

    assert!(sync.plan_table(&spec).await.unwrap().is_empty());
    assert!(sync.sync_table(&spec).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rebuild_keeps_rows() {
    let sync = SqliteSync::new(create_test_pool().await);
    sync.sync_table(&User::table_spec().unwrap()).await.unwrap();

    let mut user = User {
        email: "ann@example.com".into(),
        age: 30,
        ..User::default()
    };
    let insert = insert_sql(sync.database(), &mut user, InsertMode::Insert).unwrap();
    assert_eq!(
        insert.sql(),
        "INSERT INTO `users` (`email`, `age`) VALUES (?, ?)"
    );
    assert_eq!(sync.execute(&insert).await.unwrap(), 1);

    let v2 = users_v2();
    let applied = sync.sync_table(&v2).await.unwrap();
    assert_eq!(
        applied[0],
        "ALTER TABLE `users` ADD COLUMN `nickname` TEXT NOT NULL DEFAULT 'none' COLLATE NOCASE"
    );
    assert!(applied.contains(&String::from("DROP TABLE `users`")));
    assert_eq!(sync.table_names().await.unwrap(), vec!["users"]);

    let live = sync.live_columns("users").await.unwrap();
    let names: Vec<&str> = live.iter().map(ColumnSpec::name).collect();
    assert_eq!(names, ["email", "id", "nickname"]);

    let rows = sync
        .fetch_rows(&RawQuery::new("SELECT id, email, nickname FROM users", Vec::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_deref(), Some("1"));
    assert_eq!(rows[0]["email"].as_deref(), Some("ann@example.com"));
    assert_eq!(rows[0]["nickname"].as_deref(), Some("none"));

    assert!(sync.plan_table(&v2).await.unwrap().is_empty());
}

fn items(extra: bool, note_nullable: bool) -> TableSpec {
    let mut note = ColumnSpec::builder("note", ColumnKind::TEXT).width(64);
    note = if note_nullable {
        note.nullable()
    } else {
        note.not_null().default("none")
    };
    let mut b = TableSpec::builder("items")
        .column(
            ColumnSpec::builder("id", ColumnKind::BIGINT)
                .auto_increment()
                .build()
                .unwrap(),
        )
        .column(note.build().unwrap());
    if extra {
        b = b.column(ColumnSpec::builder("extra", ColumnKind::INT).build().unwrap());
    }
    b.index(&["note"]).build().unwrap()
}

#[tokio::test]
async fn test_successive_rebuilds() {
    let sync = SqliteSync::new(create_test_pool().await);
    sync.sync_table(&items(true, false)).await.unwrap();
    sync.execute(
        &RawQuery::new(
            "INSERT INTO items (note, extra) VALUES (?, ?)",
            vec![SqlValue::Text("kept".into()), SqlValue::Int(3)],
        )
        .unwrap(),
    )
    .await
    .unwrap();

    // Dropping a column, then relaxing nullability: both rebuild.
    for spec in [items(false, false), items(false, true)] {
        let applied = sync.sync_table(&spec).await.unwrap();
        assert!(applied.contains(&String::from("DROP TABLE `items`")));
        assert_eq!(sync.table_names().await.unwrap(), vec!["items"]);
        assert!(sync.plan_table(&spec).await.unwrap().is_empty());
    }

    let indexes = sync.live_indexes("items").await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].is_identical(&["note"]));
    let rows = sync
        .fetch_rows(&RawQuery::new("SELECT note FROM items", Vec::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["note"].as_deref(), Some("kept"));
}

async fn notes(sync: &SqliteSync, q: Query) -> Vec<String> {
    let q = q.select_names(&["note"]);
    let raw = RawQuery::new(q.to_sql(), q.variables()).unwrap();
    sync.fetch_rows(&raw)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|mut row| row.remove("note").flatten())
        .collect()
}

#[tokio::test]
async fn test_contains_matches_wildcards_literally() {
    let sync = SqliteSync::new(create_test_pool().await);
    let spec = Arc::new(items(false, true));
    sync.sync_table(&spec).await.unwrap();
    for note in ["50% off", "50\\ x", "a_b", "axb"] {
        sync.execute(
            &RawQuery::new(
                "INSERT INTO items (note) VALUES (?)",
                vec![SqlValue::Text(note.into())],
            )
            .unwrap(),
        )
        .await
        .unwrap();
    }

    let table = sync.database().table(&spec);
    assert_eq!(
        notes(&sync, table.query().contains("note", "50%")).await,
        vec!["50% off"]
    );
    assert_eq!(
        notes(&sync, table.query().startswith("note", "a_")).await,
        vec!["a_b"]
    );
}

#[tokio::test]
async fn test_query_builder_against_live_table() {
    let sync = SqliteSync::new(create_test_pool().await);
    let spec = User::table_spec().unwrap();
    sync.sync_table(&spec).await.unwrap();
    for (email, age) in [("a@x.io", 20), ("b@x.io", 41)] {
        let mut user = User {
            email: email.into(),
            age,
            ..User::default()
        };
        let insert = insert_sql(sync.database(), &mut user, InsertMode::Insert).unwrap();
        sync.execute(&insert).await.unwrap();
    }

    let q = sync
        .database()
        .table(&spec)
        .query()
        .select_names(&["email"])
        .equals("age", 41);
    let raw = RawQuery::new(q.to_sql(), q.variables()).unwrap();
    let rows = sync.fetch_rows(&raw).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email"].as_deref(), Some("b@x.io"));

    let mut taken = User {
        email: "b@x.io".into(),
        ..User::default()
    };
    let insert = insert_sql(sync.database(), &mut taken, InsertMode::Insert).unwrap();
    assert!(matches!(
        sync.execute(&insert).await,
        Err(SyncError::Sql(Error::DuplicateEntry(_)))
    ));

    let mut dup = User {
        id: 1,
        email: "a2@x.io".into(),
        age: 21,
    };
    let upsert = insert_sql(sync.database(), &mut dup, InsertMode::Upsert).unwrap();
    sync.execute(&upsert).await.unwrap();
    let rows = sync
        .fetch_rows(
            &RawQuery::new("SELECT email, age FROM users WHERE id = ?", vec![SqlValue::Int(1)])
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["email"].as_deref(), Some("a2@x.io"));
    assert_eq!(rows[0]["age"].as_deref(), Some("21"));
}

#[tokio::test]
async fn test_indexed_column_stays_in_sync() {
    let sync = SqliteSync::new(create_test_pool().await);
    let spec = TableSpec::builder("events")
        .column(
            ColumnSpec::builder("id", ColumnKind::BIGINT)
                .auto_increment()
                .build()
                .unwrap(),
        )
        .column(
            ColumnSpec::builder("kind", ColumnKind::INT)
                .index()
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let applied = sync.sync_table(&spec).await.unwrap();
    assert_eq!(applied.len(), 2);
    assert!(applied[1].starts_with("CREATE INDEX"));
    assert!(sync.plan_table(&spec).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_executes_nothing() {
    let sync = SqliteSync::new(create_test_pool().await).dry_run(true);
    let planned = sync.sync_table(&User::table_spec().unwrap()).await.unwrap();
    assert_eq!(planned.len(), 2);
    assert!(sync.table_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_table_introspection() {
    let sync = SqliteSync::new(create_test_pool().await);
    assert!(matches!(
        sync.live_columns("nope").await,
        Err(SyncError::Sql(Error::TableNotExists(t))) if t == "nope"
    ));
}

const SCHEMA: &str = r#"{
    "tables": [
        {
            "name": "hosts",
            "columns": [
                { "name": "id", "kind": "u64", "tags": { "auto_increment": "true" } },
                { "name": "addr", "kind": "string", "tags": { "width": "64", "nullable": "false" } },
                { "name": "seen_at", "kind": "datetime", "optional": true }
            ],
            "indexes": [["addr", "seen_at"]]
        },
        {
            "name": "tags",
            "columns": [
                { "name": "host_id", "kind": "u64", "tags": { "primary": "true" } },
                { "name": "tag", "kind": "string", "tags": { "primary": "true", "width": "32" } }
            ]
        }
    ]
}"#;

#[tokio::test]
async fn test_sync_from_schema_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SCHEMA.as_bytes()).unwrap();
    let specs = SchemaFile::load(file.path()).unwrap().table_specs().unwrap();

    let sync = SqliteSync::new(create_test_pool().await);
    let applied = sync.sync_all(&specs).await.unwrap();
    assert_eq!(applied.len(), 3);
    assert_eq!(
        applied[1],
        "CREATE INDEX `ix_hosts_addr_seen_at` ON `hosts` (`addr`, `seen_at`)"
    );
    assert!(applied[2].contains("PRIMARY KEY (`host_id`, `tag`)"));

    let mut tables = sync.table_names().await.unwrap();
    tables.sort();
    assert_eq!(tables, vec!["hosts", "tags"]);
    assert!(sync.sync_all(&specs).await.unwrap().is_empty());
}
