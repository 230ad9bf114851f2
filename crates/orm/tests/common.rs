//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use anyhow::bail;
use chrono::{NaiveDate, NaiveDateTime};
use tabula_orm::{
    DataType, Database, FetchValue, Mapping, MetadataCache, RawVoid, Registry, Row, entity, params,
};
use tabula_sql::Pool;
use tabula_sql::sqlite::ConnectOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Player,
    Vip,
    Admin,
}

impl Rank {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "PLAYER",
            Self::Vip => "VIP",
            Self::Admin => "ADMIN",
        }
    }
}

pub struct RankMapping;

impl Mapping<Rank> for RankMapping {
    fn to_sql(&self, value: &Rank) -> DataType {
        DataType::Str(value.as_str().to_string())
    }

    fn from_row(&self, row: &Row, column: &str) -> anyhow::Result<Rank> {
        match String::fetch(row, column)?.as_str() {
            "PLAYER" => Ok(Rank::Player),
            "VIP" => Ok(Rank::Vip),
            "ADMIN" => Ok(Rank::Admin),
            other => bail!("unknown rank {other}"),
        }
    }
}

entity! {
    table = "users",
    columns = [(first_join, "joined")],
    insert = ["id", "name", "rank", "first_join"],
    unique = "id",
    #[derive(Debug, Clone, PartialEq)]
    pub struct User {
        pub id: Uuid,
        pub name: String,
        pub rank: Rank,
        pub first_join: NaiveDateTime,
    }
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: String::new(),
            rank: Rank::Player,
            first_join: joined(),
        }
    }
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            ..Self::default()
        }
    }
}

entity! {
    table = "scores",
    insert = ["player", "points", "note"],
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Score {
        pub id: i64,
        pub player: String,
        pub points: i32,
        pub note: Option<String>,
    }
}

pub const CREATE_USERS: &str = "CREATE TABLE users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    rank TEXT NOT NULL DEFAULT 'PLAYER',
    joined TEXT NOT NULL
)";

pub const CREATE_SCORES: &str = "CREATE TABLE scores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player TEXT NOT NULL,
    points INTEGER NOT NULL,
    note TEXT
)";

/// A fixed join time with sub-second precision.
pub fn joined() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|date| date.and_hms_micro_opt(10, 30, 45, 123_456))
        .unwrap_or_default()
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Registry with the built-in mappings plus `Rank`.
pub fn registry() -> Arc<Registry> {
    let registry = Registry::new();
    registry.register::<Rank, _>(RankMapping);
    Arc::new(registry)
}

/// A database over a named shared in-memory `SQLite` database, with the
/// `users` and `scores` tables created.
pub fn database(name: &str) -> Database {
    database_with_pool_size(name, 10)
}

/// Like [`database`], with at most `max_size` pooled connections.
pub fn database_with_pool_size(name: &str, max_size: usize) -> Database {
    init_tracing();

    let mut options = ConnectOptions::new(format!("file:{name}?mode=memory&cache=shared"));
    options.max_size = max_size;
    let pool = Pool::sqlite(options).expect("should open database");
    let db = Database::new(pool).with_registry(registry()).with_metadata(MetadataCache::new());

    db.execute_sync(RawVoid::new(CREATE_USERS, params![])).expect("should create users");
    db.execute_sync(RawVoid::new(CREATE_SCORES, params![])).expect("should create scores");
    db
}
