//! Integration tests for operations run synchronously against `SQLite`.
//!
//! Tests the public API as users would interact with it.

#![allow(missing_docs)]

mod common;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use common::{CREATE_USERS, Rank, Score, User, database, joined, registry};
use rust_decimal::Decimal;
use tabula_orm::{
    DataType, Database, Error, FetchAll, Insert, RawFetch, RawVoid, Registry, SingleFetch, Update,
    entity, params,
};
use tabula_sql::sqlite::ConnectOptions;
use uuid::Uuid;

entity! {
    table = "readings",
    unique = "id",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Reading {
        pub id: i64,
        pub label: String,
        pub active: bool,
        pub visits: i32,
        pub ratio: f32,
        pub scale: f32,
        pub weight: f64,
        pub total: f64,
        pub price: Decimal,
        pub tag: Uuid,
        pub day: NaiveDate,
        pub seen: NaiveDateTime,
        pub stamped: DateTime<Utc>,
        pub payload: Vec<u8>,
        pub meta: serde_json::Value,
    }
}

// declared types as a schema would write them, so SQLite applies its affinities
const CREATE_READINGS: &str = "CREATE TABLE readings (
    id INTEGER PRIMARY KEY,
    label TEXT NOT NULL,
    active BOOLEAN NOT NULL,
    visits INTEGER NOT NULL,
    ratio NUMERIC NOT NULL,
    scale REAL NOT NULL,
    weight REAL NOT NULL,
    total NUMERIC NOT NULL,
    price DECIMAL(10,2) NOT NULL,
    tag TEXT NOT NULL,
    day DATE NOT NULL,
    seen TIMESTAMP NOT NULL,
    stamped TIMESTAMP NOT NULL,
    payload BLOB NOT NULL,
    meta TEXT NOT NULL
)";

#[test]
fn insert_then_fetch_by_unique_key() {
    let db = database("insert_then_fetch_by_unique_key");
    let user = User {
        rank: Rank::Admin,
        ..User::new("Ada")
    };

    db.execute_sync(Insert::new(user.clone())).unwrap();

    let fetched = db.execute_sync(SingleFetch::<User>::new().r#where("id", user.id)).unwrap();
    assert_eq!(fetched, Some(user));
}

#[test]
fn user_lifecycle() {
    let db = database("user_lifecycle");
    let id = Uuid::new_v4();

    let user = User {
        id,
        ..User::new("Sam")
    };
    db.execute_sync(Insert::new(user)).unwrap();

    // fetch by name: rank took its default
    let mut user = db
        .execute_sync(SingleFetch::<User>::new().r#where("name", "Sam"))
        .unwrap()
        .expect("user should exist");
    assert_eq!(user.rank, Rank::Player);
    assert_eq!(user.first_join, joined());

    user.rank = Rank::Vip;
    let affected = db.execute_sync(Update::new(user, "rank")).unwrap();
    assert_eq!(affected, 1);

    let user = db
        .execute_sync(SingleFetch::<User>::new().r#where("id", id))
        .unwrap()
        .expect("user should exist");
    assert_eq!(user.rank, Rank::Vip);
    assert_eq!(user.name, "Sam");
}

#[test]
fn update_changes_only_named_field() {
    let db = database("update_changes_only_named_field");
    let original = User::new("Kim");
    db.execute_sync(Insert::new(original.clone())).unwrap();

    let mut changed = original.clone();
    changed.name = "Not persisted".to_string();
    changed.rank = Rank::Admin;
    db.execute_sync(Update::new(changed, "rank")).unwrap();

    let stored = db
        .execute_sync(SingleFetch::<User>::new().r#where("id", original.id))
        .unwrap()
        .expect("user should exist");
    assert_eq!(stored.rank, Rank::Admin);
    assert_eq!(stored.name, original.name);
    assert_eq!(stored.first_join, original.first_join);
}

#[test]
fn update_with_extra_conditions() {
    let db = database("update_with_extra_conditions");
    let mut user = User::new("Lee");
    db.execute_sync(Insert::new(user.clone())).unwrap();

    // condition does not match, so the unique key alone is not enough
    user.rank = Rank::Vip;
    let affected =
        db.execute_sync(Update::new(user.clone(), "rank").r#where("name", "Someone else")).unwrap();
    assert_eq!(affected, 0);

    let affected = db.execute_sync(Update::new(user, "rank").r#where("name", "Lee")).unwrap();
    assert_eq!(affected, 1);
}

#[test]
fn update_without_key_needs_conditions() {
    let db = database("update_without_key_needs_conditions");
    db.execute_sync(Insert::new(Score {
        player: "Sam".to_string(),
        points: 10,
        ..Score::default()
    }))
    .unwrap();

    let score = Score {
        points: 99,
        ..Score::default()
    };
    let err = db.execute_sync(Update::new(score.clone(), "points")).unwrap_err();
    assert!(err.is_declaration());

    let affected = db.execute_sync(Update::new(score, "points").r#where("player", "Sam")).unwrap();
    assert_eq!(affected, 1);

    let stored = db
        .execute_sync(SingleFetch::<Score>::new().r#where("player", "Sam"))
        .unwrap()
        .expect("score should exist");
    assert_eq!(stored.points, 99);
    assert_eq!(stored.note, None);
}

#[test]
fn fetch_without_match_is_absent() {
    let db = database("fetch_without_match_is_absent");

    let fetched = db.execute_sync(SingleFetch::<User>::new().r#where("name", "Nobody")).unwrap();
    assert!(fetched.is_none());

    let fetched = db.execute_sync(FetchAll::<User>::new()).unwrap();
    assert!(fetched.is_empty());
}

#[test]
fn fetch_all_with_limit() {
    let db = database("fetch_all_with_limit");
    for (player, points) in [("Sam", 1), ("Sam", 2), ("Kim", 3)] {
        db.execute_sync(Insert::new(Score {
            player: player.to_string(),
            points,
            note: Some(format!("{player}-{points}")),
            ..Score::default()
        }))
        .unwrap();
    }

    let scores = db.execute_sync(FetchAll::<Score>::new().r#where("player", "Sam")).unwrap();
    assert_eq!(scores.len(), 2);
    assert!(scores.iter().all(|score| score.player == "Sam"));
    assert_eq!(scores[1].note.as_deref(), Some("Sam-2"));

    let scores = db.execute_sync(FetchAll::<Score>::new().limit(1)).unwrap();
    assert_eq!(scores.len(), 1);
    assert!(scores[0].id > 0);
}

#[test]
fn unmapped_write_is_not_fatal() {
    #[derive(Debug)]
    struct Unmapped;

    let db = database("unmapped_write_is_not_fatal");

    // the unbound slot reaches SQLite as NULL, so the nullable column accepts it
    let affected = db
        .execute_sync(RawVoid::new(
            "INSERT INTO scores (player, points, note) VALUES (?, ?, ?)",
            params!["Sam", 5, Unmapped],
        ))
        .unwrap();
    assert_eq!(affected, 1);

    // a NOT NULL column turns the unbound slot into a constraint failure
    let err = db
        .execute_sync(RawVoid::new(
            "INSERT INTO scores (player, points) VALUES (?, ?)",
            params![Unmapped, 5],
        ))
        .unwrap_err();
    assert!(err.is_execution());
}

#[test]
fn unmapped_read_fails_unless_lenient() {
    let db = database("unmapped_read_fails_unless_lenient");
    let user = User {
        rank: Rank::Vip,
        ..User::new("Sam")
    };
    db.execute_sync(Insert::new(user.clone())).unwrap();

    // same pool, but a registry that does not know `Rank`
    let plain = db.clone().with_registry(Arc::new(Registry::new()));

    let err = plain.execute_sync(SingleFetch::<User>::new().r#where("id", user.id)).unwrap_err();
    assert!(err.is_mapping());

    let fetched = plain
        .execute_sync(SingleFetch::<User>::new().r#where("id", user.id).lenient())
        .unwrap()
        .expect("user should exist");
    assert_eq!(fetched.name, "Sam");
    assert_eq!(fetched.rank, Rank::Player);
}

#[test]
fn registry_overwrite_applies_to_later_operations() {
    let db = database("registry_overwrite_applies_to_later_operations");
    db.registry().register_fn(
        |rank: &Rank| DataType::Str(rank.as_str().to_lowercase()),
        |_row: &tabula_orm::Row, _column: &str| Ok(Rank::Admin),
    );

    let user = User::new("Sam");
    db.execute_sync(Insert::new(user.clone())).unwrap();

    let mut cursor = db
        .execute_sync(RawFetch::new("SELECT rank FROM users WHERE id=?", params![user.id]))
        .unwrap();
    let row = cursor.next().expect("row should exist");
    cursor.close();
    assert_eq!(row.get("rank"), Some(&DataType::Str("player".to_string())));

    let fetched = db.execute_sync(SingleFetch::<User>::new().r#where("id", user.id)).unwrap();
    assert_eq!(fetched.map(|user| user.rank), Some(Rank::Admin));
}

#[test]
fn raw_fetch_cursor_releases_connection() {
    let db = database("raw_fetch_cursor_releases_connection");
    for name in ["a", "b", "c"] {
        db.execute_sync(Insert::new(User::new(name))).unwrap();
    }

    let idle = db.pool().idle();
    let cursor =
        db.execute_sync(RawFetch::new("SELECT name FROM users ORDER BY name", params![])).unwrap();
    assert_eq!(cursor.remaining(), 3);
    assert_eq!(db.pool().idle(), idle - 1);

    let names: Vec<_> = cursor
        .map(|row| match row.get("name") {
            Some(DataType::Str(name)) => name.clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(db.pool().idle(), idle);
}

#[test]
fn retained_cursor_is_released_explicitly() {
    let db = database("retained_cursor_is_released_explicitly");
    db.execute_sync(Insert::new(User::new("Sam"))).unwrap();

    let idle = db.pool().idle();
    let mut retained = db
        .execute_sync(RawFetch::new("SELECT * FROM users", params![]))
        .unwrap()
        .retain();
    assert!(retained.statement().is_some());
    assert!(retained.next().is_some());
    assert!(retained.next().is_none());
    assert_eq!(db.pool().idle(), idle - 1);

    retained.release();
    assert_eq!(db.pool().idle(), idle);
}

#[test]
fn raw_void_reports_affected_rows() {
    let db = database("raw_void_reports_affected_rows");
    for name in ["a", "b", "c"] {
        db.execute_sync(Insert::new(User::new(name))).unwrap();
    }

    let affected = db
        .execute_sync(RawVoid::new("UPDATE users SET rank=? WHERE name<>?", params![Rank::Vip, "a"]))
        .unwrap();
    assert_eq!(affected, 2);

    let vips = db.execute_sync(FetchAll::<User>::new().r#where("rank", Rank::Vip)).unwrap();
    assert_eq!(vips.len(), 2);
}

#[test]
fn nullable_fields_round_trip() {
    let db = database("nullable_fields_round_trip");
    db.execute_sync(Insert::new(Score {
        player: "Sam".to_string(),
        points: 1,
        note: None,
        ..Score::default()
    }))
    .unwrap();

    let fetched = db
        .execute_sync(SingleFetch::<Score>::new().r#where("note", None::<String>))
        .unwrap();
    // `note = NULL` never matches in SQL
    assert!(fetched.is_none());

    let fetched = db
        .execute_sync(SingleFetch::<Score>::new().r#where("player", "Sam"))
        .unwrap()
        .expect("score should exist");
    assert_eq!(fetched.note, None);
}

#[test]
fn invalid_sql_is_an_execution_error() {
    let db = database("invalid_sql_is_an_execution_error");

    let err = db.execute_sync(RawVoid::new("INSERT INTO missing VALUES (?)", params![1])).unwrap_err();
    assert!(err.is_execution());
    assert!(matches!(err, Error::Execution(tabula_sql::Error::Driver(_))));

    // the connection went back to the pool despite the failure
    assert_eq!(db.pool().idle(), db.pool().size());
}

#[test]
fn closed_database_rejects_operations() {
    let db = database("closed_database_rejects_operations");
    assert!(db.is_connected());

    db.close();
    assert!(!db.is_connected());

    let err = db.execute_sync(FetchAll::<User>::new()).unwrap_err();
    assert!(matches!(err, Error::Execution(tabula_sql::Error::PoolClosed)));
}

#[test]
fn builtin_scalars_round_trip() {
    let db = database("builtin_scalars_round_trip");
    db.execute_sync(RawVoid::new(CREATE_READINGS, params![])).unwrap();

    let stamped = DateTime::from_timestamp(1_705_314_645, 123_456_000).unwrap();
    let whole = Reading {
        id: 1,
        label: "whole".to_string(),
        active: true,
        visits: -3,
        ratio: 2.0,
        scale: 3.0,
        weight: 4.0,
        total: 5.0,
        price: Decimal::from_str("12.00").unwrap(),
        tag: Uuid::new_v4(),
        day: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        seen: joined(),
        stamped,
        payload: vec![0, 1, 254, 255],
        meta: serde_json::json!({"tags": ["a", "b"], "level": 3}),
    };
    let fractional = Reading {
        id: 2,
        label: "fractional".to_string(),
        active: false,
        ratio: 0.25,
        scale: 0.1,
        weight: 1.1,
        total: 2.75,
        price: Decimal::from_str("19.99").unwrap(),
        payload: Vec::new(),
        meta: serde_json::json!([1.5, null]),
        ..whole.clone()
    };

    for reading in [&whole, &fractional] {
        db.execute_sync(Insert::new(reading.clone())).unwrap();

        let fetched = db
            .execute_sync(SingleFetch::<Reading>::new().r#where("id", reading.id))
            .unwrap()
            .expect("reading should exist");
        assert_eq!(&fetched, reading);
    }
}

#[test]
fn connect_with_named_database() {
    let mut options =
        ConnectOptions::new("file:connect_with_named_database?mode=memory&cache=shared");
    options.max_size = 2;

    let db = Database::connect_with(options).unwrap().with_registry(registry());
    assert!(db.is_connected());
    assert_eq!(db.pool().config().max_size, 2);

    db.execute_sync(RawVoid::new(CREATE_USERS, params![])).unwrap();
    let user = User::new("Sam");
    db.execute_sync(Insert::new(user.clone())).unwrap();

    let fetched = db.execute_sync(SingleFetch::<User>::new().r#where("id", user.id)).unwrap();
    assert_eq!(fetched, Some(user));
}
