mod common;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use common::{MockProvider, catalog_rows, is_catalog_query, record_row};
use pretty_assertions::assert_eq;
use schemasync::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, PartialEq, Entity, Serialize, Deserialize)]
#[table(name = "operators")]
struct Operator {
    #[column(primary_key)]
    id: i64,
    #[column(unique)]
    name: String,
    rarity: Option<i32>,
    tags: Vec<String>,
    #[column(default = true)]
    recruitable: bool,
    #[column(name = "createdAt", default = "now")]
    #[serde(rename = "createdAt")]
    created_at: Option<NaiveDateTime>,
    #[column(references = "faction.id")]
    faction: Option<i64>,
    profile: Option<serde_json::Value>,
}

#[derive(Debug, Entity, Serialize, Deserialize)]
struct Faction {
    #[column(primary_key, uuid)]
    id: Option<String>,
    #[column(kind = "object", nullable)]
    crest: String,
}

#[derive(Debug, PartialEq, Entity, Serialize, Deserialize)]
#[table(name = "shifts")]
struct Shift {
    #[column(primary_key)]
    id: i64,
    starts: NaiveDateTime,
    #[column(kind = "string")]
    logged: DateTime<Utc>,
    #[column(kind = "string")]
    day: NaiveDate,
}

#[test]
fn test_derived_descriptor() {
    let table = Operator::descriptor().unwrap();
    assert_eq!(table.name(), "operators");

    let kinds: Vec<(&str, FieldKind)> = table
        .fields()
        .iter()
        .map(|f| (f.name.as_str(), f.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("id", FieldKind::Number),
            ("name", FieldKind::String),
            ("rarity", FieldKind::Number),
            ("tags", FieldKind::Array),
            ("recruitable", FieldKind::Boolean),
            ("createdAt", FieldKind::Date),
            ("faction", FieldKind::Number),
            ("profile", FieldKind::Any),
        ]
    );

    let id = table.field("id").unwrap();
    assert!(id.metadata.primary_key);
    assert!(!id.metadata.not_null);

    let name = table.field("name").unwrap();
    assert!(name.metadata.unique && name.metadata.not_null);
    assert!(!table.field("rarity").unwrap().metadata.not_null);
    assert_eq!(
        table.field("recruitable").unwrap().metadata.default_value,
        Some(DefaultValue::Boolean(true))
    );
    assert_eq!(
        table.field("faction").unwrap().metadata.references,
        Some(References::new("faction", "id"))
    );
}

#[test]
fn test_derived_defaults_and_overrides() {
    let table = Faction::descriptor().unwrap();
    assert_eq!(table.name(), "faction");
    let id = table.field("id").unwrap();
    assert_eq!(id.kind, FieldKind::String);
    assert!(id.metadata.generate_uuid);
    let crest = table.field("crest").unwrap();
    assert_eq!(crest.kind, FieldKind::Object);
    assert!(!crest.metadata.not_null);
}

#[tokio::test]
async fn test_typed_table_through_orm() {
    let provider = MockProvider::new(|sql, _| {
        if is_catalog_query(sql) {
            Ok(catalog_rows(&[]))
        } else if sql.starts_with("INSERT") {
            Ok(record_row(json!({
                "id": 1,
                "name": "Amiya",
                "rarity": 5,
                "tags": ["caster"],
                "recruitable": true,
                "createdAt": "2024-05-01T08:00:00",
                "faction": null,
                "profile": null
            })))
        } else {
            Ok(vec![])
        }
    });
    let recorder = provider.recorder();
    let schema = Schema::new(vec![
        Faction::descriptor().unwrap(),
        Operator::descriptor().unwrap(),
    ])
    .unwrap();
    let orm = Orm::with_provider(Arc::new(provider), schema);

    let reports = orm.migrate().await.unwrap();
    assert_eq!(reports[1].added.len(), 8);

    let operators = orm.table::<Operator>().unwrap();
    let stored = operators
        .insert(&Operator {
            id: 1,
            name: "Amiya".into(),
            rarity: Some(5),
            tags: vec!["caster".into()],
            recruitable: true,
            created_at: None,
            faction: None,
            profile: None,
        })
        .await
        .unwrap();
    assert!(stored.created_at.is_some());

    let insert = recorder
        .statements()
        .into_iter()
        .find(|sql| sql.starts_with("INSERT"))
        .unwrap();
    // null fields are left to column defaults
    assert!(!insert.contains(r#""createdAt""#), "{insert}");

    assert!(matches!(
        operators.update(1, json!(["not", "an", "object"])).await,
        Err(OrmError::Serialization(_))
    ));
    assert_eq!(recorder.acquired(), recorder.released());
}

#[test]
fn test_table_outside_schema_is_rejected() {
    let orm = Orm::with_provider(Arc::new(MockProvider::silent()), Schema::default());
    assert!(matches!(orm.table::<Faction>(), Err(OrmError::UnknownTable(_))));
}

#[tokio::test]
async fn test_time_types_round_trip_through_their_columns() {
    let table = Shift::descriptor().unwrap();
    assert_eq!(table.field("starts").unwrap().kind, FieldKind::Date);
    assert_eq!(table.field("logged").unwrap().kind, FieldKind::String);
    assert_eq!(table.field("day").unwrap().kind, FieldKind::String);

    // rows come back the way to_jsonb renders TIMESTAMP and TEXT columns
    let provider = MockProvider::new(|_, _| {
        Ok(record_row(json!({
            "id": 3,
            "starts": "2024-05-01T08:00:00",
            "logged": "2024-05-01T08:00:00Z",
            "day": "2024-05-01",
        })))
    });
    let recorder = provider.recorder();
    let orm = Orm::with_provider(Arc::new(provider), Schema::new(vec![table]).unwrap());
    let shifts = orm.table::<Shift>().unwrap();

    let shift = Shift {
        id: 3,
        starts: NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap(),
        logged: "2024-05-01T08:00:00Z".parse().unwrap(),
        day: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
    };
    let stored = shifts.insert(&shift).await.unwrap();
    assert_eq!(stored, shift);
    assert!(recorder.params(0).contains(&json!("2024-05-01T08:00:00Z")));
    assert!(recorder.params(0).contains(&json!("2024-05-01")));
}
