//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use eav_core::{
  attribute::{Attribute, AttributeType, Choice},
  entity::{Entity, EntityState},
  header::SplitStrategy,
  hierarchy::Hierarchy,
  manager::Manager,
  schema::Schema,
  temporal::{Selector, Versioned, is_well_ordered},
  value::{Value, ValuePayload},
};
use eav_sql::Filter;
use serde_json::json;

use crate::{Error, SqliteStore, StoreConfig};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn is_chronology(err: &Error) -> bool {
  matches!(err, Error::Core(eav_core::Error::Chronology { .. }))
}

// ─── Lineages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_and_get_schema() {
  let s = store().await;
  let schemas = s.schemas();

  let put = schemas.put("demographics", Schema::new("Demographics")).await.unwrap();
  assert_eq!(put.name, "demographics");
  assert!(put.is_active());
  assert_eq!(put.create_date, put.modify_date);

  let fetched = schemas.get("demographics", None).await.unwrap();
  assert_eq!(fetched, Some(put));
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.schemas().get("missing", None).await.unwrap().is_none());
  assert!(!s.schemas().retire("missing").await.unwrap());
  assert!(s.schemas().restore("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn put_retires_previous_version() {
  let s = store().await;
  let schemas = s.schemas();

  let v1 = schemas.put_at("demographics", Schema::new("Demographics"), at(2020, 1, 1)).await.unwrap();
  let v2 = schemas.put_at("demographics", Schema::new("Demographics v2"), at(2021, 6, 1)).await.unwrap();

  let history = schemas.lifecycles("demographics").await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(is_well_ordered(&history));
  assert_eq!(history[0].remove_date, Some(v2.create_date));
  assert!(history[1].is_active());

  let then = schemas.get("demographics", Some(at(2020, 6, 1))).await.unwrap().unwrap();
  assert_eq!(then.id, v1.id);
  let now = schemas.get("demographics", None).await.unwrap().unwrap();
  assert_eq!(now.id, v2.id);
  assert!(schemas.get("demographics", Some(at(2019, 1, 1))).await.unwrap().is_none());
}

#[tokio::test]
async fn repeated_puts_keep_one_active_version() {
  let s = store().await;
  let entities = s.entities();
  let schema = s.schemas().put("form", Schema::new("Form")).await.unwrap();

  for _ in 0..5 {
    entities.put("subject-1", Entity::new(schema.id)).await.unwrap();
  }

  let history = entities.lifecycles("subject-1").await.unwrap();
  assert_eq!(history.len(), 5);
  assert_eq!(history.iter().filter(|l| l.is_active()).count(), 1);
  assert!(is_well_ordered(&history));
}

#[tokio::test]
async fn retire_then_restore_returns_same_version() {
  let s = store().await;
  let schemas = s.schemas();
  let put = schemas.put("demographics", Schema::new("Demographics")).await.unwrap();

  assert!(schemas.retire("demographics").await.unwrap());
  assert!(!schemas.retire("demographics").await.unwrap());
  assert!(schemas.get("demographics", None).await.unwrap().is_none());
  assert!(!schemas.has("demographics", Selector::Current).await.unwrap());
  assert!(schemas.has("demographics", Selector::Ever).await.unwrap());

  let restored = schemas.restore("demographics").await.unwrap().unwrap();
  assert_eq!(restored.id, put.id);
  assert_eq!(restored.item, put.item);
  assert!(restored.is_active());
}

#[tokio::test]
async fn restore_returns_active_version_unchanged() {
  let s = store().await;
  let schemas = s.schemas();
  let put = schemas.put("demographics", Schema::new("Demographics")).await.unwrap();

  let restored = schemas.restore("demographics").await.unwrap().unwrap();
  assert_eq!(restored, put);
  assert_eq!(schemas.lifecycles("demographics").await.unwrap().len(), 1);
}

#[tokio::test]
async fn keys_follow_selector() {
  let s = store().await;
  let schemas = s.schemas();
  schemas.put_at("alpha", Schema::new("Alpha"), at(2020, 1, 1)).await.unwrap();
  schemas.put_at("beta", Schema::new("Beta"), at(2020, 1, 1)).await.unwrap();
  assert!(schemas.retire("beta").await.unwrap());

  assert_eq!(schemas.keys(Selector::Current).await.unwrap(), ["alpha"]);
  assert_eq!(schemas.keys(Selector::Ever).await.unwrap(), ["alpha", "beta"]);
  assert_eq!(schemas.keys(Selector::On(at(2021, 1, 1))).await.unwrap(), ["alpha", "beta"]);
  assert!(schemas.keys(Selector::On(at(2019, 1, 1))).await.unwrap().is_empty());
  assert!(schemas.has("beta", Selector::On(at(2021, 1, 1))).await.unwrap());
}

#[tokio::test]
async fn put_at_rejects_overlapping_history() {
  let s = store().await;
  let schemas = s.schemas();
  schemas.put_at("demographics", Schema::new("Demographics"), at(2021, 1, 1)).await.unwrap();

  let earlier = schemas.put_at("demographics", Schema::new("Old"), at(2020, 1, 1)).await.unwrap_err();
  assert!(is_chronology(&earlier));
  assert!(earlier.is_consistency());

  let same = schemas.put_at("demographics", Schema::new("Same"), at(2021, 1, 1)).await.unwrap_err();
  assert!(is_chronology(&same));

  // The failed writes left the history untouched.
  let history = schemas.lifecycles("demographics").await.unwrap();
  assert_eq!(history.len(), 1);
  assert!(history[0].is_active());
}

#[tokio::test]
async fn put_at_after_retirement_must_not_precede_it() {
  let s = store().await;
  let schemas = s.schemas();
  schemas.put_at("demographics", Schema::new("Demographics"), at(2020, 1, 1)).await.unwrap();
  schemas.put_at("demographics", Schema::new("Demographics v2"), at(2020, 6, 1)).await.unwrap();
  assert_eq!(schemas.purge("demographics", Selector::Current).await.unwrap(), 1);

  // The remaining row was retired on 2020-06-01.
  let err = schemas.put_at("demographics", Schema::new("Back"), at(2020, 3, 1)).await.unwrap_err();
  assert!(is_chronology(&err));
  schemas.put_at("demographics", Schema::new("Back"), at(2020, 6, 1)).await.unwrap();
}

#[tokio::test]
async fn purge_reports_deleted_rows() {
  let s = store().await;
  let schemas = s.schemas();
  for (i, year) in [2019, 2020, 2021].into_iter().enumerate() {
    schemas.put_at("demographics", Schema::new(format!("v{i}")), at(year, 1, 1)).await.unwrap();
  }

  assert_eq!(schemas.purge("demographics", Selector::On(at(2020, 6, 1))).await.unwrap(), 1);
  assert_eq!(schemas.purge("demographics", Selector::Ever).await.unwrap(), 2);
  assert!(schemas.lifecycles("demographics").await.unwrap().is_empty());
  assert_eq!(schemas.purge("demographics", Selector::Ever).await.unwrap(), 0);
}

#[tokio::test]
async fn amend_overwrites_active_version_in_place() {
  let s = store().await;
  let schemas = s.schemas();
  let put = schemas.put_at("demographics", Schema::new("Demographics"), at(2020, 1, 1)).await.unwrap();

  let amended = schemas
    .amend("demographics", Schema::new("Demographics").published(day(2020, 2, 1)))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(amended.id, put.id);
  assert_eq!(amended.create_date, put.create_date);
  assert!(amended.modify_date > put.modify_date);
  assert!(amended.item.is_published());
  assert_eq!(schemas.lifecycles("demographics").await.unwrap().len(), 1);

  assert!(schemas.retire("demographics").await.unwrap());
  assert!(schemas.amend("demographics", Schema::new("Gone")).await.unwrap().is_none());
}

#[tokio::test]
async fn entity_requires_existing_schema() {
  let s = store().await;
  let err = s.entities().put("subject-1", Entity::new(999)).await.unwrap_err();
  assert!(err.is_consistency());
}

// ─── Attributes ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn attributes_are_scoped_to_their_schema_lineage() {
  let s = store().await;
  let a = s.schemas().put("a", Schema::new("A")).await.unwrap();
  let b = s.schemas().put("b", Schema::new("B")).await.unwrap();

  s.attributes("a").put("age", Attribute::new(a.id, "Age", AttributeType::Integer, 0)).await.unwrap();
  assert_eq!(s.attributes("a").keys(Selector::Current).await.unwrap(), ["age"]);
  assert!(s.attributes("b").keys(Selector::Current).await.unwrap().is_empty());

  // Same name under another lineage is an independent lineage.
  s.attributes("b").put("age", Attribute::new(b.id, "Age", AttributeType::Integer, 0)).await.unwrap();
  assert_eq!(s.attributes("a").lifecycles("age").await.unwrap().len(), 1);

  // Writing a row of lineage `b` through the manager of `a` is refused.
  let err = s
    .attributes("a")
    .put("weight", Attribute::new(b.id, "Weight", AttributeType::Decimal, 1))
    .await
    .unwrap_err();
  assert!(err.is_consistency());
  assert!(!s.attributes("b").has("weight", Selector::Ever).await.unwrap());
}

#[tokio::test]
async fn attribute_choices_round_trip_in_order() {
  let s = store().await;
  let schema = s.schemas().put("survey", Schema::new("Survey")).await.unwrap();
  let mut smoker = Attribute::new(schema.id, "Smoker", AttributeType::Boolean, 0);
  smoker.choices = vec![Choice::new("no", "0", 2), Choice::new("yes", "1", 1)];

  let put = s.attributes("survey").put("smoker", smoker).await.unwrap();
  let names: Vec<_> = put.item.choices.iter().map(|c| c.name.as_str()).collect();
  assert_eq!(names, ["yes", "no"]);
}

#[tokio::test]
async fn object_attribute_needs_object_schema() {
  let s = store().await;
  let schema = s.schemas().put("visit", Schema::new("Visit")).await.unwrap();
  let mut address = Attribute::new(schema.id, "Address", AttributeType::Object, 0);
  address.object_schema_id = None;

  let err = s.attributes("visit").put("address", address).await.unwrap_err();
  assert!(matches!(err, Error::Core(eav_core::Error::MissingObjectSchema { .. })));
}

#[tokio::test]
async fn purging_an_attribute_deletes_its_choices() {
  let s = store().await;
  let schema = s.schemas().put("survey", Schema::new("Survey")).await.unwrap();
  let mut smoker = Attribute::new(schema.id, "Smoker", AttributeType::Boolean, 0);
  smoker.choices = vec![Choice::new("yes", "1", 0), Choice::new("no", "0", 1)];
  s.attributes("survey").put("smoker", smoker).await.unwrap();

  assert_eq!(s.attributes("survey").purge("smoker", Selector::Ever).await.unwrap(), 1);
  let choices: i64 = s
    .conn()
    .call(|conn| Ok(conn.query_row("SELECT count(*) FROM choice", [], |row| row.get(0))?))
    .await
    .unwrap();
  assert_eq!(choices, 0);
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A published schema with one integer attribute `age` and one entity.
async fn with_age() -> (SqliteStore, Versioned<Attribute>, Versioned<Entity>) {
  let s = store().await;
  let schema = s
    .schemas()
    .put_at("demographics", Schema::new("Demographics").published(day(2020, 1, 1)), at(2020, 1, 1))
    .await
    .unwrap();
  let age = s
    .attributes("demographics")
    .put_at("age", Attribute::new(schema.id, "Age", AttributeType::Integer, 0), at(2020, 1, 1))
    .await
    .unwrap();
  let entity = s.entities().put_at("subject-1", Entity::new(schema.id), at(2020, 2, 1)).await.unwrap();
  (s, age, entity)
}

#[tokio::test]
async fn value_round_trips_through_its_shard() {
  let (s, age, entity) = with_age().await;
  let values = s.values(entity.id);

  let put = values
    .put_at("age", Value::new(entity.id, age.id, ValuePayload::Integer(34)), at(2020, 2, 1))
    .await
    .unwrap();
  assert_eq!(put.item.payload, ValuePayload::Integer(34));

  let fetched = values.get("age", None).await.unwrap().unwrap();
  assert_eq!(fetched, put);
  assert!(s.values(entity.id + 1).get("age", None).await.unwrap().is_none());
}

#[tokio::test]
async fn value_requires_attribute_active_at_creation() {
  let (s, age, entity) = with_age().await;
  let err = s
    .values(entity.id)
    .put_at("age", Value::new(entity.id, age.id, ValuePayload::Integer(34)), at(2019, 6, 1))
    .await
    .unwrap_err();
  assert!(err.is_consistency());
  assert!(!s.values(entity.id).has("age", Selector::Ever).await.unwrap());
}

#[tokio::test]
async fn value_payload_must_match_attribute_type() {
  let (s, age, entity) = with_age().await;
  let err = s
    .values(entity.id)
    .put("age", Value::new(entity.id, age.id, ValuePayload::String("34".into())))
    .await
    .unwrap_err();
  assert!(err.is_consistency());
}

#[tokio::test]
async fn single_valued_attribute_holds_one_active_value() {
  let (s, age, entity) = with_age().await;
  let values = s.values(entity.id);
  values.put("age", Value::new(entity.id, age.id, ValuePayload::Integer(34))).await.unwrap();

  let err = values
    .put("age-again", Value::new(entity.id, age.id, ValuePayload::Integer(35)))
    .await
    .unwrap_err();
  assert!(err.is_consistency());
  assert!(!values.has("age-again", Selector::Ever).await.unwrap());

  // A new version under the same key replaces the old one.
  values.put("age", Value::new(entity.id, age.id, ValuePayload::Integer(35))).await.unwrap();
  assert!(values.retire("age").await.unwrap());
  values.put("age-again", Value::new(entity.id, age.id, ValuePayload::Integer(36))).await.unwrap();

  let rows = s.fetch(&s.query_by_name("demographics").await.unwrap()).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].get("age"), Some(&json!(36)));
}

#[tokio::test]
async fn value_amend_keeps_its_type() {
  let (s, age, entity) = with_age().await;
  let values = s.values(entity.id);
  values.put("age", Value::new(entity.id, age.id, ValuePayload::Integer(34))).await.unwrap();

  let amended = values
    .amend("age", Value::new(entity.id, age.id, ValuePayload::Integer(35)))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(amended.item.payload, ValuePayload::Integer(35));

  let err = values
    .amend("age", Value::new(entity.id, age.id, ValuePayload::Text("35".into())))
    .await
    .unwrap_err();
  assert!(err.is_consistency());
}

#[tokio::test]
async fn value_choice_is_resolved_by_name() {
  let s = store().await;
  let schema = s.schemas().put("survey", Schema::new("Survey")).await.unwrap();
  let mut smoker = Attribute::new(schema.id, "Smoker", AttributeType::Boolean, 0);
  smoker.choices = vec![Choice::new("yes", "1", 0), Choice::new("no", "0", 1)];
  let smoker = s.attributes("survey").put("smoker", smoker).await.unwrap();
  let entity = s.entities().put("subject-1", Entity::new(schema.id)).await.unwrap();
  let values = s.values(entity.id);

  let put = values
    .put(
      "smoker",
      Value::new(entity.id, smoker.id, ValuePayload::Boolean(true)).from_choice("yes"),
    )
    .await
    .unwrap();
  assert_eq!(put.item.choice.as_deref(), Some("yes"));

  let err = values
    .put(
      "smoker",
      Value::new(entity.id, smoker.id, ValuePayload::Boolean(true)).from_choice("maybe"),
    )
    .await
    .unwrap_err();
  assert!(err.is_consistency());
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn children_follow_object_attributes() {
  let s = store().await;
  let visit = s.schemas().put_at("visit", Schema::new("Visit"), at(2020, 1, 1)).await.unwrap();
  let address = s.schemas().put_at("address", Schema::new("Address"), at(2020, 1, 1)).await.unwrap();
  s.attributes("visit")
    .put_at("home", Attribute::object(visit.id, "Home", address.id, 1), at(2021, 1, 1))
    .await
    .unwrap();
  s.attributes("visit")
    .put_at("work", Attribute::object(visit.id, "Work", address.id, 2), at(2021, 1, 1))
    .await
    .unwrap();

  let children = s.children("visit", None).await.unwrap();
  assert_eq!(children.len(), 1);
  assert_eq!(children[0].id, address.id);
  assert_eq!(s.children_names("visit", None).await.unwrap(), ["address"]);

  assert!(s.children("visit", Some(at(2020, 6, 1))).await.unwrap().is_empty());
  assert!(s.children("address", None).await.unwrap().is_empty());
  assert!(s.children("unknown", None).await.unwrap().is_empty());
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Two published versions of `demographics`, each with its own `age`
/// attribute version and one entity.
async fn demographics() -> (SqliteStore, [Versioned<Attribute>; 2], [Versioned<Entity>; 2]) {
  let s = store().await;
  let schemas = s.schemas();
  let attributes = s.attributes("demographics");

  let s1 = schemas
    .put_at("demographics", Schema::new("Demographics").published(day(2020, 1, 1)), at(2020, 1, 1))
    .await
    .unwrap();
  let a1 = attributes
    .put_at("age", Attribute::new(s1.id, "Age", AttributeType::Integer, 0), at(2020, 1, 1))
    .await
    .unwrap();
  let e1 = s.entities().put_at("subject-1", Entity::new(s1.id), at(2020, 2, 1)).await.unwrap();
  s.values(e1.id)
    .put_at("age", Value::new(e1.id, a1.id, ValuePayload::Integer(34)), at(2020, 2, 1))
    .await
    .unwrap();

  let s2 = schemas
    .put_at("demographics", Schema::new("Demographics").published(day(2021, 6, 1)), at(2021, 6, 1))
    .await
    .unwrap();
  let a2 = attributes
    .put_at("age", Attribute::new(s2.id, "Age in years", AttributeType::Integer, 0), at(2021, 6, 1))
    .await
    .unwrap();
  let e2 = s.entities().put_at("subject-2", Entity::new(s2.id), at(2021, 7, 1)).await.unwrap();
  s.values(e2.id)
    .put_at("age", Value::new(e2.id, a2.id, ValuePayload::Integer(41)), at(2021, 7, 1))
    .await
    .unwrap();

  (s, [a1, a2], [e1, e2])
}

#[tokio::test]
async fn name_strategy_pools_attribute_versions() {
  let (s, _, [e1, e2]) = demographics().await;
  let query = s.query_by_name("demographics").await.unwrap();
  assert_eq!(query.columns(), ["entity_id", "age"]);

  let rows = s.fetch(&query).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].entity_id(), Some(e1.id));
  assert_eq!(rows[0].get("age"), Some(&json!(34)));
  assert_eq!(rows[1].entity_id(), Some(e2.id));
  assert_eq!(rows[1].get("age"), Some(&json!(41)));
}

#[tokio::test]
async fn id_strategy_splits_attribute_versions() {
  let (s, [a1, a2], _) = demographics().await;
  let query = s.query_by_id("demographics").await.unwrap();
  let first = format!("age_{}", a1.id);
  let second = format!("age_{}", a2.id);
  assert_eq!(query.columns(), ["entity_id", first.as_str(), second.as_str()]);

  let rows = s.fetch(&query).await.unwrap();
  assert_eq!(rows[0].get(&first), Some(&json!(34)));
  assert_eq!(rows[0].get(&second), Some(&json!(null)));
  assert_eq!(rows[1].get(&first), Some(&json!(null)));
  assert_eq!(rows[1].get(&second), Some(&json!(41)));
}

#[tokio::test]
async fn checksum_strategy_splits_changed_shapes() {
  let (s, [a1, a2], _) = demographics().await;
  let (plan, query) = s.plan_and_query("demographics", SplitStrategy::Checksum).await.unwrap();
  assert_eq!(plan.len(), 2);
  assert_eq!(query.columns()[1], format!("age_{}", a1.checksum()));
  assert_eq!(query.columns()[2], format!("age_{}", a2.checksum()));
}

#[tokio::test]
async fn collection_values_aggregate_into_one_row() {
  let (s, _, [e1, _]) = demographics().await;
  let schema = s.schemas().get("demographics", None).await.unwrap().unwrap();
  let tags = s
    .attributes("demographics")
    .put_at(
      "tags",
      Attribute::new(schema.id, "Tags", AttributeType::String, 1).collection(),
      at(2021, 6, 1),
    )
    .await
    .unwrap();

  let values = s.values(e1.id);
  for (key, tag) in [("tags-1", "red"), ("tags-2", "blue")] {
    values
      .put_at(key, Value::new(e1.id, tags.id, ValuePayload::String(tag.into())), at(2021, 8, 1))
      .await
      .unwrap();
  }

  let query = s.query_by_name("demographics").await.unwrap();
  assert_eq!(query.columns(), ["entity_id", "age", "tags"]);
  let rows = s.fetch(&query).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].get("tags"), Some(&json!("red,blue")));
  assert_eq!(rows[1].get("tags"), Some(&json!(null)));
}

#[tokio::test]
async fn retired_values_and_entities_are_not_materialised() {
  let (s, _, [e1, _]) = demographics().await;
  assert!(s.values(e1.id).retire("age").await.unwrap());

  let query = s.query_by_name("demographics").await.unwrap();
  let rows = s.fetch(&query).await.unwrap();
  assert_eq!(rows[0].get("age"), Some(&json!(null)));

  assert!(s.entities().retire("subject-1").await.unwrap());
  let rows = s.fetch(&query).await.unwrap();
  assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn values_follow_a_new_entity_version() {
  let (s, _, [e1, e2]) = demographics().await;
  let completed = Entity { state: EntityState::Completed, ..Entity::new(e1.item.schema_id) };
  let next = s.entities().put("subject-1", completed).await.unwrap();
  assert_ne!(next.id, e1.id);

  let age = s.values(next.id).get("age", None).await.unwrap().unwrap();
  assert_eq!(age.item.entity_id, next.id);
  assert_eq!(age.item.payload, ValuePayload::Integer(34));
  assert!(s.values(e1.id).get("age", None).await.unwrap().is_none());
  assert!(s.values(e1.id).get("age", Some(at(2020, 6, 1))).await.unwrap().is_some());

  let rows = s.fetch(&s.query_by_name("demographics").await.unwrap()).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].entity_id(), Some(e2.id));
  assert_eq!(rows[1].entity_id(), Some(next.id));
  assert_eq!(rows[1].get("age"), Some(&json!(34)));
}

#[tokio::test]
async fn filters_and_paging_refine_rows() {
  let (s, _, [_, e2]) = demographics().await;
  let query = s.query_by_name("demographics").await.unwrap();

  let older = query.clone().filter(Filter::Gt("age".into(), 35_i64.into())).unwrap();
  let rows = s.fetch(&older).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].entity_id(), Some(e2.id));

  let page = query.clone().offset(1);
  let rows = s.fetch(&page).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].entity_id(), Some(e2.id));

  assert_eq!(s.fetch(&query.clone().limit(1)).await.unwrap().len(), 1);
  assert!(query.filter(Filter::IsNull("weight".into())).is_err());
}

#[tokio::test]
async fn embedded_schema_columns_are_prefixed() {
  let s = store().await;
  let published = day(2020, 1, 1);
  let address = s
    .schemas()
    .put_at("address", Schema::new("Address").published(published), at(2020, 1, 1))
    .await
    .unwrap();
  let city = s
    .attributes("address")
    .put_at("city", Attribute::new(address.id, "City", AttributeType::String, 0), at(2020, 1, 1))
    .await
    .unwrap();
  let visit = s
    .schemas()
    .put_at("visit", Schema::new("Visit").published(published), at(2020, 1, 1))
    .await
    .unwrap();
  s.attributes("visit")
    .put_at("home", Attribute::object(visit.id, "Home", address.id, 0), at(2020, 1, 1))
    .await
    .unwrap();

  let entity = s.entities().put_at("visit-1", Entity::new(visit.id), at(2020, 3, 1)).await.unwrap();
  s.values(entity.id)
    .put_at("home_city", Value::new(entity.id, city.id, ValuePayload::String("Oslo".into())), at(2020, 3, 1))
    .await
    .unwrap();

  let query = s.query_by_name("visit").await.unwrap();
  assert_eq!(query.columns(), ["entity_id", "home_city"]);
  let rows = s.fetch(&query).await.unwrap();
  assert_eq!(rows[0].get("home_city"), Some(&json!("Oslo")));
}

#[tokio::test]
async fn unpublished_schemas_plan_no_columns() {
  let s = store().await;
  let draft = s.schemas().put("draft", Schema::new("Draft")).await.unwrap();
  s.attributes("draft").put("note", Attribute::new(draft.id, "Note", AttributeType::Text, 0)).await.unwrap();
  s.entities().put("draft-1", Entity::new(draft.id)).await.unwrap();

  let query = s.query_by_name("draft").await.unwrap();
  assert_eq!(query.columns(), ["entity_id"]);
  assert!(s.fetch(&query).await.unwrap().is_empty());
}

#[tokio::test]
async fn queries_for_other_backends_are_refused() {
  let s = store().await;
  let query = eav_sql::materialize(&eav_sql::Dialect::postgres(), "x", &Default::default());
  assert!(matches!(s.fetch(&query).await, Err(Error::DialectMismatch(_))));
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_across_connections_serialize() {
  let path = std::env::temp_dir().join(format!("eavstore-concurrent-{}.db", std::process::id()));
  let sidecars = ["", "-wal", "-shm"].map(|suffix| format!("{}{suffix}", path.display()));
  for file in &sidecars {
    std::fs::remove_file(file).ok();
  }

  let config = StoreConfig { path: path.clone(), busy_timeout_ms: Some(5_000) };
  let first = SqliteStore::from_config(&config).await.unwrap();
  let second = SqliteStore::from_config(&config).await.unwrap();

  let mut puts = tokio::task::JoinSet::new();
  for i in 0..8 {
    let schemas = if i % 2 == 0 { first.schemas() } else { second.schemas() };
    puts.spawn(async move { schemas.put("demographics", Schema::new(format!("v{i}"))).await });
  }
  let mut outcomes = Vec::new();
  while let Some(put) = puts.join_next().await {
    outcomes.push(put.unwrap());
  }
  let history = first.schemas().lifecycles("demographics").await;

  drop((first, second));
  for file in &sidecars {
    std::fs::remove_file(file).ok();
  }

  for outcome in outcomes {
    outcome.unwrap();
  }
  let history = history.unwrap();
  assert_eq!(history.len(), 8);
  assert!(is_well_ordered(&history));
  assert_eq!(history.iter().filter(|l| l.is_active()).count(), 1);
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn store_opens_from_config() {
  let config = StoreConfig { busy_timeout_ms: Some(100), ..StoreConfig::in_memory() };
  let s = SqliteStore::from_config(&config).await.unwrap();
  s.schemas().put("demographics", Schema::new("Demographics")).await.unwrap();
  assert_eq!(s.schemas().keys(Selector::Current).await.unwrap(), ["demographics"]);
}
