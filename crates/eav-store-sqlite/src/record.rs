//! Per-kind row mapping for the generic manager.
//!
//! A [`Record`] knows where rows of its kind live, how to read them, and
//! how to write a new version with the referential checks that kind needs.
//! Everything temporal (retiring, chronology, scoping) is handled once in
//! [`crate::manager`].

use eav_core::{
  attribute::{Attribute, AttributeType, Choice},
  entity::Entity,
  schema::Schema,
  temporal::{Lifespan, Versioned},
  value::Value,
};
use eav_sql::layout::{ATTRIBUTE_TABLE, ENTITY_TABLE, SCHEMA_TABLE, value_table};
use rusqlite::{Connection, OptionalExtension as _, params};
use strum::IntoEnumIterator as _;

use crate::{
  Error, Result,
  encode::{
    RawHeader, decode_date, decode_enum, decode_payload, encode_date, encode_dt, encode_payload,
  },
};

/// A stored row located by physical table and row id.
#[derive(Debug, Clone)]
pub struct Handle {
  pub table:    String,
  pub id:       i64,
  pub lifespan: Lifespan,
}

pub trait Record: Sized + Send + Sync + 'static {
  /// Kind name used in logs and error messages.
  const KIND: &'static str;
  /// Relation rows are read from; always aliased `r`.
  const SOURCE: &'static str;
  /// Expression over `r` naming the physical table of a row.
  const TABLE: &'static str;
  /// Select list over `r`, starting with the five header columns.
  const COLUMNS: &'static str;

  type Raw: Send + 'static;

  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self::Raw>;

  fn decode(raw: Self::Raw) -> Result<Versioned<Self>>;

  /// Insert a new active row named `name` created at `stamp`, returning
  /// its table and id.
  fn insert(conn: &Connection, name: &str, stamp: &str, item: &Self) -> Result<(String, i64)>;

  /// Overwrite the body of an existing row.
  fn update(conn: &Connection, handle: &Handle, item: &Self) -> Result<()>;

  /// Delete rows owned by `handle` before it is deleted itself.
  fn purge_owned(_conn: &Connection, _handle: &Handle) -> Result<()> { Ok(()) }

  /// Move the active rows owned by `retired` onto its successor `id`, as of
  /// `stamp`. Returns the number of rows carried.
  fn carry_forward(_conn: &Connection, _retired: &Handle, _id: i64, _stamp: &str) -> Result<usize> {
    Ok(0)
  }
}

fn exists(conn: &Connection, table: &str, id: i64) -> Result<bool> {
  let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)");
  Ok(conn.query_row(&sql, params![id], |row| row.get(0))?)
}

// ─── Schema ──────────────────────────────────────────────────────────────────

pub struct RawSchema {
  header:         RawHeader,
  title:          String,
  description:    Option<String>,
  state:          String,
  storage:        String,
  publish_date:   Option<String>,
  base_schema_id: Option<i64>,
  is_association: bool,
  is_inline:      bool,
}

impl Record for Schema {
  const KIND: &'static str = "schema";
  const SOURCE: &'static str = SCHEMA_TABLE;
  const TABLE: &'static str = "'schema'";
  const COLUMNS: &'static str = "r.id, r.name, r.create_date, r.modify_date, r.remove_date, \
     r.title, r.description, r.state, r.storage, r.publish_date, r.base_schema_id, \
     r.is_association, r.is_inline";

  type Raw = RawSchema;

  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSchema> {
    Ok(RawSchema {
      header:         RawHeader::read(row)?,
      title:          row.get(5)?,
      description:    row.get(6)?,
      state:          row.get(7)?,
      storage:        row.get(8)?,
      publish_date:   row.get(9)?,
      base_schema_id: row.get(10)?,
      is_association: row.get(11)?,
      is_inline:      row.get(12)?,
    })
  }

  fn decode(raw: RawSchema) -> Result<Versioned<Schema>> {
    let schema = Schema {
      title:          raw.title,
      description:    raw.description,
      state:          decode_enum("schema state", &raw.state)?,
      storage:        decode_enum("storage", &raw.storage)?,
      publish_date:   raw.publish_date.as_deref().map(decode_date).transpose()?,
      base_schema_id: raw.base_schema_id,
      is_association: raw.is_association,
      is_inline:      raw.is_inline,
    };
    raw.header.into_versioned(schema)
  }

  fn insert(conn: &Connection, name: &str, stamp: &str, item: &Schema) -> Result<(String, i64)> {
    check_base(conn, item)?;
    conn.execute(
      "INSERT INTO schema (name, title, description, state, storage, publish_date,
                           base_schema_id, is_association, is_inline, create_date, modify_date)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
      params![
        name,
        item.title,
        item.description,
        item.state.as_ref(),
        item.storage.as_ref(),
        item.publish_date.map(encode_date),
        item.base_schema_id,
        item.is_association,
        item.is_inline,
        stamp,
      ],
    )?;
    Ok((SCHEMA_TABLE.to_owned(), conn.last_insert_rowid()))
  }

  fn update(conn: &Connection, handle: &Handle, item: &Schema) -> Result<()> {
    check_base(conn, item)?;
    conn.execute(
      "UPDATE schema
          SET title = ?2, description = ?3, state = ?4, storage = ?5, publish_date = ?6,
              base_schema_id = ?7, is_association = ?8, is_inline = ?9
        WHERE id = ?1",
      params![
        handle.id,
        item.title,
        item.description,
        item.state.as_ref(),
        item.storage.as_ref(),
        item.publish_date.map(encode_date),
        item.base_schema_id,
        item.is_association,
        item.is_inline,
      ],
    )?;
    Ok(())
  }
}

fn check_base(conn: &Connection, item: &Schema) -> Result<()> {
  match item.base_schema_id {
    Some(id) if !exists(conn, SCHEMA_TABLE, id)? => {
      Err(Error::consistency(format!("base schema {id} does not exist")))
    }
    _ => Ok(()),
  }
}

// ─── Attribute ───────────────────────────────────────────────────────────────

pub struct RawAttribute {
  header:           RawHeader,
  schema_id:        i64,
  title:            String,
  description:      Option<String>,
  value_type:       String,
  object_schema_id: Option<i64>,
  is_collection:    bool,
  is_required:      bool,
  order:            i64,
  value_min:        Option<i64>,
  value_max:        Option<i64>,
  collection_min:   Option<i64>,
  collection_max:   Option<i64>,
  validator:        Option<String>,
  choices:          String,
}

impl Record for Attribute {
  const KIND: &'static str = "attribute";
  const SOURCE: &'static str = ATTRIBUTE_TABLE;
  const TABLE: &'static str = "'attribute'";
  const COLUMNS: &'static str = "r.id, r.name, r.create_date, r.modify_date, r.remove_date, \
     r.schema_id, r.title, r.description, r.type, r.object_schema_id, r.is_collection, \
     r.is_required, r.\"order\", r.value_min, r.value_max, r.collection_min, r.collection_max, \
     r.validator, \
     (SELECT json_group_array(json_object('name', c.name, 'title', c.title, \
                                          'value', c.value, 'order', c.\"order\")) \
        FROM choice AS c WHERE c.attribute_id = r.id)";

  type Raw = RawAttribute;

  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAttribute> {
    Ok(RawAttribute {
      header:           RawHeader::read(row)?,
      schema_id:        row.get(5)?,
      title:            row.get(6)?,
      description:      row.get(7)?,
      value_type:       row.get(8)?,
      object_schema_id: row.get(9)?,
      is_collection:    row.get(10)?,
      is_required:      row.get(11)?,
      order:            row.get(12)?,
      value_min:        row.get(13)?,
      value_max:        row.get(14)?,
      collection_min:   row.get(15)?,
      collection_max:   row.get(16)?,
      validator:        row.get(17)?,
      choices:          row.get(18)?,
    })
  }

  fn decode(raw: RawAttribute) -> Result<Versioned<Attribute>> {
    let mut choices: Vec<Choice> = serde_json::from_str(&raw.choices)?;
    choices.sort_by(|a, b| (a.order, &a.name).cmp(&(b.order, &b.name)));
    let attribute = Attribute {
      schema_id: raw.schema_id,
      title: raw.title,
      description: raw.description,
      value_type: decode_enum("attribute type", &raw.value_type)?,
      object_schema_id: raw.object_schema_id,
      is_collection: raw.is_collection,
      is_required: raw.is_required,
      order: raw.order,
      value_min: raw.value_min,
      value_max: raw.value_max,
      collection_min: raw.collection_min,
      collection_max: raw.collection_max,
      validator: raw.validator,
      choices,
    };
    raw.header.into_versioned(attribute)
  }

  fn insert(conn: &Connection, name: &str, stamp: &str, item: &Attribute) -> Result<(String, i64)> {
    check_attribute(conn, name, item)?;
    conn.execute(
      "INSERT INTO attribute (schema_id, name, title, description, type, object_schema_id,
                              is_collection, is_required, \"order\", value_min, value_max,
                              collection_min, collection_max, validator,
                              create_date, modify_date)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
      params![
        item.schema_id,
        name,
        item.title,
        item.description,
        item.value_type.as_ref(),
        item.object_schema_id,
        item.is_collection,
        item.is_required,
        item.order,
        item.value_min,
        item.value_max,
        item.collection_min,
        item.collection_max,
        item.validator,
        stamp,
      ],
    )?;
    let id = conn.last_insert_rowid();
    insert_choices(conn, id, &item.choices)?;
    Ok((ATTRIBUTE_TABLE.to_owned(), id))
  }

  fn update(conn: &Connection, handle: &Handle, item: &Attribute) -> Result<()> {
    let name: String =
      conn.query_row("SELECT name FROM attribute WHERE id = ?1", params![handle.id], |row| {
        row.get(0)
      })?;
    check_attribute(conn, &name, item)?;
    conn.execute(
      "UPDATE attribute
          SET schema_id = ?2, title = ?3, description = ?4, type = ?5, object_schema_id = ?6,
              is_collection = ?7, is_required = ?8, \"order\" = ?9, value_min = ?10,
              value_max = ?11, collection_min = ?12, collection_max = ?13, validator = ?14
        WHERE id = ?1",
      params![
        handle.id,
        item.schema_id,
        item.title,
        item.description,
        item.value_type.as_ref(),
        item.object_schema_id,
        item.is_collection,
        item.is_required,
        item.order,
        item.value_min,
        item.value_max,
        item.collection_min,
        item.collection_max,
        item.validator,
      ],
    )?;
    conn.execute("DELETE FROM choice WHERE attribute_id = ?1", params![handle.id])?;
    insert_choices(conn, handle.id, &item.choices)
  }

  fn purge_owned(conn: &Connection, handle: &Handle) -> Result<()> {
    conn.execute("DELETE FROM choice WHERE attribute_id = ?1", params![handle.id])?;
    Ok(())
  }
}

fn check_attribute(conn: &Connection, name: &str, item: &Attribute) -> Result<()> {
  let schema: Option<String> = conn
    .query_row("SELECT name FROM schema WHERE id = ?1", params![item.schema_id], |row| {
      row.get(0)
    })
    .optional()?;
  let Some(schema) = schema else {
    return Err(Error::consistency(format!("schema {} does not exist", item.schema_id)));
  };

  match (item.value_type, item.object_schema_id) {
    (AttributeType::Object, None) => {
      Err(eav_core::Error::MissingObjectSchema { schema, attribute: name.to_owned() }.into())
    }
    (AttributeType::Object, Some(id)) if !exists(conn, SCHEMA_TABLE, id)? => {
      Err(Error::consistency(format!("object schema {id} of {schema}.{name} does not exist")))
    }
    (AttributeType::Object, Some(_)) | (_, None) => Ok(()),
    (value_type, Some(_)) => Err(Error::consistency(format!(
      "{value_type} attribute {schema}.{name} cannot embed a schema"
    ))),
  }
}

fn insert_choices(conn: &Connection, attribute_id: i64, choices: &[Choice]) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO choice (attribute_id, name, title, value, \"order\") VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for choice in choices {
    stmt.execute(params![attribute_id, choice.name, choice.title, choice.value, choice.order])?;
  }
  Ok(())
}

// ─── Entity ──────────────────────────────────────────────────────────────────

pub struct RawEntity {
  header:       RawHeader,
  schema_id:    i64,
  state:        String,
  collect_date: Option<String>,
}

impl Record for Entity {
  const KIND: &'static str = "entity";
  const SOURCE: &'static str = ENTITY_TABLE;
  const TABLE: &'static str = "'entity'";
  const COLUMNS: &'static str = "r.id, r.name, r.create_date, r.modify_date, r.remove_date, \
     r.schema_id, r.state, r.collect_date";

  type Raw = RawEntity;

  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntity> {
    Ok(RawEntity {
      header:       RawHeader::read(row)?,
      schema_id:    row.get(5)?,
      state:        row.get(6)?,
      collect_date: row.get(7)?,
    })
  }

  fn decode(raw: RawEntity) -> Result<Versioned<Entity>> {
    let entity = Entity {
      schema_id:    raw.schema_id,
      state:        decode_enum("entity state", &raw.state)?,
      collect_date: raw.collect_date.as_deref().map(decode_date).transpose()?,
    };
    raw.header.into_versioned(entity)
  }

  fn insert(conn: &Connection, name: &str, stamp: &str, item: &Entity) -> Result<(String, i64)> {
    check_entity(conn, item)?;
    conn.execute(
      "INSERT INTO entity (schema_id, name, state, collect_date, create_date, modify_date)
       VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
      params![item.schema_id, name, item.state.as_ref(), item.collect_date.map(encode_date), stamp],
    )?;
    Ok((ENTITY_TABLE.to_owned(), conn.last_insert_rowid()))
  }

  fn update(conn: &Connection, handle: &Handle, item: &Entity) -> Result<()> {
    check_entity(conn, item)?;
    conn.execute(
      "UPDATE entity SET schema_id = ?2, state = ?3, collect_date = ?4 WHERE id = ?1",
      params![handle.id, item.schema_id, item.state.as_ref(), item.collect_date.map(encode_date)],
    )?;
    Ok(())
  }

  /// Active values of the retired version are retired with it and copied
  /// onto the successor, so the entity's current data follows its name.
  fn carry_forward(conn: &Connection, retired: &Handle, id: i64, stamp: &str) -> Result<usize> {
    let mut carried = 0;
    for value_type in AttributeType::iter() {
      let table = value_table(value_type);
      carried += conn.execute(
        &format!(
          "INSERT INTO {table} (entity_id, attribute_id, choice_id, name, value,
                                create_date, modify_date)
           SELECT ?1, attribute_id, choice_id, name, value,
                  max(create_date, ?3), max(create_date, ?3)
             FROM {table} WHERE entity_id = ?2 AND remove_date IS NULL"
        ),
        params![id, retired.id, stamp],
      )?;
      conn.execute(
        &format!(
          "UPDATE {table} SET remove_date = max(create_date, ?2)
            WHERE entity_id = ?1 AND remove_date IS NULL"
        ),
        params![retired.id, stamp],
      )?;
    }
    Ok(carried)
  }
}

fn check_entity(conn: &Connection, item: &Entity) -> Result<()> {
  if exists(conn, SCHEMA_TABLE, item.schema_id)? {
    Ok(())
  } else {
    Err(Error::consistency(format!("schema {} does not exist", item.schema_id)))
  }
}

// ─── Value ───────────────────────────────────────────────────────────────────

pub struct RawValue {
  header:       RawHeader,
  value_type:   String,
  entity_id:    i64,
  attribute_id: i64,
  choice:       Option<String>,
  value:        Option<String>,
}

impl Record for Value {
  const KIND: &'static str = "value";
  const SOURCE: &'static str = "value_all";
  const TABLE: &'static str = "r.storage_table";
  const COLUMNS: &'static str = "r.id, r.name, r.create_date, r.modify_date, r.remove_date, \
     r.type, r.entity_id, r.attribute_id, r.choice, r.value";

  type Raw = RawValue;

  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawValue> {
    Ok(RawValue {
      header:       RawHeader::read(row)?,
      value_type:   row.get(5)?,
      entity_id:    row.get(6)?,
      attribute_id: row.get(7)?,
      choice:       row.get(8)?,
      value:        row.get(9)?,
    })
  }

  fn decode(raw: RawValue) -> Result<Versioned<Value>> {
    let value_type: AttributeType = decode_enum("attribute type", &raw.value_type)?;
    let text = raw.value.unwrap_or_default();
    let value = Value {
      entity_id:    raw.entity_id,
      attribute_id: raw.attribute_id,
      choice:       raw.choice,
      payload:      decode_payload(value_type, &text)?,
    };
    raw.header.into_versioned(value)
  }

  fn insert(conn: &Connection, name: &str, stamp: &str, item: &Value) -> Result<(String, i64)> {
    let choice_id = check_value(conn, name, item, stamp)?;
    let table = value_table(item.payload.value_type());
    conn.execute(
      &format!(
        "INSERT INTO {table} (entity_id, attribute_id, choice_id, name, value,
                              create_date, modify_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"
      ),
      params![
        item.entity_id,
        item.attribute_id,
        choice_id,
        name,
        encode_payload(&item.payload),
        stamp,
      ],
    )?;
    Ok((table.to_owned(), conn.last_insert_rowid()))
  }

  fn update(conn: &Connection, handle: &Handle, item: &Value) -> Result<()> {
    let table = value_table(item.payload.value_type());
    if table != handle.table {
      return Err(Error::consistency(format!(
        "value {} in {} cannot be amended to a {} payload",
        handle.id,
        handle.table,
        item.payload.value_type()
      )));
    }
    let name: String = conn.query_row(
      &format!("SELECT name FROM {table} WHERE id = ?1"),
      params![handle.id],
      |row| row.get(0),
    )?;
    let stamp = encode_dt(handle.lifespan.create_date);
    let choice_id = check_value(conn, &name, item, &stamp)?;
    conn.execute(
      &format!(
        "UPDATE {table} SET entity_id = ?2, attribute_id = ?3, choice_id = ?4, value = ?5
          WHERE id = ?1"
      ),
      params![
        handle.id,
        item.entity_id,
        item.attribute_id,
        choice_id,
        encode_payload(&item.payload),
      ],
    )?;
    Ok(())
  }
}

/// Check a value named `name` against its entity, attribute and choice as
/// of `stamp`, returning the id of the referenced choice.
///
/// A non-collection attribute holds at most one active value per entity.
fn check_value(conn: &Connection, name: &str, item: &Value, stamp: &str) -> Result<Option<i64>> {
  if !exists(conn, ENTITY_TABLE, item.entity_id)? {
    return Err(Error::consistency(format!("entity {} does not exist", item.entity_id)));
  }

  let attribute: Option<(String, bool, bool)> = conn
    .query_row(
      "SELECT type, create_date <= ?2 AND (remove_date IS NULL OR remove_date > ?2), is_collection
         FROM attribute WHERE id = ?1",
      params![item.attribute_id, stamp],
      |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()?;
  let Some((value_type, active, is_collection)) = attribute else {
    return Err(Error::consistency(format!("attribute {} does not exist", item.attribute_id)));
  };
  if !active {
    return Err(Error::consistency(format!(
      "attribute {} is not active at {stamp}",
      item.attribute_id
    )));
  }
  let value_type: AttributeType = decode_enum("attribute type", &value_type)?;
  if value_type != item.payload.value_type() {
    return Err(Error::consistency(format!(
      "attribute {} holds {value_type} values, not {}",
      item.attribute_id,
      item.payload.value_type()
    )));
  }

  if !is_collection {
    let taken: Option<String> = conn
      .query_row(
        "SELECT name FROM value_all
          WHERE entity_id = ?1 AND attribute_id = ?2 AND remove_date IS NULL AND name <> ?3
          LIMIT 1",
        params![item.entity_id, item.attribute_id, name],
        |row| row.get(0),
      )
      .optional()?;
    if let Some(taken) = taken {
      return Err(Error::consistency(format!(
        "entity {} already holds {taken:?} for single-valued attribute {}",
        item.entity_id, item.attribute_id
      )));
    }
  }

  let Some(choice) = &item.choice else { return Ok(None) };
  let choice_id: Option<i64> = conn
    .query_row(
      "SELECT id FROM choice WHERE attribute_id = ?1 AND name = ?2",
      params![item.attribute_id, choice],
      |row| row.get(0),
    )
    .optional()?;
  match choice_id {
    Some(id) => Ok(Some(id)),
    None => Err(Error::consistency(format!(
      "attribute {} has no choice {choice:?}",
      item.attribute_id
    ))),
  }
}
