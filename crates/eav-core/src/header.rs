//! Header planning: flattening a schema lineage into ordered columns.
//!
//! A header plan maps each column key (the attribute's path through nested
//! object attributes, plus a strategy-specific suffix) to every attribute
//! version that feeds the column, oldest first. The split strategy decides
//! how aggressively versions of one attribute lineage are kept apart:
//!
//! - [`SplitStrategy::Id`]: one column per attribute row.
//! - [`SplitStrategy::Name`]: one column per attribute name.
//! - [`SplitStrategy::Checksum`]: one column per distinct attribute shape.

use std::{
  collections::{HashMap, HashSet},
  future::Future,
  pin::Pin,
  str::FromStr,
};

use chrono::{DateTime, NaiveDate, Utc};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  attribute::{Attribute, AttributeType},
  temporal::Versioned,
};

// ─── Strategy ────────────────────────────────────────────────────────────────

/// How attribute versions sharing a lineage are grouped into columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SplitStrategy {
  Id,
  Name,
  Checksum,
}

impl SplitStrategy {
  /// Parse a strategy name, reporting unknown names as a configuration
  /// error before any planning starts.
  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name).map_err(|_| Error::UnknownStrategy(name.to_owned()))
  }
}

// ─── Column keys ─────────────────────────────────────────────────────────────

/// Strategy-specific suffix of a column key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Split {
  Id(i64),
  Checksum(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
  /// Attribute names from the root schema down to the scalar attribute.
  pub path:  Vec<String>,
  pub split: Option<Split>,
}

impl ColumnKey {
  /// The output column name: every segment joined with `_`.
  ///
  /// Distinct paths can render alike (`["a", "b_c"]` and `["a_b", "c"]`);
  /// [`HeaderPlan::push`] refuses the second of such a pair.
  pub fn column_name(&self) -> String {
    let mut segments = self.path.clone();
    match &self.split {
      Some(Split::Id(id)) => segments.push(id.to_string()),
      Some(Split::Checksum(sum)) => segments.push(sum.clone()),
      None => {}
    }
    segments.join("_")
  }
}

// ─── Plan ────────────────────────────────────────────────────────────────────

/// One planned column and the attribute versions backing it.
#[derive(Debug, Clone)]
pub struct Column {
  pub key:        ColumnKey,
  /// Oldest first; never empty.
  pub attributes: Vec<Versioned<Attribute>>,
}

impl Column {
  pub fn name(&self) -> String { self.key.column_name() }

  /// True if any backing version is a collection.
  pub fn is_ever_collection(&self) -> bool {
    self.attributes.iter().any(|a| a.item.is_collection)
  }

  /// The declared type of the newest backing version.
  ///
  /// NAME and CHECKSUM plans may pool versions whose types differ; the
  /// newest declaration wins.
  pub fn value_type(&self) -> AttributeType {
    self
      .attributes
      .last()
      .map_or(AttributeType::Text, |a| a.item.value_type)
  }

  pub fn attribute_ids(&self) -> Vec<i64> {
    self.attributes.iter().map(|a| a.id).collect()
  }
}

/// An insertion-ordered mapping from [`ColumnKey`] to [`Column`].
#[derive(Debug, Clone, Default)]
pub struct HeaderPlan {
  columns: Vec<Column>,
  index:   HashMap<ColumnKey, usize>,
}

impl HeaderPlan {
  pub fn columns(&self) -> &[Column] { &self.columns }

  pub fn len(&self) -> usize { self.columns.len() }

  pub fn is_empty(&self) -> bool { self.columns.is_empty() }

  pub fn get(&self, key: &ColumnKey) -> Option<&Column> {
    self.index.get(key).map(|&i| &self.columns[i])
  }

  /// Output column names, in plan order.
  pub fn column_names(&self) -> Vec<String> {
    self.columns.iter().map(Column::name).collect()
  }

  /// Append `attribute` to the column at `key`, creating the column at the
  /// end of the plan if it is new. A version already in the column is not
  /// added twice. A new key whose name is already taken by another key is
  /// a [`Error::ColumnCollision`].
  pub fn push(&mut self, key: ColumnKey, attribute: Versioned<Attribute>) -> Result<()> {
    if let Some(&i) = self.index.get(&key) {
      let column = &mut self.columns[i];
      if column.attributes.iter().all(|a| a.id != attribute.id) {
        column.attributes.push(attribute);
      }
      return Ok(());
    }

    let name = key.column_name();
    if let Some(taken) = self.columns.iter().find(|c| c.name() == name) {
      return Err(Error::ColumnCollision {
        name,
        first: taken.key.path.clone(),
        second: key.path,
      });
    }
    self.index.insert(key.clone(), self.columns.len());
    self.columns.push(Column { key, attributes: vec![attribute] });
    Ok(())
  }

  /// Merge `other` into this plan, preserving `other`'s relative order.
  pub fn merge(&mut self, other: HeaderPlan) -> Result<()> {
    for column in other.columns {
      for attribute in column.attributes {
        self.push(column.key.clone(), attribute)?;
      }
    }
    Ok(())
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// An attribute version together with the schema-version facts the planner
/// orders by.
#[derive(Debug, Clone)]
pub struct LineageAttribute {
  pub attribute:          Versioned<Attribute>,
  pub publish_date:       NaiveDate,
  pub schema_create_date: DateTime<Utc>,
  /// Name of the embedded schema lineage, for `object` attributes.
  pub object_schema:      Option<String>,
}

/// Source of attribute versions for the planner.
pub trait AttributeCatalog: Send + Sync {
  type Error: std::error::Error + From<Error> + Send + Sync + 'static;

  /// Every attribute version ever belonging to a published version of the
  /// schema lineage `schema_name`, in any order. Unknown names yield an
  /// empty list.
  fn lineage_attributes<'a>(
    &'a self,
    schema_name: &'a str,
  ) -> impl Future<Output = Result<Vec<LineageAttribute>, Self::Error>> + Send + 'a;
}

/// Order attribute versions for planning: by the display order recorded on
/// the newest schema version of each attribute name, then by publish date
/// (oldest first). Remaining ties fall back to schema creation and row id.
pub fn order_lineage(mut rows: Vec<LineageAttribute>) -> Vec<LineageAttribute> {
  let recency = |row: &LineageAttribute| {
    (row.publish_date, row.schema_create_date, row.attribute.id)
  };

  let mut recent_order: HashMap<String, (i64, (NaiveDate, DateTime<Utc>, i64))> =
    HashMap::new();
  for row in &rows {
    let candidate = (row.attribute.item.order, recency(row));
    recent_order
      .entry(row.attribute.name.clone())
      .and_modify(|current| {
        if candidate.1 > current.1 {
          *current = candidate;
        }
      })
      .or_insert(candidate);
  }

  rows.sort_by_cached_key(|row| {
    let order = recent_order
      .get(&row.attribute.name)
      .map_or(row.attribute.item.order, |(order, _)| *order);
    (order, recency(row))
  });
  rows
}

// ─── Planner ─────────────────────────────────────────────────────────────────

/// Build the header plan of `schema_name` under `strategy`.
///
/// `prefix` is prepended to every column path. Object attributes are
/// expanded in place into the columns of their embedded schema.
pub async fn plan_header<C: AttributeCatalog>(
  catalog: &C,
  schema_name: &str,
  strategy: SplitStrategy,
  prefix: &[String],
) -> Result<HeaderPlan, C::Error> {
  let mut visiting = HashSet::new();
  let plan = plan_into(
    catalog,
    schema_name.to_owned(),
    strategy,
    prefix.to_vec(),
    &mut visiting,
  )
  .await?;
  tracing::debug!(
    schema = schema_name,
    %strategy,
    columns = plan.len(),
    "planned header"
  );
  Ok(plan)
}

type PlanFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HeaderPlan, E>> + Send + 'a>>;

fn plan_into<'a, C: AttributeCatalog>(
  catalog: &'a C,
  schema_name: String,
  strategy: SplitStrategy,
  path: Vec<String>,
  visiting: &'a mut HashSet<String>,
) -> PlanFuture<'a, C::Error> {
  Box::pin(async move {
    if !visiting.insert(schema_name.clone()) {
      return Err(Error::SchemaCycle(schema_name).into());
    }

    let rows = order_lineage(catalog.lineage_attributes(&schema_name).await?);
    let mut plan = HeaderPlan::default();

    for row in rows {
      let mut column_path = path.clone();
      column_path.push(row.attribute.name.clone());

      if row.attribute.item.value_type.is_object() {
        let Some(child) = row.object_schema else {
          return Err(
            Error::MissingObjectSchema {
              schema:    schema_name,
              attribute: row.attribute.name,
            }
            .into(),
          );
        };
        let sub_plan =
          plan_into(catalog, child, strategy, column_path, &mut *visiting).await?;
        plan.merge(sub_plan)?;
      } else {
        let split = match strategy {
          SplitStrategy::Id => Some(Split::Id(row.attribute.id)),
          SplitStrategy::Name => None,
          SplitStrategy::Checksum => Some(Split::Checksum(row.attribute.checksum())),
        };
        plan.push(ColumnKey { path: column_path, split }, row.attribute)?;
      }
    }

    visiting.remove(&schema_name);
    Ok(plan)
  })
}
