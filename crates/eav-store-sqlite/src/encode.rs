//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with microsecond precision,
//! which sort lexically in time order. Dates are `YYYY-MM-DD`. Enumerations
//! are stored by their kebab/lowercase text forms.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound as _, Utc};
use eav_core::{
  attribute::AttributeType,
  temporal::{Lifespan, Versioned},
  value::ValuePayload,
};
use rusqlite::types::Value as SqlValue;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Drop precision the store cannot represent.
pub fn truncate_dt(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| eav_core::Error::UnknownVariant { kind, value: s.to_owned() }.into())
}

// ─── Value payloads ──────────────────────────────────────────────────────────

/// The SQL value written to the `value` column of the payload's shard.
pub fn encode_payload(payload: &ValuePayload) -> SqlValue {
  match payload {
    ValuePayload::Boolean(b) => SqlValue::Integer(i64::from(*b)),
    ValuePayload::Decimal(d) => SqlValue::Text(d.to_string()),
    ValuePayload::Integer(i) | ValuePayload::Object(i) => SqlValue::Integer(*i),
    ValuePayload::Date(d) => SqlValue::Text(encode_date(*d)),
    ValuePayload::Datetime(dt) => SqlValue::Text(encode_dt(truncate_dt(*dt))),
    ValuePayload::String(s) | ValuePayload::Text(s) => SqlValue::Text(s.clone()),
  }
}

/// Rebuild a payload from its shard's type and the text form of `value`.
pub fn decode_payload(value_type: AttributeType, text: &str) -> Result<ValuePayload> {
  let malformed = || Error::MalformedValue { value_type, value: text.to_owned() };
  Ok(match value_type {
    AttributeType::Boolean => match text {
      "0" => ValuePayload::Boolean(false),
      "1" => ValuePayload::Boolean(true),
      _ => return Err(malformed()),
    },
    AttributeType::Decimal => ValuePayload::Decimal(BigDecimal::from_str(text)?),
    AttributeType::Integer => ValuePayload::Integer(text.parse().map_err(|_| malformed())?),
    AttributeType::Object => ValuePayload::Object(text.parse().map_err(|_| malformed())?),
    AttributeType::Date => ValuePayload::Date(decode_date(text)?),
    AttributeType::Datetime => ValuePayload::Datetime(decode_dt(text)?),
    AttributeType::String => ValuePayload::String(text.to_owned()),
    AttributeType::Text => ValuePayload::Text(text.to_owned()),
  })
}

// ─── Row headers ─────────────────────────────────────────────────────────────

/// The bookkeeping columns every temporal table shares, as read from the
/// first five columns of a row.
#[derive(Debug)]
pub struct RawHeader {
  pub id:          i64,
  pub name:        String,
  pub create_date: String,
  pub modify_date: String,
  pub remove_date: Option<String>,
}

impl RawHeader {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      name:        row.get(1)?,
      create_date: row.get(2)?,
      modify_date: row.get(3)?,
      remove_date: row.get(4)?,
    })
  }

  pub fn into_versioned<T>(self, item: T) -> Result<Versioned<T>> {
    Ok(Versioned {
      id: self.id,
      name: self.name,
      create_date: decode_dt(&self.create_date)?,
      modify_date: decode_dt(&self.modify_date)?,
      remove_date: decode_opt_dt(self.remove_date.as_deref())?,
      item,
    })
  }
}

pub fn decode_lifespan(create_date: &str, remove_date: Option<&str>) -> Result<Lifespan> {
  Ok(Lifespan {
    create_date: decode_dt(create_date)?,
    remove_date: decode_opt_dt(remove_date)?,
  })
}
