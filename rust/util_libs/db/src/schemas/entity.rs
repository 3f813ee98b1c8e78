use bson::{Bson, DateTime, Document};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use super::metadata::{Metadata, CREATED_AT_FIELD, METADATA_FIELDS, UPDATED_AT_FIELD};
use crate::error::{DbError, DbResult};
use crate::query::ID_FIELD;
use crate::store::IndexSpec;

/// Trait for defining indices for a collection.
///
/// Implementors list the indices their collection needs beyond the tenant
/// index every repository applies.
pub trait IntoIndexes {
    fn into_indices(self) -> Vec<IndexSpec>
    where
        Self: Sized,
    {
        vec![]
    }
}

/// A domain type stored in its own collection.
///
/// The associated constants drive the converter: `DATE_FIELDS` are normalised
/// to dates and `FIELD_ALIASES` renames legacy field names before the document
/// is deserialized.
pub trait Entity:
    Serialize + DeserializeOwned + Clone + Debug + Default + Send + Sync + Unpin + IntoIndexes + 'static
{
    const COLLECTION: &'static str;
    const DATE_FIELDS: &'static [&'static str] = &[];
    const FIELD_ALIASES: &'static [(&'static str, &'static str)] = &[];

    /// Tenant owning this entity. Empty when not yet assigned.
    fn company_id(&self) -> &str;
}

/// Legacy names for the lifecycle timestamps, accepted by every converter.
const LIFECYCLE_ALIASES: [(&str, &str); 2] = [
    ("CreationDate", CREATED_AT_FIELD),
    ("LastUpdate", UPDATED_AT_FIELD),
];

/// An entity together with its store identity and lifecycle metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<E> {
    pub id: String,
    pub meta: Metadata,
    pub data: E,
}

impl<E: Entity> Record<E> {
    /// Converts a raw stored document into a typed record: legacy aliases are
    /// renamed, date-like fields normalised, metadata split off and absent
    /// domain fields defaulted.
    pub fn from_document(mut document: Document) -> DbResult<Self> {
        let id = match document.remove(ID_FIELD) {
            Some(Bson::String(id)) => id,
            Some(Bson::ObjectId(oid)) => oid.to_hex(),
            other => {
                return Err(DbError::conversion(
                    E::COLLECTION,
                    format!("document has no usable _id: {:?}", other),
                ))
            }
        };

        canonicalize::<E>(&mut document);
        let meta = Metadata::take_from(&mut document);
        let data = bson::from_document::<E>(document)
            .map_err(|e| DbError::conversion(E::COLLECTION, format!("{} (id {})", e, id)))?;
        Ok(Self { id, meta, data })
    }

    /// Full stored representation, including `_id` and metadata.
    pub fn to_document(&self) -> DbResult<Document> {
        let mut document = entity_document(&self.data)?;
        self.meta.write_into(&mut document);
        document.insert(ID_FIELD, self.id.clone());
        Ok(document)
    }
}

/// Renames legacy field names and normalises date-like fields in place.
fn canonicalize<E: Entity>(document: &mut Document) {
    for (legacy, canonical) in LIFECYCLE_ALIASES.iter().chain(E::FIELD_ALIASES) {
        if let Some(value) = document.remove(*legacy) {
            if !document.contains_key(*canonical) {
                document.insert(*canonical, value);
            }
        }
    }

    for field in METADATA_FIELDS.iter().chain(E::DATE_FIELDS) {
        if let Some(value) = document.remove(*field) {
            document.insert(*field, normalize_date(value));
        }
    }
}

/// Reads an entity from an external row (an import, a request body). Legacy
/// names and date encodings are accepted as for stored documents; `_id` and
/// lifecycle metadata are discarded.
pub fn entity_from_row<E: Entity>(mut row: Document) -> DbResult<E> {
    canonicalize::<E>(&mut row);
    row.remove(ID_FIELD);
    for field in METADATA_FIELDS {
        row.remove(field);
    }
    bson::from_document::<E>(row).map_err(|e| DbError::conversion(E::COLLECTION, e))
}

/// Serializes an entity's domain fields, dropping anything the repository
/// owns (`_id` and lifecycle metadata).
pub fn entity_document<E: Entity>(entity: &E) -> DbResult<Document> {
    let mut document = bson::to_document(entity)?;
    document.remove(ID_FIELD);
    for field in METADATA_FIELDS {
        document.remove(field);
    }
    Ok(document)
}

/// Coerces the date encodings found in stored documents into a BSON date:
/// RFC 3339 strings, plain `YYYY-MM-DD` strings, epoch milliseconds and
/// `{seconds, nanoseconds}` timestamp documents. Anything else is returned as is.
pub fn normalize_date(value: Bson) -> Bson {
    match value {
        Bson::String(text) => parse_date_text(&text).map_or(Bson::String(text), Bson::DateTime),
        Bson::Int64(millis) => Bson::DateTime(DateTime::from_millis(millis)),
        Bson::Int32(millis) => Bson::DateTime(DateTime::from_millis(millis as i64)),
        Bson::Double(millis) if millis.is_finite() => {
            Bson::DateTime(DateTime::from_millis(millis as i64))
        }
        Bson::Timestamp(ts) => Bson::DateTime(DateTime::from_millis(ts.time as i64 * 1000)),
        Bson::Document(parts) => match timestamp_parts(&parts) {
            Some(dt) => Bson::DateTime(dt),
            None => Bson::Document(parts),
        },
        other => other,
    }
}

fn parse_date_text(text: &str) -> Option<DateTime> {
    if let Ok(dt) = DateTime::parse_rfc3339_str(text) {
        return Some(dt);
    }
    let day = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    let midnight = Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?);
    Some(DateTime::from_chrono(midnight))
}

fn timestamp_parts(parts: &Document) -> Option<DateTime> {
    let number = |key: &str| match parts.get(key)? {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    };
    let seconds = number("seconds").or_else(|| number("_seconds"))?;
    let nanos = number("nanoseconds")
        .or_else(|| number("_nanoseconds"))
        .unwrap_or(0);
    Some(DateTime::from_millis(seconds * 1000 + nanos / 1_000_000))
}
