//! Request input parsing: filters, updates, ids and paging

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use serde_json::Value;

use crate::{Error, Result};

/// Databases hidden from listings
const SYSTEM_DATABASES: [&str; 3] = ["admin", "local", "config"];

/// Documents returned when `limit` is absent
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper clamp for `limit`
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Page size bounds for document listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

/// Resolved paging window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub skip: u64,
}

impl PageLimits {
    #[must_use]
    pub const fn new(default_limit: u32, max_limit: u32) -> Self {
        Self {
            default_limit,
            max_limit,
        }
    }

    /// Parse raw `limit`/`skip` query values.
    ///
    /// Missing values take defaults; `limit` is clamped into `1..=max_limit`.
    pub fn resolve(&self, limit: Option<&str>, skip: Option<&str>) -> Result<Page> {
        let limit = match limit.map(str::trim).filter(|s| !s.is_empty()) {
            None => self.default_limit,
            Some(raw) => {
                let requested = raw.parse::<u64>().map_err(|_| {
                    Error::InvalidQuery(format!("limit must be a non-negative integer, got {raw:?}"))
                })?;
                requested.clamp(1, u64::from(self.max_limit)) as u32
            }
        };
        let skip = match skip.map(str::trim).filter(|s| !s.is_empty()) {
            None => 0,
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::InvalidQuery(format!("skip must be a non-negative integer, got {raw:?}"))
            })?,
        };
        Ok(Page {
            limit: limit.min(self.max_limit),
            skip,
        })
    }
}

/// Parse a JSON filter string; absent or blank means match-all.
///
/// Extended JSON (`{"$oid": ...}`, `{"$date": ...}`) is honored.
pub fn parse_filter(query: Option<&str>) -> Result<Document> {
    let raw = query.map(str::trim).filter(|q| !q.is_empty()).unwrap_or("{}");
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidQuery(format!("query is not valid JSON: {e}")))?;
    json_to_document(value, "query")
}

/// Parse the `update` body of a partial update; must be a non-empty object
pub fn parse_update(update: Value) -> Result<Document> {
    let document = json_to_document(update, "update")?;
    if document.is_empty() {
        return Err(Error::InvalidQuery("update must not be empty".into()));
    }
    Ok(document)
}

/// Interpret a document id from a request body.
///
/// 24-hex strings become ObjectIds; other strings stay literal. Non-string
/// values go through extended JSON.
pub fn parse_document_id(id: &Value) -> Result<Bson> {
    match id {
        Value::String(s) if s.is_empty() => {
            Err(Error::InvalidQuery("documentId must not be empty".into()))
        }
        Value::String(s) => Ok(string_id(s)),
        Value::Null => Err(Error::InvalidQuery("documentId is required".into())),
        other => Bson::try_from(other.clone())
            .map_err(|e| Error::InvalidQuery(format!("invalid documentId: {e}"))),
    }
}

fn string_id(id: &str) -> Bson {
    if id.len() == 24
        && let Ok(oid) = ObjectId::parse_str(id)
    {
        return Bson::ObjectId(oid);
    }
    Bson::String(id.to_owned())
}

#[must_use]
pub fn is_system_database(name: &str) -> bool {
    SYSTEM_DATABASES.contains(&name) || name.starts_with("system.")
}

fn json_to_document(value: Value, what: &str) -> Result<Document> {
    if !value.is_object() {
        return Err(Error::InvalidQuery(format!("{what} must be a JSON object")));
    }
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(_) => Err(Error::InvalidQuery(format!("{what} must be a JSON object"))),
        Err(e) => Err(Error::InvalidQuery(format!("invalid {what}: {e}"))),
    }
}
