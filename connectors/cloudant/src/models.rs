use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ID_FIELD: &str = "_id";
pub const REV_FIELD: &str = "_rev";

/// A schemaless JSON document as stored by Cloudant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn rev(&self) -> Option<&str> {
        self.0.get(REV_FIELD).and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert(ID_FIELD.to_string(), Value::String(id.into()));
    }

    pub fn set_rev(&mut self, rev: impl Into<String>) {
        self.0.insert(REV_FIELD.to_string(), Value::String(rev.into()));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlays `fields` onto this document. `_id` in `fields` is ignored so
    /// a document can never be moved to another identifier.
    pub fn merge(&mut self, fields: Document) {
        for (key, value) in fields.0 {
            if key == ID_FIELD {
                continue;
            }
            self.0.insert(key, value);
        }
    }
}

impl TryFrom<Value> for Document {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Acknowledgment returned by document writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAck {
    #[serde(default)]
    pub ok: bool,
    pub id: String,
    #[serde(default)]
    pub rev: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseCreation {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub db_name: String,
    #[serde(default)]
    pub doc_count: u64,
    #[serde(default)]
    pub doc_del_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllDocsResponse {
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub offset: Option<u64>,
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    pub key: String,
    pub value: RowValue,
    #[serde(default)]
    pub doc: Option<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowValue {
    pub rev: String,
}

impl AllDocsResponse {
    /// Document bodies of the listing. Rows fetched without
    /// `include_docs` carry no body and are skipped.
    pub fn into_documents(self) -> Vec<Document> {
        self.rows.into_iter().filter_map(|row| row.doc).collect()
    }
}

/// Error body shape used by Cloudant and CouchDB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub reason: String,
}
