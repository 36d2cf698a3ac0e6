//! The boundary between the client workflow and a vector database service.
//!
//! Everything the workflow needs from a server is expressed by
//! [`VectorService`]. [`crate::engine::LocalService`] implements it in
//! process; [`crate::client::HttpService`] implements it over HTTP.

use crate::data::InsertData;
use crate::distance::MetricType;
use crate::error::Result;
use crate::index::{BuildParams, IndexParams, IndexType, QueryParams};
use crate::schema::CollectionSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Largest `limit` a search may request.
pub const MAX_SEARCH_LIMIT: usize = 16_384;

/// Collection metadata returned by `describe_collection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub schema: CollectionSchema,
    pub loaded: bool,
}

/// Outcome of an insert call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertResult {
    pub insert_count: usize,
    pub ids: Vec<i64>,
}

/// Current index of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub field_name: String,
    pub index_type: IndexType,
    pub metric_type: MetricType,
    pub params: BuildParams,
    pub indexed_rows: usize,
}

impl fmt::Display for IndexDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{field: {}, index_type: {}, metric_type: {}",
            self.field_name, self.index_type, self.metric_type
        )?;
        if let Some(nlist) = self.params.nlist {
            write!(f, ", nlist: {}", nlist)?;
        }
        write!(f, "}}")
    }
}

/// A batch similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query vectors
    pub data: Vec<Vec<f32>>,
    /// Vector field to search
    pub anns_field: String,
    pub metric_type: MetricType,
    #[serde(default)]
    pub params: QueryParams,
    pub limit: usize,
    /// Optional boolean filter over scalar fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    /// Scalar fields whose values are returned with each hit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_fields: Vec<String>,
}

impl SearchRequest {
    pub fn new(anns_field: impl Into<String>, data: Vec<Vec<f32>>) -> Self {
        Self {
            data,
            anns_field: anns_field.into(),
            metric_type: MetricType::default(),
            params: QueryParams::default(),
            limit: 10,
            expr: None,
            output_fields: Vec::new(),
        }
    }

    pub fn metric_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    pub fn nprobe(mut self, nprobe: usize) -> Self {
        self.params.nprobe = Some(nprobe);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    pub fn output_fields(mut self, fields: Vec<String>) -> Self {
        self.output_fields = fields;
        self
    }
}

/// A scalar value attached to a hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int64(i64),
    Double(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int64(v) => write!(f, "{}", v),
            FieldValue::Double(v) => write!(f, "{}", v),
        }
    }
}

/// One neighbour of a query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: i64,
    pub distance: f32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldValue>,
}

impl fmt::Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id: {}, distance: {:.6}", self.id, self.distance)?;
        for (name, value) in &self.fields {
            write!(f, ", {}: {}", name, value)?;
        }
        Ok(())
    }
}

/// Hits per query vector, in request order.
pub type SearchResults = Vec<Vec<Hit>>;

/// Operations a vector database service exposes to its clients.
///
/// All calls are blocking. Database-scoped calls take the database name
/// explicitly; selecting an active database is the client's concern.
pub trait VectorService: Send + Sync {
    /// Verify reachability and credentials.
    fn authenticate(&self, user: &str, password: &str) -> Result<()>;

    fn create_database(&self, name: &str) -> Result<()>;

    fn list_databases(&self) -> Result<Vec<String>>;

    fn drop_database(&self, name: &str) -> Result<()>;

    fn create_collection(&self, db: &str, name: &str, schema: &CollectionSchema) -> Result<()>;

    fn describe_collection(&self, db: &str, name: &str) -> Result<CollectionInfo>;

    fn has_collection(&self, db: &str, name: &str) -> Result<bool>;

    fn list_collections(&self, db: &str) -> Result<Vec<String>>;

    fn drop_collection(&self, db: &str, name: &str) -> Result<()>;

    fn insert(&self, db: &str, collection: &str, data: &InsertData) -> Result<InsertResult>;

    /// Make buffered inserts durable and visible.
    fn flush(&self, db: &str, collection: &str) -> Result<()>;

    /// Number of flushed rows.
    fn num_entities(&self, db: &str, collection: &str) -> Result<usize>;

    fn create_index(
        &self,
        db: &str,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()>;

    fn describe_index(&self, db: &str, collection: &str) -> Result<IndexDescription>;

    fn drop_index(&self, db: &str, collection: &str) -> Result<()>;

    fn load(&self, db: &str, collection: &str) -> Result<()>;

    fn release(&self, db: &str, collection: &str) -> Result<()>;

    fn search(&self, db: &str, collection: &str, request: &SearchRequest) -> Result<SearchResults>;
}
