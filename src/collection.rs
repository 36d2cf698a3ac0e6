//! Client-side handle to one collection.

use crate::data::InsertData;
use crate::error::Result;
use crate::index::IndexParams;
use crate::schema::CollectionSchema;
use crate::service::{
    CollectionInfo, IndexDescription, InsertResult, SearchRequest, SearchResults, VectorService,
};
use std::sync::Arc;
use tracing::info;

/// A collection bound to the database that was active when the handle was
/// created. Switching the connection's database later does not move it.
#[derive(Clone)]
pub struct Collection {
    service: Arc<dyn VectorService>,
    db: String,
    name: String,
    schema: CollectionSchema,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("db", &self.db)
            .field("name", &self.name)
            .finish()
    }
}

impl Collection {
    pub(crate) fn new(
        service: Arc<dyn VectorService>,
        db: impl Into<String>,
        name: impl Into<String>,
        schema: CollectionSchema,
    ) -> Self {
        Self {
            service,
            db: db.into(),
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &str {
        &self.db
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn describe(&self) -> Result<CollectionInfo> {
        self.service.describe_collection(&self.db, &self.name)
    }

    /// Submit one batch. Rows are buffered until [`Collection::flush`].
    pub fn insert(&self, data: &InsertData) -> Result<InsertResult> {
        let result = self.service.insert(&self.db, &self.name, data)?;
        info!(db = %self.db, collection = %self.name, rows = result.insert_count, "inserted");
        Ok(result)
    }

    pub fn flush(&self) -> Result<()> {
        self.service.flush(&self.db, &self.name)
    }

    /// Number of flushed rows.
    pub fn num_entities(&self) -> Result<usize> {
        self.service.num_entities(&self.db, &self.name)
    }

    pub fn create_index(&self, field: &str, params: &IndexParams) -> Result<()> {
        self.service.create_index(&self.db, &self.name, field, params)?;
        info!(
            db = %self.db,
            collection = %self.name,
            field,
            index_type = %params.index_type,
            metric = %params.metric_type,
            "built index"
        );
        Ok(())
    }

    pub fn index(&self) -> Result<IndexDescription> {
        self.service.describe_index(&self.db, &self.name)
    }

    pub fn drop_index(&self) -> Result<()> {
        self.service.drop_index(&self.db, &self.name)
    }

    pub fn load(&self) -> Result<()> {
        self.service.load(&self.db, &self.name)
    }

    pub fn release(&self) -> Result<()> {
        self.service.release(&self.db, &self.name)
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        self.service.search(&self.db, &self.name, request)
    }

    /// Remove the collection with its data and index. Other handles to it
    /// fail with `NotFound` afterwards.
    pub fn drop_collection(self) -> Result<()> {
        self.service.drop_collection(&self.db, &self.name)
    }
}
