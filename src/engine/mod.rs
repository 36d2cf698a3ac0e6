//! In-process reference implementation of [`VectorService`].

pub mod catalog;
pub mod collection;

pub use catalog::{Catalog, DEFAULT_DATABASE};
pub use collection::Collection;

use crate::config::Credentials;
use crate::data::InsertData;
use crate::error::{Result, VdbError};
use crate::index::IndexParams;
use crate::schema::CollectionSchema;
use crate::service::{
    CollectionInfo, IndexDescription, InsertResult, SearchRequest, SearchResults, VectorService,
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// A vector database living in the current process.
///
/// Clones share the same catalog, so one instance can back both an HTTP
/// server and direct in-process connections.
#[derive(Debug, Clone)]
pub struct LocalService {
    catalog: Arc<RwLock<Catalog>>,
    credentials: Credentials,
}

impl Default for LocalService {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalService {
    /// A service with the default credentials and only the `default` database.
    pub fn new() -> Self {
        Self::with_credentials(Credentials::default())
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(Catalog::new())),
            credentials,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Catalog>> {
        self.catalog
            .read()
            .map_err(|_| VdbError::protocol("catalog lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Catalog>> {
        self.catalog
            .write()
            .map_err(|_| VdbError::protocol("catalog lock poisoned"))
    }
}

impl VectorService for LocalService {
    fn authenticate(&self, user: &str, password: &str) -> Result<()> {
        if self.credentials.matches(user, password) {
            debug!(user, "authenticated");
            Ok(())
        } else {
            warn!(user, "rejected credentials");
            Err(VdbError::connection(format!(
                "authentication failed for user {}",
                user
            )))
        }
    }

    fn create_database(&self, name: &str) -> Result<()> {
        self.write()?.create_database(name)
    }

    fn list_databases(&self) -> Result<Vec<String>> {
        Ok(self.read()?.database_names())
    }

    fn drop_database(&self, name: &str) -> Result<()> {
        self.write()?.drop_database(name)
    }

    fn create_collection(&self, db: &str, name: &str, schema: &CollectionSchema) -> Result<()> {
        self.write()?.create_collection(db, name, schema)
    }

    fn describe_collection(&self, db: &str, name: &str) -> Result<CollectionInfo> {
        let catalog = self.read()?;
        let collection = catalog.collection(db, name)?;
        Ok(CollectionInfo {
            name: collection.name().to_string(),
            schema: collection.schema().clone(),
            loaded: collection.is_loaded(),
        })
    }

    fn has_collection(&self, db: &str, name: &str) -> Result<bool> {
        let catalog = self.read()?;
        Ok(catalog.database(db)?.collection_names().iter().any(|c| c == name))
    }

    fn list_collections(&self, db: &str) -> Result<Vec<String>> {
        Ok(self.read()?.database(db)?.collection_names())
    }

    fn drop_collection(&self, db: &str, name: &str) -> Result<()> {
        self.write()?.drop_collection(db, name)
    }

    fn insert(&self, db: &str, collection: &str, data: &InsertData) -> Result<InsertResult> {
        self.write()?
            .collection_mut(db, collection)?
            .insert(data.clone())
    }

    fn flush(&self, db: &str, collection: &str) -> Result<()> {
        self.write()?.collection_mut(db, collection)?.flush()
    }

    fn num_entities(&self, db: &str, collection: &str) -> Result<usize> {
        Ok(self.read()?.collection(db, collection)?.num_entities())
    }

    fn create_index(
        &self,
        db: &str,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()> {
        self.write()?
            .collection_mut(db, collection)?
            .create_index(field, params)
    }

    fn describe_index(&self, db: &str, collection: &str) -> Result<IndexDescription> {
        self.read()?.collection(db, collection)?.describe_index()
    }

    fn drop_index(&self, db: &str, collection: &str) -> Result<()> {
        self.write()?.collection_mut(db, collection)?.drop_index()
    }

    fn load(&self, db: &str, collection: &str) -> Result<()> {
        self.write()?.collection_mut(db, collection)?.load()
    }

    fn release(&self, db: &str, collection: &str) -> Result<()> {
        self.write()?.collection_mut(db, collection)?.release();
        Ok(())
    }

    fn search(&self, db: &str, collection: &str, request: &SearchRequest) -> Result<SearchResults> {
        self.read()?.collection(db, collection)?.search(request)
    }
}
