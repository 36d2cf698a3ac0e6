//! Databases and the collections they own.

use crate::engine::collection::Collection;
use crate::error::{Result, VdbError};
use crate::schema::CollectionSchema;
use std::collections::BTreeMap;
use tracing::info;

/// Name of the database every service starts with.
pub const DEFAULT_DATABASE: &str = "default";

const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Default)]
pub struct Database {
    collections: BTreeMap<String, Collection>,
}

impl Database {
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}

/// All databases of one service instance.
#[derive(Debug)]
pub struct Catalog {
    databases: BTreeMap<String, Database>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// A catalog holding only the `default` database.
    pub fn new() -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(DEFAULT_DATABASE.to_string(), Database::default());
        Self { databases }
    }

    pub fn create_database(&mut self, name: &str) -> Result<()> {
        check_name("database", name).map_err(|reason| VdbError::InvalidOperation { reason })?;
        if self.databases.contains_key(name) {
            return Err(VdbError::AlreadyExists {
                resource: "database".to_string(),
                name: name.to_string(),
            });
        }
        self.databases.insert(name.to_string(), Database::default());
        info!(db = name, "created database");
        Ok(())
    }

    pub fn database_names(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    /// Remove a database and everything in it.
    pub fn drop_database(&mut self, name: &str) -> Result<()> {
        if name == DEFAULT_DATABASE {
            return Err(VdbError::InvalidOperation {
                reason: "the default database cannot be dropped".to_string(),
            });
        }
        let dropped = self
            .databases
            .remove(name)
            .ok_or_else(|| VdbError::database_not_found(name))?;
        info!(db = name, collections = dropped.collections.len(), "dropped database");
        Ok(())
    }

    pub fn database(&self, name: &str) -> Result<&Database> {
        self.databases
            .get(name)
            .ok_or_else(|| VdbError::database_not_found(name))
    }

    fn database_mut(&mut self, name: &str) -> Result<&mut Database> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| VdbError::database_not_found(name))
    }

    pub fn create_collection(
        &mut self,
        db: &str,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<()> {
        check_name("collection", name).map_err(VdbError::schema)?;
        schema.validate()?;

        let database = self.database_mut(db)?;
        if database.collections.contains_key(name) {
            return Err(VdbError::AlreadyExists {
                resource: "collection".to_string(),
                name: name.to_string(),
            });
        }
        database
            .collections
            .insert(name.to_string(), Collection::new(name, schema.clone()));
        info!(db, collection = name, fields = schema.fields.len(), "created collection");
        Ok(())
    }

    pub fn collection(&self, db: &str, name: &str) -> Result<&Collection> {
        self.database(db)?
            .collections
            .get(name)
            .ok_or_else(|| VdbError::collection_not_found(name))
    }

    pub fn collection_mut(&mut self, db: &str, name: &str) -> Result<&mut Collection> {
        self.database_mut(db)?
            .collections
            .get_mut(name)
            .ok_or_else(|| VdbError::collection_not_found(name))
    }

    pub fn drop_collection(&mut self, db: &str, name: &str) -> Result<()> {
        self.database_mut(db)?
            .collections
            .remove(name)
            .ok_or_else(|| VdbError::collection_not_found(name))?;
        info!(db, collection = name, "dropped collection");
        Ok(())
    }
}

/// Names start with a letter or underscore and contain only ASCII
/// alphanumerics and underscores.
fn check_name(resource: &str, name: &str) -> std::result::Result<(), String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || name.len() > MAX_NAME_LEN {
        return Err(format!("invalid {} name: {:?}", resource, name));
    }
    Ok(())
}
