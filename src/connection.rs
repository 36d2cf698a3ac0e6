//! Named connections to a vector database service.

use crate::client::HttpService;
use crate::collection::Collection;
use crate::config::ConnectionConfig;
use crate::engine::DEFAULT_DATABASE;
use crate::error::{Result, VdbError};
use crate::schema::CollectionSchema;
use crate::service::VectorService;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Alias used when the caller does not pick one.
pub const DEFAULT_ALIAS: &str = "default";

/// An authenticated link to a service plus the database it currently works in.
pub struct Connection {
    alias: String,
    config: ConnectionConfig,
    service: Arc<dyn VectorService>,
    current_db: RwLock<String>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("alias", &self.alias)
            .field("current_db", &self.current_database())
            .finish()
    }
}

impl Connection {
    fn open(alias: &str, config: ConnectionConfig, service: Arc<dyn VectorService>) -> Result<Self> {
        service.authenticate(&config.user, &config.password)?;
        Ok(Self {
            alias: alias.to_string(),
            current_db: RwLock::new(config.db_name.clone()),
            config,
            service,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<dyn VectorService> {
        &self.service
    }

    /// Database that collection-level calls on this connection target.
    pub fn current_database(&self) -> String {
        self.current_db
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current_database(&self, name: &str) {
        *self.current_db.write().unwrap_or_else(PoisonError::into_inner) = name.to_string();
    }

    pub fn create_database(&self, name: &str) -> Result<()> {
        self.service.create_database(name)
    }

    /// Switch the active database. It must already exist.
    pub fn using_database(&self, name: &str) -> Result<()> {
        if !self.service.list_databases()?.iter().any(|db| db == name) {
            return Err(VdbError::database_not_found(name));
        }
        self.set_current_database(name);
        info!(alias = %self.alias, db = name, "using database");
        Ok(())
    }

    pub fn list_databases(&self) -> Result<Vec<String>> {
        self.service.list_databases()
    }

    /// Drop a database and all of its collections. Dropping the active
    /// database moves this connection back to `default`.
    pub fn drop_database(&self, name: &str) -> Result<()> {
        self.service.drop_database(name)?;
        if self.current_database() == name {
            self.set_current_database(DEFAULT_DATABASE);
        }
        Ok(())
    }

    pub fn list_collections(&self) -> Result<Vec<String>> {
        self.service.list_collections(&self.current_database())
    }

    pub fn has_collection(&self, name: &str) -> Result<bool> {
        self.service.has_collection(&self.current_database(), name)
    }

    /// Create a collection in the active database and return a handle to it.
    pub fn create_collection(&self, name: &str, schema: CollectionSchema) -> Result<Collection> {
        let db = self.current_database();
        self.service.create_collection(&db, name, &schema)?;
        Ok(Collection::new(self.service.clone(), db, name, schema))
    }

    /// Handle to an existing collection of the active database.
    pub fn collection(&self, name: &str) -> Result<Collection> {
        let db = self.current_database();
        let info = self.service.describe_collection(&db, name)?;
        Ok(Collection::new(self.service.clone(), db, name, info.schema))
    }

    pub fn drop_collection(&self, name: &str) -> Result<()> {
        self.service.drop_collection(&self.current_database(), name)
    }
}

/// Registry of open connections keyed by alias.
#[derive(Debug, Default)]
pub struct Connections {
    connections: RwLock<BTreeMap<String, Arc<Connection>>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to the HTTP endpoint described by `config`.
    pub fn connect(&self, alias: &str, config: ConnectionConfig) -> Result<Arc<Connection>> {
        let service = Arc::new(HttpService::new(&config));
        self.connect_with(alias, config, service)
    }

    /// Connect through an arbitrary service implementation.
    ///
    /// Credentials are checked immediately; the configured database is not.
    /// Reusing an alias replaces the earlier connection.
    pub fn connect_with(
        &self,
        alias: &str,
        config: ConnectionConfig,
        service: Arc<dyn VectorService>,
    ) -> Result<Arc<Connection>> {
        let connection = Arc::new(Connection::open(alias, config, service)?);
        let previous = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(alias.to_string(), connection.clone());
        if previous.is_some() {
            debug!(alias, "replaced existing connection");
        }
        info!(
            alias,
            host = %connection.config.host,
            port = connection.config.port,
            db = %connection.current_database(),
            "connected"
        );
        Ok(connection)
    }

    pub fn get(&self, alias: &str) -> Result<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alias)
            .cloned()
            .ok_or_else(|| {
                VdbError::connection(format!("connection alias not established: {}", alias))
            })
    }

    /// Forget a connection. Returns whether the alias was registered.
    pub fn disconnect(&self, alias: &str) -> bool {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(alias)
            .is_some();
        if removed {
            info!(alias, "disconnected");
        }
        removed
    }

    pub fn has_connection(&self, alias: &str) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(alias)
    }

    pub fn list_aliases(&self) -> Vec<String> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::engine::LocalService;

    fn local() -> Arc<dyn VectorService> {
        Arc::new(LocalService::new())
    }

    #[test]
    fn test_connect_and_lookup() {
        let connections = Connections::new();
        assert!(matches!(
            connections.get(DEFAULT_ALIAS),
            Err(VdbError::Connection { .. })
        ));

        connections
            .connect_with(DEFAULT_ALIAS, ConnectionConfig::default(), local())
            .unwrap();
        assert!(connections.has_connection(DEFAULT_ALIAS));
        assert_eq!(connections.list_aliases(), vec![DEFAULT_ALIAS.to_string()]);
        assert_eq!(
            connections.get(DEFAULT_ALIAS).unwrap().current_database(),
            DEFAULT_DATABASE
        );

        assert!(connections.disconnect(DEFAULT_ALIAS));
        assert!(!connections.disconnect(DEFAULT_ALIAS));
        assert!(connections.get(DEFAULT_ALIAS).is_err());
    }

    #[test]
    fn test_bad_credentials_rejected() {
        let connections = Connections::new();
        let service = Arc::new(LocalService::with_credentials(Credentials::new("root", "secret")));
        let result = connections.connect_with("c", ConnectionConfig::default(), service);
        assert!(matches!(result, Err(VdbError::Connection { .. })));
        assert!(!connections.has_connection("c"));
    }

    #[test]
    fn test_missing_database_surfaces_on_first_use() {
        let connections = Connections::new();
        let config = ConnectionConfig {
            db_name: "nope".to_string(),
            ..ConnectionConfig::default()
        };
        let conn = connections.connect_with("c", config, local()).unwrap();
        assert!(conn.list_collections().unwrap_err().is_not_found());
    }

    #[test]
    fn test_using_database() {
        let connections = Connections::new();
        let conn = connections
            .connect_with(DEFAULT_ALIAS, ConnectionConfig::default(), local())
            .unwrap();

        assert!(conn.using_database("db1").unwrap_err().is_not_found());
        conn.create_database("db1").unwrap();
        conn.using_database("db1").unwrap();
        assert_eq!(conn.current_database(), "db1");

        conn.create_collection("c", CollectionSchema::default_demo(4)).unwrap();
        assert!(conn.has_collection("c").unwrap());
        conn.using_database(DEFAULT_DATABASE).unwrap();
        assert!(!conn.has_collection("c").unwrap());
    }

    #[test]
    fn test_drop_current_database_falls_back() {
        let connections = Connections::new();
        let conn = connections
            .connect_with(DEFAULT_ALIAS, ConnectionConfig::default(), local())
            .unwrap();
        conn.create_database("db1").unwrap();
        conn.using_database("db1").unwrap();
        conn.drop_database("db1").unwrap();
        assert_eq!(conn.current_database(), DEFAULT_DATABASE);
        assert_eq!(conn.list_databases().unwrap(), vec![DEFAULT_DATABASE.to_string()]);
    }

    #[test]
    fn test_collection_handle_for_existing() {
        let connections = Connections::new();
        let conn = connections
            .connect_with(DEFAULT_ALIAS, ConnectionConfig::default(), local())
            .unwrap();
        assert!(conn.collection("c").unwrap_err().is_not_found());
        conn.create_collection("c", CollectionSchema::default_demo(4)).unwrap();
        let handle = conn.collection("c").unwrap();
        assert_eq!(handle.schema(), &CollectionSchema::default_demo(4));
    }
}
