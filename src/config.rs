//! Workflow configuration.
//!
//! Every knob the demonstration uses lives in one of these structs. They
//! all have defaults matching the stock sequence and can be overridden from
//! a JSON file and then from the command line.

use crate::distance::MetricType;
use crate::error::{Result, VdbError};
use crate::index::{IndexParams, IndexType};
use crate::service::SearchRequest;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A user/password pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn matches(&self, user: &str, password: &str) -> bool {
        self.user == user && self.password == password
    }

    /// Value of the `Authorization` header carrying these credentials.
    pub fn bearer(&self) -> String {
        format!("Bearer {}:{}", self.user, self.password)
    }

    /// Parse an `Authorization` header value produced by [`Credentials::bearer`].
    pub fn from_bearer(header: &str) -> Option<Self> {
        let token = header.strip_prefix("Bearer ")?;
        let (user, password) = token.split_once(':')?;
        Some(Self::new(user, password))
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("root", "Milvus")
    }
}

/// Where and how to reach the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database selected right after connecting
    pub db_name: String,
    /// Per-request timeout; none means wait indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let credentials = Credentials::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 19530,
            user: credentials.user,
            password: credentials.password,
            db_name: crate::engine::DEFAULT_DATABASE.to_string(),
            timeout_secs: None,
        }
    }
}

impl ConnectionConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.user.clone(), self.password.clone())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub index_type: IndexType,
    pub metric_type: MetricType,
    pub nlist: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_type: IndexType::IvfFlat,
            metric_type: MetricType::L2,
            nlist: 1024,
        }
    }
}

impl IndexConfig {
    pub fn params(&self) -> IndexParams {
        match self.index_type {
            IndexType::Flat => IndexParams::flat(self.metric_type),
            IndexType::IvfFlat => IndexParams::ivf_flat(self.metric_type, self.nlist),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub metric_type: MetricType,
    pub nprobe: usize,
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            metric_type: MetricType::L2,
            nprobe: 16,
            limit: 3,
        }
    }
}

impl SearchConfig {
    /// A request for `data` against `field` using these parameters.
    pub fn request(&self, field: &str, data: Vec<Vec<f32>>) -> SearchRequest {
        SearchRequest::new(field, data)
            .metric_type(self.metric_type)
            .nprobe(self.nprobe)
            .limit(self.limit)
    }
}

/// Identifiers used by the demonstration sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    /// Database created, used and dropped by the run
    pub database: String,
    /// Collection created in the starting database
    pub default_collection: String,
    /// Collections created in `database`; the last one gets data
    pub collections: Vec<String>,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            database: "db1".to_string(),
            default_collection: "col1_db1".to_string(),
            collections: vec!["col1_db1".to_string(), "col1_db2".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub connection: ConnectionConfig,
    pub dim: usize,
    pub num_entities: usize,
    pub index: IndexConfig,
    pub search: SearchConfig,
    /// How many of the inserted vectors are used as queries
    pub query_count: usize,
    pub names: NamesConfig,
    /// Seed for the random data; none draws one from the OS
    pub seed: Option<u64>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            dim: 128,
            num_entities: 10_000,
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            query_count: 3,
            names: NamesConfig::default(),
            seed: None,
        }
    }
}

impl WorkflowConfig {
    /// Load a config from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| VdbError::InvalidOperation {
            reason: format!("cannot read config {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&text).map_err(|e| VdbError::InvalidOperation {
            reason: format!("invalid config {}: {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.connection.base_url(), "http://127.0.0.1:19530");
        assert_eq!(config.connection.db_name, "default");
        assert_eq!(config.connection.timeout(), None);
        assert_eq!(config.dim, 128);
        assert_eq!(config.num_entities, 10_000);
        assert_eq!(config.index.params(), IndexParams::ivf_flat(MetricType::L2, 1024));
        assert_eq!(config.search.nprobe, 16);
        assert_eq!(config.search.limit, 3);
    }

    #[test]
    fn test_bearer_round_trip() {
        let creds = Credentials::default();
        assert_eq!(creds.bearer(), "Bearer root:Milvus");
        assert_eq!(Credentials::from_bearer(&creds.bearer()), Some(creds));
        assert_eq!(Credentials::from_bearer("Basic abc"), None);
        assert_eq!(Credentials::from_bearer("Bearer nocolon"), None);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"dim": 8, "num_entities": 50, "connection": {{"port": 8080}}, "index": {{"index_type": "FLAT"}}}}"#
        )
        .unwrap();

        let config = WorkflowConfig::from_file(file.path()).unwrap();
        assert_eq!(config.dim, 8);
        assert_eq!(config.num_entities, 50);
        assert_eq!(config.connection.port, 8080);
        assert_eq!(config.connection.host, "127.0.0.1");
        assert_eq!(config.index.index_type, IndexType::Flat);
        assert_eq!(config.index.nlist, 1024);
        assert_eq!(config.search, SearchConfig::default());
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WorkflowConfig::from_file(dir.path().join("missing.json")).is_err());

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(WorkflowConfig::from_file(file.path()).is_err());
    }
}
