//! The demonstration sequence, one method per step.

use crate::collection::Collection;
use crate::config::WorkflowConfig;
use crate::connection::{Connection, Connections, DEFAULT_ALIAS};
use crate::data::{generate_rows, random_vectors, ColumnValues};
use crate::engine::DEFAULT_DATABASE;
use crate::error::{Result, VdbError};
use crate::schema::CollectionSchema;
use crate::service::{IndexDescription, SearchResults, VectorService};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

/// What [`Workflow::read_write`] observed.
#[derive(Debug, Clone)]
pub struct ReadWriteReport {
    /// Entity count after the flush
    pub num_entities: usize,
    pub index: IndexDescription,
    /// The inserted vectors used as queries
    pub queries: Vec<Vec<f32>>,
    pub results: SearchResults,
}

/// What [`Workflow::run`] observed.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub read_write: ReadWriteReport,
    /// Collections of the created database before cleanup
    pub collections: Vec<String>,
    /// Databases left after cleanup
    pub databases: Vec<String>,
}

/// Drives one connection through the create, insert, index, search and
/// drop sequence.
pub struct Workflow {
    config: WorkflowConfig,
    connections: Connections,
    rng: StdRng,
}

impl Workflow {
    pub fn new(config: WorkflowConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            connections: Connections::new(),
            rng,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Connect to the configured HTTP endpoint.
    pub fn connect(&self) -> Result<Arc<Connection>> {
        self.connections
            .connect(DEFAULT_ALIAS, self.config.connection.clone())
    }

    /// Connect through `service` instead of the network.
    pub fn connect_with(&self, service: Arc<dyn VectorService>) -> Result<Arc<Connection>> {
        self.connections
            .connect_with(DEFAULT_ALIAS, self.config.connection.clone(), service)
    }

    pub fn connection(&self) -> Result<Arc<Connection>> {
        self.connections.get(DEFAULT_ALIAS)
    }

    /// Create a collection with the demonstration schema in the active
    /// database.
    pub fn create_collection(&self, name: &str) -> Result<Collection> {
        info!(collection = name, dim = self.config.dim, "creating collection");
        self.connection()?
            .create_collection(name, CollectionSchema::default_demo(self.config.dim))
    }

    /// Insert `count` generated rows whose vectors have `dim` components and
    /// return those vectors. The rows are not flushed.
    ///
    /// A `dim` different from the schema's is sent as is and rejected by the
    /// service.
    pub fn insert_random(
        &mut self,
        collection: &Collection,
        count: usize,
        dim: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let field = vector_field(collection)?;
        let mut data = generate_rows(collection.schema(), count, &mut self.rng);
        let column = data
            .columns
            .iter_mut()
            .find(|c| c.name == field)
            .ok_or_else(|| VdbError::insert(format!("no column for {}", field)))?;

        if collection.schema().field(&field).and_then(|f| f.dim) != Some(dim) {
            column.values = ColumnValues::FloatVector(random_vectors(count, dim, &mut self.rng));
        }
        let vectors = match &column.values {
            ColumnValues::FloatVector(v) => v.clone(),
            _ => Vec::new(),
        };

        collection.insert(&data)?;
        Ok(vectors)
    }

    /// Build the configured index on the vector field and describe it.
    pub fn build_index(&self, collection: &Collection) -> Result<IndexDescription> {
        let field = vector_field(collection)?;
        collection.create_index(&field, &self.config.index.params())?;
        collection.index()
    }

    /// Search `queries` with the configured parameters, restricted to rows
    /// with a non-negative primary key.
    pub fn search(&self, collection: &Collection, queries: Vec<Vec<f32>>) -> Result<SearchResults> {
        let field = vector_field(collection)?;
        let pk = collection
            .schema()
            .primary_field()
            .map(|f| f.name.clone())
            .ok_or_else(|| VdbError::schema("collection has no primary key"))?;
        let request = self
            .config
            .search
            .request(&field, queries)
            .expr(format!("{} >= 0", pk));
        collection.search(&request)
    }

    /// Insert, flush, index, load, search, release and drop the index.
    pub fn read_write(&mut self, collection: &Collection) -> Result<ReadWriteReport> {
        let vectors = self.insert_random(collection, self.config.num_entities, self.config.dim)?;
        collection.flush()?;
        let num_entities = collection.num_entities()?;
        info!(collection = collection.name(), num_entities, "flushed");

        let index = self.build_index(collection)?;
        collection.load()?;

        let queries: Vec<Vec<f32>> = vectors.into_iter().take(self.config.query_count).collect();
        let results = self.search(collection, queries.clone())?;

        collection.release()?;
        collection.drop_index()?;

        Ok(ReadWriteReport {
            num_entities,
            index,
            queries,
            results,
        })
    }

    /// Replay the whole demonstration. Connects over HTTP first unless a
    /// connection is already established.
    pub fn run(&mut self) -> Result<RunReport> {
        let connection = match self.connection() {
            Ok(connection) => connection,
            Err(_) => self.connect()?,
        };
        let names = self.config.names.clone();

        self.create_collection(&names.default_collection)?;

        connection.create_database(&names.database)?;
        connection.using_database(&names.database)?;

        let mut created = Vec::with_capacity(names.collections.len());
        for name in &names.collections {
            created.push(self.create_collection(name)?);
        }
        let target = created
            .last()
            .ok_or_else(|| VdbError::InvalidOperation {
                reason: "no collections configured".to_string(),
            })?;

        let read_write = self.read_write(target)?;
        let collections = connection.list_collections()?;

        for collection in created {
            collection.drop_collection()?;
        }
        connection.drop_database(&names.database)?;
        if connection.current_database() != DEFAULT_DATABASE {
            connection.using_database(DEFAULT_DATABASE)?;
        }
        let databases = connection.list_databases()?;

        Ok(RunReport {
            read_write,
            collections,
            databases,
        })
    }
}

fn vector_field(collection: &Collection) -> Result<String> {
    collection
        .schema()
        .vector_fields()
        .next()
        .map(|f| f.name.clone())
        .ok_or_else(|| VdbError::schema("collection has no vector field"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::engine::LocalService;
    use crate::index::IndexType;

    fn small_config() -> WorkflowConfig {
        WorkflowConfig {
            dim: 8,
            num_entities: 200,
            index: IndexConfig {
                nlist: 16,
                ..IndexConfig::default()
            },
            seed: Some(7),
            ..WorkflowConfig::default()
        }
    }

    fn connected(config: WorkflowConfig) -> Workflow {
        let workflow = Workflow::new(config);
        workflow.connect_with(Arc::new(LocalService::new())).unwrap();
        workflow
    }

    #[test]
    fn test_not_connected() {
        let workflow = Workflow::new(small_config());
        assert!(matches!(
            workflow.create_collection("c"),
            Err(VdbError::Connection { .. })
        ));
    }

    #[test]
    fn test_insert_random_returns_vectors() {
        let mut workflow = connected(small_config());
        let coll = workflow.create_collection("c").unwrap();
        let vectors = workflow.insert_random(&coll, 10, 8).unwrap();
        assert_eq!(vectors.len(), 10);
        assert!(vectors.iter().flatten().all(|x| (0.0..1.0).contains(x)));

        assert_eq!(coll.num_entities().unwrap(), 0);
        coll.flush().unwrap();
        assert_eq!(coll.num_entities().unwrap(), 10);
    }

    #[test]
    fn test_insert_random_wrong_dim() {
        let mut workflow = connected(small_config());
        let coll = workflow.create_collection("c").unwrap();
        assert!(matches!(
            workflow.insert_random(&coll, 10, 9),
            Err(VdbError::Insert { .. })
        ));
    }

    #[test]
    fn test_read_write_finds_queries() {
        let mut workflow = connected(small_config());
        let coll = workflow.create_collection("c").unwrap();
        let report = workflow.read_write(&coll).unwrap();

        assert_eq!(report.num_entities, 200);
        assert_eq!(report.index.index_type, IndexType::IvfFlat);
        assert_eq!(report.results.len(), 3);
        for (i, hits) in report.results.iter().enumerate() {
            assert_eq!(hits.len(), 3);
            assert_eq!(hits[0].id, i as i64);
            assert!(hits[0].distance.abs() < 1e-5);
        }
        // read_write leaves the collection released and without an index
        assert!(coll.index().unwrap_err().is_not_found());
        assert!(!coll.describe().unwrap().loaded);
    }

    #[test]
    fn test_run_cleans_up() {
        let mut workflow = connected(small_config());
        let report = workflow.run().unwrap();
        assert_eq!(
            report.collections,
            vec!["col1_db1".to_string(), "col1_db2".to_string()]
        );
        assert_eq!(report.databases, vec![DEFAULT_DATABASE.to_string()]);

        let conn = workflow.connection().unwrap();
        assert_eq!(conn.list_collections().unwrap(), vec!["col1_db1".to_string()]);
    }
}
