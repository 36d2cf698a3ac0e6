//! # vdb_workflow
//!
//! A vector database client workflow: connect, create databases and
//! collections, insert vectors, build an index, search, and clean up.
//!
//! This library provides:
//! - A connection registry with per-connection active database
//! - Collection handles for insert, flush, index, load and search
//! - The [`VectorService`] boundary with an in-process implementation
//!   ([`LocalService`]) and an HTTP one ([`HttpService`])
//! - A reference HTTP server exposing [`LocalService`]
//! - FLAT and IVF_FLAT indexes with L2, IP and COSINE metrics
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vdb_workflow::{LocalService, Workflow, WorkflowConfig};
//!
//! let config = WorkflowConfig {
//!     dim: 8,
//!     num_entities: 100,
//!     seed: Some(1),
//!     ..WorkflowConfig::default()
//! };
//! let mut workflow = Workflow::new(config);
//! workflow.connect_with(Arc::new(LocalService::new())).unwrap();
//!
//! let report = workflow.run().unwrap();
//! assert_eq!(report.read_write.num_entities, 100);
//! assert_eq!(report.read_write.results[0][0].id, 0);
//! ```

pub mod client;
pub mod collection;
pub mod config;
pub mod connection;
pub mod data;
pub mod distance;
pub mod engine;
pub mod error;
pub mod expr;
pub mod index;
pub mod schema;
pub mod server;
pub mod service;
pub mod wire;
pub mod workflow;

pub use client::HttpService;
pub use collection::Collection;
pub use config::{ConnectionConfig, Credentials, IndexConfig, SearchConfig, WorkflowConfig};
pub use connection::{Connection, Connections, DEFAULT_ALIAS};
pub use data::{generate_rows, ColumnValues, FieldColumn, InsertData};
pub use distance::MetricType;
pub use engine::{LocalService, DEFAULT_DATABASE};
pub use error::{Result, VdbError};
pub use index::{IndexParams, IndexType};
pub use schema::{CollectionSchema, DataType, FieldSchema};
pub use service::{Hit, IndexDescription, SearchRequest, SearchResults, VectorService};
pub use workflow::{ReadWriteReport, RunReport, Workflow};
