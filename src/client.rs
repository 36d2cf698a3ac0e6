//! Blocking HTTP client for the reference server.

use crate::config::{ConnectionConfig, Credentials};
use crate::data::InsertData;
use crate::error::{Result, VdbError};
use crate::index::IndexParams;
use crate::schema::CollectionSchema;
use crate::service::{
    CollectionInfo, IndexDescription, InsertResult, SearchRequest, SearchResults, VectorService,
};
use crate::wire::{self, *};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// [`VectorService`] backed by a remote server.
///
/// Credentials are sent with every request; `authenticate` swaps them for
/// the ones being checked.
pub struct HttpService {
    agent: ureq::Agent,
    base_url: String,
    credentials: std::sync::RwLock<Credentials>,
}

impl HttpService {
    pub fn new(config: &ConnectionConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(config.timeout())
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            base_url: config.base_url(),
            credentials: std::sync::RwLock::new(config.credentials()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bearer(&self) -> Result<String> {
        self.credentials
            .read()
            .map(|c| c.bearer())
            .map_err(|_| VdbError::protocol("credentials lock poisoned"))
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let bytes = serde_json::to_vec(body)
            .map_err(|e| VdbError::protocol(format!("failed to serialize request: {}", e)))?;
        debug!(%url, bytes = bytes.len(), "POST");

        let mut response = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", &self.bearer()?)
            .send(&bytes[..])
            .map_err(|e| VdbError::connection(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
            .map_err(|e| VdbError::connection(format!("failed to read response: {}", e)))?;

        let reply: Reply<T> = serde_json::from_str(&text).map_err(|e| {
            VdbError::protocol(format!(
                "unexpected response (HTTP {}): {}: {}",
                status,
                e,
                &text[..text.len().min(200)]
            ))
        })?;
        reply.into_result()
    }

    fn collection_body(db: &str, collection: &str) -> CollectionBody {
        CollectionBody {
            db_name: db.to_string(),
            collection_name: collection.to_string(),
        }
    }
}

impl VectorService for HttpService {
    fn authenticate(&self, user: &str, password: &str) -> Result<()> {
        {
            let mut credentials = self
                .credentials
                .write()
                .map_err(|_| VdbError::protocol("credentials lock poisoned"))?;
            *credentials = Credentials::new(user, password);
        }
        self.post(wire::AUTH_CHECK, &EmptyBody::default())
    }

    fn create_database(&self, name: &str) -> Result<()> {
        self.post(
            wire::CREATE_DATABASE,
            &DatabaseBody {
                db_name: name.to_string(),
            },
        )
    }

    fn list_databases(&self) -> Result<Vec<String>> {
        self.post(wire::LIST_DATABASES, &EmptyBody::default())
    }

    fn drop_database(&self, name: &str) -> Result<()> {
        self.post(
            wire::DROP_DATABASE,
            &DatabaseBody {
                db_name: name.to_string(),
            },
        )
    }

    fn create_collection(&self, db: &str, name: &str, schema: &CollectionSchema) -> Result<()> {
        self.post(
            wire::CREATE_COLLECTION,
            &CreateCollectionBody {
                db_name: db.to_string(),
                collection_name: name.to_string(),
                schema: schema.clone(),
            },
        )
    }

    fn describe_collection(&self, db: &str, name: &str) -> Result<CollectionInfo> {
        self.post(wire::DESCRIBE_COLLECTION, &Self::collection_body(db, name))
    }

    fn has_collection(&self, db: &str, name: &str) -> Result<bool> {
        self.post(wire::HAS_COLLECTION, &Self::collection_body(db, name))
    }

    fn list_collections(&self, db: &str) -> Result<Vec<String>> {
        self.post(
            wire::LIST_COLLECTIONS,
            &DatabaseBody {
                db_name: db.to_string(),
            },
        )
    }

    fn drop_collection(&self, db: &str, name: &str) -> Result<()> {
        self.post(wire::DROP_COLLECTION, &Self::collection_body(db, name))
    }

    fn insert(&self, db: &str, collection: &str, data: &InsertData) -> Result<InsertResult> {
        self.post(
            wire::INSERT,
            &InsertBody {
                db_name: db.to_string(),
                collection_name: collection.to_string(),
                data: data.clone(),
            },
        )
    }

    fn flush(&self, db: &str, collection: &str) -> Result<()> {
        self.post(wire::FLUSH, &Self::collection_body(db, collection))
    }

    fn num_entities(&self, db: &str, collection: &str) -> Result<usize> {
        self.post(wire::NUM_ENTITIES, &Self::collection_body(db, collection))
    }

    fn create_index(
        &self,
        db: &str,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()> {
        self.post(
            wire::CREATE_INDEX,
            &CreateIndexBody {
                db_name: db.to_string(),
                collection_name: collection.to_string(),
                field_name: field.to_string(),
                index_params: *params,
            },
        )
    }

    fn describe_index(&self, db: &str, collection: &str) -> Result<IndexDescription> {
        self.post(wire::DESCRIBE_INDEX, &Self::collection_body(db, collection))
    }

    fn drop_index(&self, db: &str, collection: &str) -> Result<()> {
        self.post(wire::DROP_INDEX, &Self::collection_body(db, collection))
    }

    fn load(&self, db: &str, collection: &str) -> Result<()> {
        self.post(wire::LOAD, &Self::collection_body(db, collection))
    }

    fn release(&self, db: &str, collection: &str) -> Result<()> {
        self.post(wire::RELEASE, &Self::collection_body(db, collection))
    }

    fn search(&self, db: &str, collection: &str, request: &SearchRequest) -> Result<SearchResults> {
        self.post(
            wire::SEARCH,
            &SearchBody {
                db_name: db.to_string(),
                collection_name: collection.to_string(),
                request: request.clone(),
            },
        )
    }
}
