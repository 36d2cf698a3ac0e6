//! JSON messages exchanged between [`crate::client::HttpService`] and the
//! reference server.
//!
//! Every operation is a `POST` to one of the paths below with a camelCase
//! JSON body, answered by a [`Reply`].

use crate::data::InsertData;
use crate::error::{Result, VdbError};
use crate::index::IndexParams;
use crate::schema::CollectionSchema;
use crate::service::SearchRequest;
use serde::{Deserialize, Serialize};

pub const AUTH_CHECK: &str = "/v2/vectordb/auth/check";

pub const CREATE_DATABASE: &str = "/v2/vectordb/databases/create";
pub const LIST_DATABASES: &str = "/v2/vectordb/databases/list";
pub const DROP_DATABASE: &str = "/v2/vectordb/databases/drop";

pub const CREATE_COLLECTION: &str = "/v2/vectordb/collections/create";
pub const DESCRIBE_COLLECTION: &str = "/v2/vectordb/collections/describe";
pub const HAS_COLLECTION: &str = "/v2/vectordb/collections/has";
pub const LIST_COLLECTIONS: &str = "/v2/vectordb/collections/list";
pub const DROP_COLLECTION: &str = "/v2/vectordb/collections/drop";
pub const FLUSH: &str = "/v2/vectordb/collections/flush";
pub const NUM_ENTITIES: &str = "/v2/vectordb/collections/get_stats";
pub const LOAD: &str = "/v2/vectordb/collections/load";
pub const RELEASE: &str = "/v2/vectordb/collections/release";

pub const INSERT: &str = "/v2/vectordb/entities/insert";
pub const SEARCH: &str = "/v2/vectordb/entities/search";

pub const CREATE_INDEX: &str = "/v2/vectordb/indexes/create";
pub const DESCRIBE_INDEX: &str = "/v2/vectordb/indexes/describe";
pub const DROP_INDEX: &str = "/v2/vectordb/indexes/drop";

pub const HEALTH: &str = "/health";

/// Body of calls that take no arguments.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EmptyBody {}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseBody {
    pub db_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBody {
    pub db_name: String,
    pub collection_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionBody {
    pub db_name: String,
    pub collection_name: String,
    pub schema: CollectionSchema,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertBody {
    pub db_name: String,
    pub collection_name: String,
    pub data: InsertData,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIndexBody {
    pub db_name: String,
    pub collection_name: String,
    pub field_name: String,
    pub index_params: IndexParams,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub db_name: String,
    pub collection_name: String,
    pub request: SearchRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReply {
    pub status: String,
    pub databases: usize,
}

/// Envelope of every operation reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply<T> {
    Ok { data: T },
    Err { error: VdbError },
}

impl<T> Reply<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            Reply::Ok { data } => Ok(data),
            Reply::Err { error } => Err(error),
        }
    }
}

impl<T> From<Result<T>> for Reply<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Reply::Ok { data },
            Err(error) => Reply::Err { error },
        }
    }
}
