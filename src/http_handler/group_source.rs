use super::common::FetchError;
use super::http_client::HTTPClient;
use super::http_request::{
    group_definition_get::GroupDefinitionRequest, group_index_get::GroupIndexRequest,
};
use super::http_response::{group_definition::GroupDefinitionResponse, group_index::GroupIndexResponse};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider of the group index and group definition documents.
#[async_trait]
pub trait GroupSource: Send + Sync {
    /// Fetches the index of all available groups.
    async fn group_index(&self) -> Result<GroupIndexResponse, FetchError>;

    /// Fetches the definition of the group whose entities live at `entities_url`.
    async fn group_definition(&self, entities_url: &str) -> Result<GroupDefinitionResponse, FetchError>;
}

/// Fetches group documents over HTTP.
pub struct HttpGroupSource {
    client: Arc<HTTPClient>,
    index_path: String,
}

impl HttpGroupSource {
    pub(crate) fn new(client: Arc<HTTPClient>, index_path: &str) -> Self {
        Self { client, index_path: index_path.to_string() }
    }
}

#[async_trait]
impl GroupSource for HttpGroupSource {
    async fn group_index(&self) -> Result<GroupIndexResponse, FetchError> {
        let request = GroupIndexRequest { path: self.index_path.clone() };
        self.client.send_request(&request).await
    }

    async fn group_definition(&self, entities_url: &str) -> Result<GroupDefinitionResponse, FetchError> {
        let request = GroupDefinitionRequest { entities_url: entities_url.to_string() };
        self.client.send_request(&request).await
    }
}

/// Reads group documents from a local directory laid out like the HTTP server root.
pub struct FileGroupSource {
    root: PathBuf,
    index_path: String,
}

impl FileGroupSource {
    pub fn new(root: PathBuf, index_path: &str) -> Self {
        Self { root, index_path: index_path.to_string() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches("./").trim_start_matches('/'))
    }

    async fn read_json<T>(&self, path: &str) -> Result<T, FetchError>
    where T: for<'de> serde::Deserialize<'de> {
        let bytes = tokio::fs::read(self.resolve(path)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl GroupSource for FileGroupSource {
    async fn group_index(&self) -> Result<GroupIndexResponse, FetchError> {
        self.read_json(&self.index_path).await
    }

    async fn group_definition(&self, entities_url: &str) -> Result<GroupDefinitionResponse, FetchError> {
        self.read_json(entities_url).await
    }
}
