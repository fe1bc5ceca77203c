pub mod common;
pub mod group_source;
pub mod http_client;
pub mod http_request;
pub mod http_response;

pub use common::FetchError;
pub use group_source::{FileGroupSource, GroupSource, HttpGroupSource};
pub use http_response::group_definition::{GroupDefinitionResponse, RawEntity};
pub use http_response::group_index::{GroupIndexEntry, GroupIndexResponse};
