use super::http_response::{group_definition, group_index};

pub mod group_definition_get;
pub mod group_index_get;
pub mod request_common;
