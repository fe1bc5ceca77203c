use super::group_index::GroupIndexResponse;
use super::request_common::HTTPRequestType;

#[derive(Debug)]
pub struct GroupIndexRequest {
    pub path: String,
}

impl HTTPRequestType for GroupIndexRequest {
    type Response = GroupIndexResponse;
    fn endpoint(&self) -> &str { self.path.as_str() }
}
