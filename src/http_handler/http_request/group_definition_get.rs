use super::group_definition::GroupDefinitionResponse;
use super::request_common::HTTPRequestType;

#[derive(Debug)]
pub struct GroupDefinitionRequest {
    pub entities_url: String,
}

impl HTTPRequestType for GroupDefinitionRequest {
    type Response = GroupDefinitionResponse;
    fn endpoint(&self) -> &str { self.entities_url.as_str() }
}
