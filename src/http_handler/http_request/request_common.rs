pub(crate) enum HTTPRequestMethod {
    Get,
}

/// A typed request for one JSON document.
pub(crate) trait HTTPRequestType {
    type Response: for<'de> serde::Deserialize<'de>;
    fn endpoint(&self) -> &str;
    fn request_method(&self) -> HTTPRequestMethod { HTTPRequestMethod::Get }
}
