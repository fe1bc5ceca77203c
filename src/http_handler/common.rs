use strum_macros::Display;

/// Failure to obtain a group index or group definition document.
///
/// A fetch error aborts the creation of the affected group only.
#[derive(Debug, Display)]
pub enum FetchError {
    /// The server could not be reached.
    NoConnection,
    /// The request did not complete within the client timeout.
    Timeout,
    /// The server answered with a non-success status code.
    Status(u16),
    /// The document body could not be decoded.
    Decode(String),
    /// Any other transport or filesystem failure.
    Io(String),
    /// The requested group is not listed in the group index.
    UnknownGroup(String),
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            FetchError::Timeout
        } else if value.is_connect() {
            FetchError::NoConnection
        } else if value.is_decode() {
            FetchError::Decode(value.to_string())
        } else if let Some(status) = value.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Io(value.to_string())
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(value: std::io::Error) -> Self { FetchError::Io(value.to_string()) }
}

impl From<serde_json::Error> for FetchError {
    fn from(value: serde_json::Error) -> Self { FetchError::Decode(value.to_string()) }
}
