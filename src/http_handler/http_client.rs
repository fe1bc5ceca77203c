use super::common::FetchError;
use super::http_request::request_common::{HTTPRequestMethod, HTTPRequestType};

/// A simple wrapper around `reqwest::Client` with a preconfigured base URL.
///
/// Group documents are addressed by paths relative to the base URL (the group index
/// stores entity URLs such as `./groups/stations.json`), or by absolute URLs.
#[derive(Debug)]
pub(crate) struct HTTPClient {
    /// The underlying `reqwest::Client` used to perform HTTP requests.
    client: reqwest::Client,
    /// Base URL prepended to all relative endpoint paths.
    base_url: String,
}

impl HTTPClient {
    /// Request timeout for group documents.
    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

    /// Constructs a new `HTTPClient` with the given base URL.
    ///
    /// # Arguments
    /// * `base_url` – The root URL for all relative requests (e.g. `"http://localhost:3000"`).
    ///
    /// # Returns
    /// A configured `HTTPClient`, or a `FetchError` if the TLS/HTTP backend cannot be built.
    pub(crate) fn new(base_url: &str) -> Result<HTTPClient, FetchError> {
        Ok(HTTPClient {
            client: reqwest::Client::builder().timeout(Self::TIMEOUT).build()?,
            base_url: String::from(base_url.trim_end_matches('/')),
        })
    }

    /// Returns the base URL that the client was initialized with.
    pub(crate) fn url(&self) -> &str { self.base_url.as_str() }

    /// Resolves an endpoint against the base URL.
    pub(crate) fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            let rel = endpoint.trim_start_matches("./").trim_start_matches('/');
            format!("{}/{rel}", self.base_url)
        }
    }

    /// Sends `request` and decodes its JSON response body.
    pub(crate) async fn send_request<R>(&self, request: &R) -> Result<R::Response, FetchError>
    where R: HTTPRequestType {
        let url = self.resolve(request.endpoint());
        let builder = match request.request_method() {
            HTTPRequestMethod::Get => self.client.get(url),
        };
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.json::<R::Response>().await?)
    }
}
