use crate::config::PlotConfig;
use crate::http_handler::http_client::HTTPClient;
use crate::http_handler::{FetchError, FileGroupSource, GroupSource, HttpGroupSource};
use crate::info;
use crate::propagation::Sgp4Propagator;
use std::sync::Arc;

/// Shared handles of the viewer, passed down explicitly instead of living in globals.
#[derive(Clone)]
pub struct Keychain {
    /// Configuration the viewer was started with.
    config: Arc<PlotConfig>,
    /// HTTP client, absent when groups are read from a local directory.
    client: Option<Arc<HTTPClient>>,
    /// Provider of group index and definitions.
    source: Arc<dyn GroupSource>,
    /// Propagator shared by every worker.
    propagator: Arc<Sgp4Propagator>,
}

impl Keychain {
    /// Builds the keychain for `config`.
    ///
    /// # Arguments
    /// - `config`: The runtime configuration.
    ///
    /// # Returns
    /// The keychain, or a `FetchError` if the HTTP client cannot be built.
    pub fn new(config: PlotConfig) -> Result<Self, FetchError> {
        let (client, source): (Option<Arc<HTTPClient>>, Arc<dyn GroupSource>) = match &config.group_dir {
            Some(dir) => {
                info!("Reading groups from {}", dir.display());
                (None, Arc::new(FileGroupSource::new(dir.clone(), &config.index_path)))
            }
            None => {
                let client = Arc::new(HTTPClient::new(&config.base_url)?);
                info!("Fetching groups from {}", client.url());
                (Some(Arc::clone(&client)), Arc::new(HttpGroupSource::new(client, &config.index_path)))
            }
        };
        Ok(Self { config: Arc::new(config), client, source, propagator: Arc::new(Sgp4Propagator) })
    }

    /// Provides a cloned reference to the configuration.
    pub fn config(&self) -> Arc<PlotConfig> { Arc::clone(&self.config) }

    /// Provides a cloned reference to the HTTP client, if groups are fetched over HTTP.
    pub(crate) fn client(&self) -> Option<Arc<HTTPClient>> { self.client.clone() }

    /// Provides a cloned reference to the group source.
    pub fn source(&self) -> Arc<dyn GroupSource> { Arc::clone(&self.source) }

    /// Provides a cloned reference to the propagator.
    pub fn propagator(&self) -> Arc<Sgp4Propagator> { Arc::clone(&self.propagator) }
}
