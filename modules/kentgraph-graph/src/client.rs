use std::time::Duration;

use dgraph_client::{DgraphClient, DgraphError};
use kentgraph_common::Config;
use tracing::{info, warn};

/// Thin wrapper around the Dgraph HTTP client providing connection setup.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) dgraph: DgraphClient,
}

impl GraphClient {
    /// Build a client for the configured alpha and check that it answers.
    pub async fn connect(config: &Config) -> Result<Self, DgraphError> {
        let dgraph = DgraphClient::new(&config.dgraph_url, config.dgraph_timeout())?
            .with_access_token(config.dgraph_access_token.clone())
            .with_api_key(config.dgraph_api_key.clone());

        dgraph.health().await?;
        info!(url = dgraph.base_url(), "Connected to Dgraph");
        Ok(Self { dgraph })
    }

    /// Wrap an already-built client without probing it.
    pub fn from_client(dgraph: DgraphClient) -> Self {
        Self { dgraph }
    }

    /// Poll `/health` until the alpha answers. Used when the server may still be starting.
    pub async fn wait_until_ready(&self, attempts: u32, delay: Duration) -> Result<(), DgraphError> {
        let mut attempt = 1;
        loop {
            match self.dgraph.health().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "Dgraph not ready yet");
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get a reference to the underlying Dgraph client.
    pub fn inner(&self) -> &DgraphClient {
        &self.dgraph
    }
}
