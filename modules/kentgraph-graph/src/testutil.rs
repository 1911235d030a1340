//! Test utilities for spinning up a real Dgraph instance via testcontainers.

use std::time::Duration;

use dgraph_client::DgraphClient;
use testcontainers::{core::ContainerPort, runners::AsyncRunner, ContainerAsync, GenericImage};

use crate::GraphClient;

/// Spin up a standalone Dgraph (zero + alpha) and return the container handle + a
/// GraphClient with the schema applied. Readiness is decided by polling `/health`
/// rather than by log output.
///
/// The container is dropped (and stopped) when `ContainerAsync` goes out of scope,
/// so callers must hold it alive for the duration of the test.
pub async fn dgraph_container() -> (ContainerAsync<GenericImage>, GraphClient) {
    let image =
        GenericImage::new("dgraph/standalone", "v24.0.5").with_exposed_port(ContainerPort::Tcp(8080));

    let container: ContainerAsync<GenericImage> = image
        .start()
        .await
        .expect("Failed to start Dgraph container");

    let host_port = container
        .get_host_port_ipv4(8080)
        .await
        .expect("Failed to get Dgraph host port");

    let url = format!("http://127.0.0.1:{host_port}");
    let dgraph = DgraphClient::new(&url, Duration::from_secs(30)).expect("Failed to build client");
    let client = GraphClient::from_client(dgraph);

    client
        .wait_until_ready(60, Duration::from_millis(500))
        .await
        .expect("Dgraph never became healthy");
    crate::migrate::migrate(&client)
        .await
        .expect("Failed to apply schema");

    (container, client)
}
