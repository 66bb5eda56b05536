mod artifacts;
mod core;
mod prow;
mod pulls;

pub use self::core::CiClient;

#[cfg(test)]
pub(crate) fn test_client(server_url: &str) -> CiClient {
    use std::time::Duration;

    use crate::config::{ClientConfig, Endpoints};

    let config = ClientConfig {
        endpoints: Endpoints::new(server_url, server_url, server_url).unwrap(),
        timeout: Duration::from_secs(5),
        retries: 2,
        retry_backoff: Duration::from_millis(1),
    };
    CiClient::new(config).unwrap()
}
