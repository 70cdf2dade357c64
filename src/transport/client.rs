use crate::config::HttpConfig;
use reqwest::Client;
use std::time::Duration;

/// Builds the shared HTTP client
///
/// No overall request timeout is set on the client: asset downloads can take
/// much longer than an API call, so `RequestSpec::timeout` sets one per request
/// and downloads are bounded by `RequestSpec::stall_timeout` instead.
///
/// # Example
///
/// ```no_run
/// use favsync::config::HttpConfig;
/// use favsync::transport::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}
