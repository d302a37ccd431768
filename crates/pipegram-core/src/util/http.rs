use reqwest::Client;
use std::time::Duration;

/// Default user agent for outbound calls that do not need to look like a browser.
pub const USER_AGENT: &str = concat!("pipegram/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with connection pooling, keep-alive and a hard request timeout.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5).min(timeout))
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(user_agent)
        .build()
}
