use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
});

/// Shared connection pool. Generation calls override the default timeout
/// per request; everything else inherits the 30s cap.
pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
