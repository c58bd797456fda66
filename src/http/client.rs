use crate::types::ErrorKind;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Connection settings for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub headers: Vec<(String, String)>,
    /// Idle connections kept per host, sized to the peak worker count.
    pub pool_size: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            headers: Vec::new(),
            pool_size: 10,
        }
    }
}

pub fn create_client(settings: &ClientSettings) -> Result<Client, String> {
    let mut default_headers = HeaderMap::new();
    for (k, v) in &settings.headers {
        let name = HeaderName::try_from(k.as_str())
            .map_err(|e| format!("Invalid header name '{}': {}", k, e))?;
        let value = HeaderValue::from_str(v)
            .map_err(|e| format!("Invalid value for header '{}': {}", k, e))?;
        default_headers.insert(name, value);
    }

    Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.timeout)
        .tcp_nodelay(true)
        .gzip(true)
        .brotli(true)
        .user_agent(format!("stampede/{}", env!("CARGO_PKG_VERSION")))
        .default_headers(default_headers)
        .pool_max_idle_per_host(settings.pool_size.max(1))
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))
}

pub fn classify_error(err: &reqwest::Error) -> ErrorKind {
    let text = err.to_string().to_lowercase();
    if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        if text.contains("dns") || text.contains("resolve") {
            ErrorKind::Dns
        } else if text.contains("refused") {
            ErrorKind::Refused
        } else if text.contains("reset") {
            ErrorKind::Reset
        } else {
            ErrorKind::Connect
        }
    } else if err.is_body() || err.is_decode() {
        ErrorKind::Body
    } else if err.is_request() {
        ErrorKind::Http
    } else if text.contains("tls") || text.contains("certificate") {
        ErrorKind::Tls
    } else {
        ErrorKind::Other
    }
}
