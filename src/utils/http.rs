// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client, optionally routed through a proxy.
pub fn create_client(config: &CrawlerConfig, proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs));

    if let Some(endpoint) = proxy {
        let endpoint = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{endpoint}")
        };
        builder = builder.proxy(reqwest::Proxy::all(endpoint)?);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_with_bare_proxy() {
        let config = CrawlerConfig::default();
        assert!(create_client(&config, None).is_ok());
        assert!(create_client(&config, Some("127.0.0.1:8080")).is_ok());
    }
}
