// src/engine/http.rs

//! Plain HTTP fetch engine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::engine::{EngineKind, FetchEngine, Pacing};
use crate::error::Result;
use crate::models::{CrawlerConfig, Outcome};
use crate::services::request::RequestProfile;
use crate::utils::http::create_client;

/// Proxies tried per fetch before giving up.
const PROXY_ATTEMPTS: usize = 3;

/// One request per fetch (one per proxy when proxying); anything but
/// `200 OK` is a failure.
pub struct HttpEngine {
    config: CrawlerConfig,
    client: Client,
    /// Clients keyed by proxy endpoint, built on first use
    proxied: HashMap<String, Client>,
    profile: Arc<dyn RequestProfile>,
    pacing: Pacing,
    paced: bool,
}

impl HttpEngine {
    pub fn new(config: &CrawlerConfig, profile: Arc<dyn RequestProfile>) -> Result<Self> {
        let (min, max) = config.delay_range();
        Ok(Self {
            config: config.clone(),
            client: create_client(config, None)?,
            proxied: HashMap::new(),
            profile,
            pacing: Pacing::new(min, max),
            paced: true,
        })
    }

    fn client_for(&mut self, proxy: Option<String>) -> Result<&Client> {
        let Some(endpoint) = proxy else {
            return Ok(&self.client);
        };
        if !self.proxied.contains_key(&endpoint) {
            let client = create_client(&self.config, Some(&endpoint))?;
            self.proxied.insert(endpoint.clone(), client);
        }
        Ok(&self.proxied[&endpoint])
    }

    /// Direct request, or up to [`PROXY_ATTEMPTS`] proxies in rotation order.
    async fn get(&mut self, url: &str) -> std::result::Result<String, String> {
        let headers = self.profile.headers();
        let Some(mut endpoint) = self.profile.proxy() else {
            return self.send(None, url, &headers).await;
        };

        let mut attempt = 1;
        loop {
            match self.send(Some(endpoint.clone()), url, &headers).await {
                Ok(body) => return Ok(body),
                Err(reason) if attempt < PROXY_ATTEMPTS => {
                    log::warn!("Attempt {attempt}: proxy {endpoint} failed for {url}: {reason}");
                }
                Err(reason) => return Err(format!("{reason} (after {attempt} proxies)")),
            }
            attempt += 1;
            match self.profile.proxy() {
                Some(next) => endpoint = next,
                None => return Err("proxy pool exhausted".into()),
            }
        }
    }

    async fn send(
        &mut self,
        proxy: Option<String>,
        url: &str,
        headers: &[(String, String)],
    ) -> std::result::Result<String, String> {
        let client = self.client_for(proxy).map_err(|e| e.to_string())?;

        let mut request = client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl FetchEngine for HttpEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Http
    }

    async fn fetch(&mut self, url: &str) -> Outcome<String> {
        match self.get(url).await {
            Ok(body) => {
                log::debug!("Fetched {url} ({} bytes)", body.len());
                if self.paced {
                    self.pacing.pause().await;
                }
                Outcome::Success(body)
            }
            Err(reason) => {
                log::warn!("Fetch failed for {url}: {reason}");
                Outcome::Failure(reason)
            }
        }
    }

    fn set_paced(&mut self, paced: bool) {
        self.paced = paced;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::services::request::StaticProfile;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEAD_PROXY: &str = "127.0.0.1:1";

    struct FixedHeaders;

    impl RequestProfile for FixedHeaders {
        fn headers(&self) -> Vec<(String, String)> {
            vec![("X-Corpus".into(), "1".into())]
        }

        fn proxy(&self) -> Option<String> {
            None
        }
    }

    /// Hands out proxies in order, repeating the last one.
    struct ProxyList {
        endpoints: Vec<String>,
        handed_out: AtomicUsize,
    }

    impl ProxyList {
        fn new(endpoints: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
                handed_out: AtomicUsize::new(0),
            })
        }

        fn handed_out(&self) -> usize {
            self.handed_out.load(Ordering::SeqCst)
        }
    }

    impl RequestProfile for ProxyList {
        fn headers(&self) -> Vec<(String, String)> {
            Vec::new()
        }

        fn proxy(&self) -> Option<String> {
            let index = self.handed_out.fetch_add(1, Ordering::SeqCst);
            self.endpoints
                .get(index.min(self.endpoints.len() - 1))
                .cloned()
        }
    }

    fn engine(profile: Arc<dyn RequestProfile>) -> HttpEngine {
        let mut engine = HttpEngine::new(&CrawlerConfig::default(), profile).unwrap();
        engine.set_paced(false);
        engine
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let mut engine = engine(Arc::new(StaticProfile));
        let outcome = engine.fetch(&format!("{}/news", server.uri())).await;
        assert_eq!(outcome, Outcome::Success("<html>ok</html>".to_string()));
    }

    #[tokio::test]
    async fn test_non_200_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut engine = engine(Arc::new(StaticProfile));
        let gone = engine.fetch(&format!("{}/gone", server.uri())).await;
        assert_eq!(gone, Outcome::Failure("HTTP 404".to_string()));
        assert!(engine.fetch(&format!("{}/empty", server.uri())).await.is_failure());
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure() {
        let mut engine = engine(Arc::new(StaticProfile));
        assert!(engine.fetch("http://127.0.0.1:1/x").await.is_failure());
    }

    #[tokio::test]
    async fn test_profile_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/h"))
            .and(header("X-Corpus", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("with header"))
            .mount(&server)
            .await;

        let mut engine = engine(Arc::new(FixedHeaders));
        let outcome = engine.fetch(&format!("{}/h", server.uri())).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_dead_proxy_fails_over_to_next() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
            .mount(&server)
            .await;
        let live = server.address().to_string();
        let proxies = ProxyList::new(&[DEAD_PROXY, &live]);

        let mut engine = engine(proxies.clone());
        let outcome = engine.fetch("http://x.test/news").await;
        assert_eq!(outcome, Outcome::Success("via proxy".to_string()));
        assert_eq!(proxies.handed_out(), 2);
    }

    #[tokio::test]
    async fn test_proxy_attempts_are_bounded() {
        let proxies = ProxyList::new(&[DEAD_PROXY]);

        let mut engine = engine(proxies.clone());
        let outcome = engine.fetch("http://x.test/news").await;
        assert!(outcome.is_failure());
        assert_eq!(proxies.handed_out(), PROXY_ATTEMPTS);
    }

    #[test]
    fn test_legacy_delay_is_used() {
        let mut config = CrawlerConfig::default();
        config.delay_secs = Some(0.5);
        let engine = HttpEngine::new(&config, Arc::new(StaticProfile)).unwrap();
        assert_eq!(engine.pacing.sample().as_secs_f64(), 0.5);
    }
}
