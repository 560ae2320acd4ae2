// src/services/request.rs

//! Per-request headers and proxy selection.
//!
//! Engines pass these values through untouched.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::IndexedRandom;

use crate::models::CrawlerConfig;

/// Supplies headers and an optional proxy endpoint for each request.
pub trait RequestProfile: Send + Sync {
    fn headers(&self) -> Vec<(String, String)>;
    fn proxy(&self) -> Option<String>;
}

/// No extra headers, no proxy.
pub struct StaticProfile;

impl RequestProfile for StaticProfile {
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn proxy(&self) -> Option<String> {
        None
    }
}

/// Desktop browser user agents, cycled in order.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

const ACCEPT: [&str; 2] = [
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
];

const ACCEPT_LANGUAGE: [&str; 3] = ["en-US,en;q=0.9", "en-GB,en;q=0.8", "en-US,en;q=0.5"];

/// Rotating browser-like header sets.
#[derive(Debug, Default)]
pub struct HeaderRotator {
    next: AtomicUsize,
}

impl HeaderRotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_headers(&self) -> Vec<(String, String)> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len();
        let mut rng = rand::rng();
        let accept = ACCEPT.choose(&mut rng).copied().unwrap_or(ACCEPT[0]);
        let language = ACCEPT_LANGUAGE
            .choose(&mut rng)
            .copied()
            .unwrap_or(ACCEPT_LANGUAGE[0]);

        vec![
            ("User-Agent".into(), USER_AGENTS[index].into()),
            ("Accept".into(), accept.into()),
            ("Accept-Language".into(), language.into()),
            ("Upgrade-Insecure-Requests".into(), "1".into()),
            ("DNT".into(), "1".into()),
        ]
    }
}

/// Round-robin over configured proxy endpoints.
#[derive(Debug, Default)]
pub struct ProxyPool {
    endpoints: Vec<String>,
    next: AtomicUsize,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints: endpoints
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            next: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn next_proxy(&self) -> Option<String> {
        if self.endpoints.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Some(self.endpoints[index].clone())
    }
}

/// Profile built from `[crawler]` settings.
pub struct RotatingProfile {
    headers: Option<HeaderRotator>,
    proxies: ProxyPool,
}

impl RotatingProfile {
    pub fn new(config: &CrawlerConfig) -> Self {
        let proxies = ProxyPool::new(config.proxies.clone());
        if !proxies.is_empty() {
            log::info!("Routing requests through {} proxies", proxies.endpoints.len());
        }
        Self {
            headers: config.rotate_headers.then(HeaderRotator::new),
            proxies,
        }
    }
}

impl RequestProfile for RotatingProfile {
    fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .as_ref()
            .map(HeaderRotator::next_headers)
            .unwrap_or_default()
    }

    fn proxy(&self) -> Option<String> {
        self.proxies.next_proxy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_user_agents_cycle() {
        let rotator = HeaderRotator::new();
        let first = rotator.next_headers();
        for _ in 1..USER_AGENTS.len() {
            rotator.next_headers();
        }
        let wrapped = rotator.next_headers();
        assert_eq!(header(&first, "User-Agent"), Some(USER_AGENTS[0]));
        assert_eq!(header(&wrapped, "User-Agent"), Some(USER_AGENTS[0]));
        assert!(header(&first, "Accept-Language").is_some());
    }

    #[test]
    fn test_proxy_round_robin() {
        let pool = ProxyPool::new(vec!["a:1".into(), " ".into(), "b:2".into()]);
        assert_eq!(pool.next_proxy().as_deref(), Some("a:1"));
        assert_eq!(pool.next_proxy().as_deref(), Some("b:2"));
        assert_eq!(pool.next_proxy().as_deref(), Some("a:1"));
        assert!(ProxyPool::new(Vec::new()).next_proxy().is_none());
    }

    #[test]
    fn test_rotation_can_be_disabled() {
        let mut config = CrawlerConfig::default();
        config.rotate_headers = false;
        let profile = RotatingProfile::new(&config);
        assert!(profile.headers().is_empty());
        assert!(profile.proxy().is_none());
    }
}
