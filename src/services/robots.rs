// src/services/robots.rs

//! robots.txt policy.
//!
//! Decisions are cached per origin for the lifetime of a run. Any problem
//! fetching or reading a robots file allows the request.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;

use crate::utils::source_url;

/// Answers whether a URL may be fetched.
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    async fn allows(&self, url: &str, user_agent: &str) -> bool;
}

/// Policy used when robots checks are disabled.
pub struct AllowAll;

#[async_trait]
impl RobotsPolicy for AllowAll {
    async fn allows(&self, _url: &str, _user_agent: &str) -> bool {
        true
    }
}

/// Rules for one `User-agent` group.
#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    allow: Vec<String>,
    disallow: Vec<String>,
    crawl_delay: Option<f64>,
}

impl Group {
    fn matches(&self, agent: &str) -> bool {
        self.agents
            .iter()
            .any(|a| a != "*" && agent.contains(a.as_str()))
    }

    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|a| a == "*")
    }

    fn permits(&self, path: &str) -> bool {
        if self.allow.iter().any(|prefix| path.starts_with(prefix)) {
            return true;
        }
        !self.disallow.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// Parsed robots.txt.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    groups: Vec<Group>,
}

impl RobotsTxt {
    /// Parse robots.txt content. Unknown directives are ignored.
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current = Group::default();
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match directive.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // consecutive User-agent lines share one group
                    if in_rules {
                        robots.groups.push(std::mem::take(&mut current));
                        in_rules = false;
                    }
                    current.agents.push(value.to_lowercase());
                }
                "allow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current.allow.push(value.to_string());
                    }
                }
                "disallow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current.disallow.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    in_rules = true;
                    current.crawl_delay = value.parse().ok();
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            robots.groups.push(current);
        }

        robots
    }

    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let agent = user_agent.to_lowercase();
        self.groups
            .iter()
            .find(|g| g.matches(&agent))
            .or_else(|| self.groups.iter().find(|g| g.is_wildcard()))
    }

    /// Whether `path` may be fetched by `user_agent`.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        self.group_for(user_agent)
            .map(|g| g.permits(path))
            .unwrap_or(true)
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.group_for(user_agent)
            .and_then(|g| g.crawl_delay)
            .map(Duration::from_secs_f64)
    }
}

/// Fetching robots policy with a per-origin cache.
pub struct RobotsGuard {
    client: Client,
    cache: Mutex<HashMap<String, RobotsTxt>>,
}

impl RobotsGuard {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn fetch(&self, origin: &str) -> RobotsTxt {
        let robots_url = format!("{origin}/robots.txt");
        let response = match self.client.get(&robots_url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("robots.txt unreachable at {robots_url}: {e}; allowing");
                return RobotsTxt::default();
            }
        };
        if !response.status().is_success() {
            log::debug!("No robots.txt at {robots_url} ({})", response.status());
            return RobotsTxt::default();
        }
        match response.text().await {
            Ok(body) => RobotsTxt::parse(&body),
            Err(e) => {
                log::warn!("robots.txt unreadable at {robots_url}: {e}; allowing");
                RobotsTxt::default()
            }
        }
    }
}

#[async_trait]
impl RobotsPolicy for RobotsGuard {
    async fn allows(&self, url: &str, user_agent: &str) -> bool {
        let (Ok(parsed), Some(origin)) = (Url::parse(url), source_url(url)) else {
            log::warn!("Cannot check robots.txt for '{url}'; allowing");
            return true;
        };
        let path = match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_string(),
        };

        let mut cache = self.cache.lock().await;
        if !cache.contains_key(&origin) {
            let robots = self.fetch(&origin).await;
            if let Some(delay) = robots.crawl_delay(user_agent) {
                log::info!("{origin} asks for a crawl delay of {}s", delay.as_secs_f64());
            }
            cache.insert(origin.clone(), robots);
        }
        cache
            .get(&origin)
            .map(|robots| robots.is_allowed(user_agent, &path))
            .unwrap_or(true)
    }
}
