// src/engine/mod.rs

//! Fetch engines.
//!
//! A fetch engine retrieves page content and locates elements in it. The set
//! of backends is closed ([`Engine`]); [`EngineFactory`] builds them by
//! [`EngineKind`] so the selector can probe candidates in configured order.

pub mod http;
pub mod render;
pub mod select;

#[cfg(feature = "browser")]
pub mod browser;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Config, Outcome};
use crate::services::request::RequestProfile;
use crate::services::robots::RobotsPolicy;
use crate::services::selectors;

pub use http::HttpEngine;
pub use render::{RenderEngine, RenderMode, Renderer};
pub use select::{ProbeResult, probe, select_for_phase};

#[cfg(feature = "browser")]
pub use browser::{BrowserEngine, ChromeRenderer};

/// Fetch backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Plain HTTP requests
    #[serde(alias = "requests")]
    #[cfg_attr(feature = "cli", value(alias = "requests"))]
    Http,
    /// Headless Chromium, no fallback
    Headless,
    /// Headless Chromium that retries in a visible window
    #[serde(alias = "playwright", alias = "selenium")]
    #[cfg_attr(feature = "cli", value(alias = "playwright"))]
    Browser,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Http => "http",
            Self::Headless => "headless",
            Self::Browser => "browser",
        };
        f.write_str(name)
    }
}

/// Fetch and locate capability shared by every backend.
#[async_trait]
pub trait FetchEngine: Send {
    fn kind(&self) -> EngineKind;

    /// Retrieve `url`. Transport errors and non-200 responses are `Failure`.
    async fn fetch(&mut self, url: &str) -> Outcome<String>;

    /// Outer markup of the elements matching `selector`, in document order.
    fn locate(&self, content: &str, selector: &str) -> Outcome<Vec<String>> {
        selectors::locate(content, selector)
    }

    /// Click a "load more" control on a live page until it disappears or the
    /// click budget is spent, then return the accumulated content.
    ///
    /// `None` means the engine has no live page handle.
    async fn load_more(
        &mut self,
        _url: &str,
        _button_selector: &str,
        _max_clicks: usize,
    ) -> Option<Outcome<String>> {
        None
    }

    /// Switch the post-fetch politeness delay on or off.
    fn set_paced(&mut self, _paced: bool) {}

    /// Release live resources (browser sessions).
    async fn teardown(&mut self) {}
}

/// Closed set of fetch backends.
pub enum Engine {
    Http(HttpEngine),
    #[cfg(feature = "browser")]
    Browser(BrowserEngine),
}

#[async_trait]
impl FetchEngine for Engine {
    fn kind(&self) -> EngineKind {
        match self {
            Self::Http(engine) => engine.kind(),
            #[cfg(feature = "browser")]
            Self::Browser(engine) => engine.kind(),
        }
    }

    async fn fetch(&mut self, url: &str) -> Outcome<String> {
        match self {
            Self::Http(engine) => engine.fetch(url).await,
            #[cfg(feature = "browser")]
            Self::Browser(engine) => engine.fetch(url).await,
        }
    }

    async fn load_more(
        &mut self,
        url: &str,
        button_selector: &str,
        max_clicks: usize,
    ) -> Option<Outcome<String>> {
        match self {
            Self::Http(engine) => engine.load_more(url, button_selector, max_clicks).await,
            #[cfg(feature = "browser")]
            Self::Browser(engine) => engine.load_more(url, button_selector, max_clicks).await,
        }
    }

    fn set_paced(&mut self, paced: bool) {
        match self {
            Self::Http(engine) => engine.set_paced(paced),
            #[cfg(feature = "browser")]
            Self::Browser(engine) => engine.set_paced(paced),
        }
    }

    async fn teardown(&mut self) {
        match self {
            Self::Http(engine) => engine.teardown().await,
            #[cfg(feature = "browser")]
            Self::Browser(engine) => engine.teardown().await,
        }
    }
}

/// Builds engines by kind.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    type Engine: FetchEngine;

    /// Construct an engine. Failure here means the backend is unavailable.
    async fn build(&self, kind: EngineKind) -> Result<Self::Engine>;

    /// Probe order for automatic selection.
    fn candidates(&self) -> Vec<EngineKind>;
}

/// Factory for the real backends.
pub struct EngineBuilder {
    config: Arc<Config>,
    profile: Arc<dyn RequestProfile>,
}

impl EngineBuilder {
    pub fn new(config: Arc<Config>, profile: Arc<dyn RequestProfile>) -> Self {
        Self { config, profile }
    }
}

#[async_trait]
impl EngineFactory for EngineBuilder {
    type Engine = Engine;

    async fn build(&self, kind: EngineKind) -> Result<Engine> {
        match kind {
            EngineKind::Http => Ok(Engine::Http(HttpEngine::new(
                &self.config.crawler,
                self.profile.clone(),
            )?)),
            #[cfg(feature = "browser")]
            EngineKind::Headless | EngineKind::Browser => Ok(Engine::Browser(
                BrowserEngine::chromium(kind, &self.config, self.profile.clone()),
            )),
            #[cfg(not(feature = "browser"))]
            EngineKind::Headless | EngineKind::Browser => {
                Err(crate::error::AppError::engine_unavailable(
                    kind.to_string(),
                    "built without the `browser` feature",
                ))
            }
        }
    }

    fn candidates(&self) -> Vec<EngineKind> {
        self.config.crawler.engines.clone()
    }
}

/// Engine wrapper that consults a robots policy before every fetch.
pub struct Guarded<E> {
    inner: E,
    robots: Arc<dyn RobotsPolicy>,
    user_agent: String,
}

impl<E: FetchEngine> Guarded<E> {
    pub fn new(inner: E, robots: Arc<dyn RobotsPolicy>, user_agent: impl Into<String>) -> Self {
        Self {
            inner,
            robots,
            user_agent: user_agent.into(),
        }
    }

}

/// Denial reason when `robots` forbids `url`.
async fn robots_denial(robots: &dyn RobotsPolicy, user_agent: &str, url: &str) -> Option<String> {
    if robots.allows(url, user_agent).await {
        None
    } else {
        log::warn!("Skipping {url}: disallowed by robots.txt");
        Some(format!("{url} disallowed by robots.txt"))
    }
}

#[async_trait]
impl<E: FetchEngine> FetchEngine for Guarded<E> {
    fn kind(&self) -> EngineKind {
        self.inner.kind()
    }

    async fn fetch(&mut self, url: &str) -> Outcome<String> {
        if let Some(reason) = robots_denial(self.robots.as_ref(), &self.user_agent, url).await {
            return Outcome::Failure(reason);
        }
        self.inner.fetch(url).await
    }

    fn locate(&self, content: &str, selector: &str) -> Outcome<Vec<String>> {
        self.inner.locate(content, selector)
    }

    async fn load_more(
        &mut self,
        url: &str,
        button_selector: &str,
        max_clicks: usize,
    ) -> Option<Outcome<String>> {
        if let Some(reason) = robots_denial(self.robots.as_ref(), &self.user_agent, url).await {
            return Some(Outcome::Failure(reason));
        }
        self.inner.load_more(url, button_selector, max_clicks).await
    }

    fn set_paced(&mut self, paced: bool) {
        self.inner.set_paced(paced)
    }

    async fn teardown(&mut self) {
        self.inner.teardown().await
    }
}

/// Factory whose engines are wrapped in [`Guarded`].
pub struct GuardedFactory<F> {
    inner: F,
    robots: Arc<dyn RobotsPolicy>,
    user_agent: String,
}

impl<F: EngineFactory> GuardedFactory<F> {
    pub fn new(inner: F, robots: Arc<dyn RobotsPolicy>, user_agent: impl Into<String>) -> Self {
        Self {
            inner,
            robots,
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl<F: EngineFactory> EngineFactory for GuardedFactory<F> {
    type Engine = Guarded<F::Engine>;

    async fn build(&self, kind: EngineKind) -> Result<Self::Engine> {
        let engine = self.inner.build(kind).await?;
        Ok(Guarded::new(engine, self.robots.clone(), &self.user_agent))
    }

    fn candidates(&self) -> Vec<EngineKind> {
        self.inner.candidates()
    }
}

/// Randomized politeness delay applied after each successful fetch.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    min_secs: f64,
    max_secs: f64,
}

impl Pacing {
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        Self {
            min_secs: min_secs.max(0.0),
            max_secs: max_secs.max(min_secs.max(0.0)),
        }
    }

    pub fn none() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Sample a delay uniformly from the configured range.
    pub fn sample(&self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            rand::rng().random_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        Duration::from_secs_f64(secs)
    }

    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted engines for selector, pagination and orchestrator tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::AppError;

    /// Engine that serves canned pages and records every fetch.
    #[derive(Clone)]
    pub struct ScriptedEngine {
        kind: EngineKind,
        pages: HashMap<String, Outcome<String>>,
        load_more_page: Option<String>,
        paced: bool,
        fetched: Arc<Mutex<Vec<String>>>,
        unpaced: Arc<AtomicUsize>,
        teardowns: Arc<AtomicUsize>,
    }

    impl ScriptedEngine {
        pub fn new(kind: EngineKind) -> Self {
            Self {
                kind,
                pages: HashMap::new(),
                load_more_page: None,
                paced: true,
                fetched: Arc::default(),
                unpaced: Arc::default(),
                teardowns: Arc::default(),
            }
        }

        pub fn page(mut self, url: &str, content: impl Into<String>) -> Self {
            self.pages
                .insert(url.to_string(), Outcome::Success(content.into()));
            self
        }

        /// Serve `content` as a fallback-path success.
        pub fn degraded_page(mut self, url: &str, content: impl Into<String>) -> Self {
            self.pages.insert(
                url.to_string(),
                Outcome::degraded(content.into(), "rendered in a visible window"),
            );
            self
        }

        /// Content returned by `load_more`; without it the engine has no live page.
        pub fn with_load_more(mut self, content: impl Into<String>) -> Self {
            self.load_more_page = Some(content.into());
            self
        }

        pub fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }

        pub fn teardowns(&self) -> usize {
            self.teardowns.load(Ordering::SeqCst)
        }

        /// Fetches made with the politeness delay switched off.
        pub fn unpaced_fetches(&self) -> usize {
            self.unpaced.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FetchEngine for ScriptedEngine {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        async fn fetch(&mut self, url: &str) -> Outcome<String> {
            self.fetched.lock().unwrap().push(url.to_string());
            if !self.paced {
                self.unpaced.fetch_add(1, Ordering::SeqCst);
            }
            self.pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| Outcome::failure("HTTP 404"))
        }

        async fn load_more(
            &mut self,
            url: &str,
            _button_selector: &str,
            _max_clicks: usize,
        ) -> Option<Outcome<String>> {
            let content = self.load_more_page.clone()?;
            self.fetched.lock().unwrap().push(url.to_string());
            Some(Outcome::Success(content))
        }

        fn set_paced(&mut self, paced: bool) {
            self.paced = paced;
        }

        async fn teardown(&mut self) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Factory over a fixed list of scripted engines; missing kinds are unavailable.
    pub struct ScriptedFactory {
        engines: Vec<ScriptedEngine>,
    }

    impl ScriptedFactory {
        pub fn new(engines: Vec<ScriptedEngine>) -> Self {
            Self { engines }
        }
    }

    #[async_trait]
    impl EngineFactory for ScriptedFactory {
        type Engine = ScriptedEngine;

        async fn build(&self, kind: EngineKind) -> Result<ScriptedEngine> {
            self.engines
                .iter()
                .find(|e| e.kind == kind)
                .cloned()
                .ok_or_else(|| AppError::engine_unavailable(kind.to_string(), "not scripted"))
        }

        fn candidates(&self) -> Vec<EngineKind> {
            vec![EngineKind::Http, EngineKind::Headless, EngineKind::Browser]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedEngine;
    use super::*;
    use crate::error::AppError;
    use crate::services::robots::AllowAll;

    struct DenyAll;

    #[async_trait]
    impl RobotsPolicy for DenyAll {
        async fn allows(&self, _url: &str, _user_agent: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_engine_kind_names() {
        let kinds: Vec<EngineKind> =
            serde_json::from_str(r#"["http", "requests", "headless", "playwright"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![
                EngineKind::Http,
                EngineKind::Http,
                EngineKind::Headless,
                EngineKind::Browser
            ]
        );
        assert_eq!(EngineKind::Browser.to_string(), "browser");
    }

    #[test]
    fn test_pacing_stays_in_range() {
        let pacing = Pacing::new(0.5, 1.0);
        for _ in 0..50 {
            let delay = pacing.sample().as_secs_f64();
            assert!((0.5..=1.0).contains(&delay));
        }
        assert!(Pacing::none().sample().is_zero());
        assert_eq!(Pacing::new(2.0, 1.0).sample(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_guarded_blocks_disallowed_fetch() {
        let inner = ScriptedEngine::new(EngineKind::Http).page("https://x.test/a", "<p>a</p>");
        let seen = inner.clone();
        let mut guarded = Guarded::new(inner, Arc::new(DenyAll), "bot");

        assert!(guarded.fetch("https://x.test/a").await.is_failure());
        assert!(seen.fetched().is_empty());

        let mut open = Guarded::new(seen.clone(), Arc::new(AllowAll), "bot");
        assert!(open.fetch("https://x.test/a").await.is_success());
        assert_eq!(seen.fetched(), vec!["https://x.test/a"]);
    }

    #[tokio::test]
    async fn test_guarded_engine_runs_on_spawned_task() {
        let inner = ScriptedEngine::new(EngineKind::Http).page("https://x.test/a", "<p>a</p>");
        let mut guarded = Guarded::new(inner, Arc::new(AllowAll), "bot");

        let task = tokio::spawn(async move {
            let fetched = guarded.fetch("https://x.test/a").await;
            let expanded = guarded.load_more("https://x.test/a", "button", 1).await;
            (fetched, expanded)
        });
        let (fetched, expanded) = task.await.unwrap();
        assert!(fetched.is_success());
        assert!(expanded.is_none());
    }

    #[tokio::test]
    async fn test_guarded_forwards_pacing_switch() {
        let inner = ScriptedEngine::new(EngineKind::Http).page("https://x.test/a", "<p>a</p>");
        let handle = inner.clone();
        let mut guarded = Guarded::new(inner, Arc::new(AllowAll), "bot");

        guarded.set_paced(false);
        guarded.fetch("https://x.test/a").await;
        guarded.set_paced(true);
        guarded.fetch("https://x.test/a").await;
        assert_eq!(handle.unpaced_fetches(), 1);
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_browser_unavailable_without_feature() {
        let builder = EngineBuilder::new(
            Arc::new(Config::default()),
            Arc::new(crate::services::request::StaticProfile),
        );
        let err = builder.build(EngineKind::Browser).await.err().unwrap();
        assert!(matches!(err, AppError::EngineUnavailable { .. }));
        assert!(builder.build(EngineKind::Http).await.is_ok());
    }
}
