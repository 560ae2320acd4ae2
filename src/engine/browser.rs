// src/engine/browser.rs

//! Chromium renderer.
//!
//! Navigation runs on the browser's own event loop; every call into it is
//! awaited under the crawler timeout before control returns to the caller.
//! A page counts as rendered once its main document reports `networkIdle`.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::page::Page;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::engine::{EngineKind, Pacing, RenderEngine, RenderMode, Renderer};
use crate::models::{BrowserConfig, Config};
use crate::services::request::RequestProfile;

/// Returns `true` after clicking a visible match for the selector.
const CLICK_SCRIPT: &str = r#"(() => {
    const btn = document.querySelector(__SELECTOR__);
    if (btn !== null && btn.offsetParent !== null) {
        btn.click();
        return true;
    }
    return false;
})()"#;

/// Chromium-backed fetch engine.
pub type BrowserEngine = RenderEngine<ChromeRenderer>;

impl RenderEngine<ChromeRenderer> {
    /// The session is launched lazily on the first fetch.
    pub fn chromium(kind: EngineKind, config: &Config, profile: Arc<dyn RequestProfile>) -> Self {
        let (min, max) = config.crawler.delay_range();
        RenderEngine::new(
            kind,
            ChromeRenderer::new(config, profile),
            Pacing::new(min, max),
        )
    }
}

struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    mode: RenderMode,
}

impl BrowserSession {
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            log::debug!("Browser close failed: {e}");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// Tracks lifecycle events of one navigation until its document is idle.
///
/// The first `init` after navigation starts belongs to the main document;
/// frames loaded later report their own loaders and are ignored.
#[derive(Debug, Default)]
struct IdleWatch {
    loader: Option<String>,
}

impl IdleWatch {
    /// Feed one event; `true` once the main document reports `networkIdle`.
    fn observe(&mut self, name: &str, loader: &str) -> bool {
        match name {
            "init" if self.loader.is_none() => {
                self.loader = Some(loader.to_string());
                false
            }
            "networkIdle" => self.loader.as_deref() == Some(loader),
            _ => false,
        }
    }
}

async fn network_idle<S>(events: &mut S)
where
    S: Stream<Item = Arc<EventLifecycleEvent>> + Unpin,
{
    let mut watch = IdleWatch::default();
    while let Some(event) = events.next().await {
        if watch.observe(&event.name, event.loader_id.as_ref()) {
            return;
        }
    }
}

/// Chromium session manager holding at most one live session.
pub struct ChromeRenderer {
    settings: BrowserConfig,
    timeout: Duration,
    profile: Arc<dyn RequestProfile>,
    session: Option<BrowserSession>,
}

impl ChromeRenderer {
    pub fn new(config: &Config, profile: Arc<dyn RequestProfile>) -> Self {
        Self {
            settings: config.browser.clone(),
            timeout: config.crawler.timeout(),
            profile,
            session: None,
        }
    }

    /// Live page in `mode`, replacing a session in the other mode.
    async fn page_for(&mut self, mode: RenderMode) -> Result<Page, String> {
        if self.session.as_ref().is_some_and(|s| s.mode != mode) {
            self.close().await;
        }
        if self.session.is_none() {
            let session =
                launch(&self.settings, self.timeout, self.profile.as_ref(), mode).await?;
            self.session = Some(session);
        }
        self.current_page()
    }

    fn current_page(&self) -> Result<Page, String> {
        self.session
            .as_ref()
            .map(|s| s.page.clone())
            .ok_or_else(|| "no browser session".to_string())
    }
}

async fn launch(
    settings: &BrowserConfig,
    timeout: Duration,
    profile: &dyn RequestProfile,
    mode: RenderMode,
) -> Result<BrowserSession, String> {
    let mut builder = ChromeConfig::builder().request_timeout(timeout);
    if mode == RenderMode::Visible {
        builder = builder.with_head();
    }
    if settings.no_sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(path) = &settings.executable {
        builder = builder.chrome_executable(path);
    }
    if let Some(proxy) = profile.proxy() {
        builder = builder.arg(format!("--proxy-server={proxy}"));
    }
    let config = builder.build()?;

    let (browser, mut events) = Browser::launch(config)
        .await
        .map_err(|e| format!("launch failed: {e}"))?;
    let handler = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    let page = match browser.new_page("about:blank").await {
        Ok(page) => page,
        Err(e) => {
            handler.abort();
            return Err(format!("new page failed: {e}"));
        }
    };

    log::debug!("Launched {mode:?} browser session");
    Ok(BrowserSession {
        browser,
        page,
        handler,
        mode,
    })
}

async fn apply_headers(page: &Page, headers: Vec<(String, String)>) {
    if headers.is_empty() {
        return;
    }
    let map: serde_json::Map<String, serde_json::Value> = headers
        .into_iter()
        .map(|(name, value)| (name, serde_json::Value::String(value)))
        .collect();
    let params = SetExtraHttpHeadersParams::new(Headers::new(serde_json::Value::Object(map)));
    if let Err(e) = page.execute(params).await {
        log::debug!("Setting extra headers failed: {e}");
    }
}

/// Navigate and wait for the main document's network to go idle.
async fn navigate(page: &Page, url: &str) -> Result<String, String> {
    page.execute(SetLifecycleEventsEnabledParams::new(true))
        .await
        .map_err(|e| e.to_string())?;
    let lifecycle = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(|e| e.to_string())?;
    let mut lifecycle = pin!(lifecycle);

    page.goto(url).await.map_err(|e| e.to_string())?;
    network_idle(&mut lifecycle).await;
    page.content().await.map_err(|e| e.to_string())
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&mut self, mode: RenderMode, url: &str) -> Result<String, String> {
        let page = self.page_for(mode).await?;
        apply_headers(&page, self.profile.headers()).await;

        match tokio::time::timeout(self.timeout, navigate(&page, url)).await {
            Ok(result) => result,
            Err(_) => Err(format!("timed out after {}s", self.timeout.as_secs())),
        }
    }

    async fn click_more(&mut self, button_selector: &str, max_clicks: usize) -> Result<usize, String> {
        let page = self.current_page()?;
        let quoted = serde_json::to_string(button_selector).map_err(|e| e.to_string())?;
        let script = CLICK_SCRIPT.replace("__SELECTOR__", &quoted);

        let mut clicks = 0;
        while clicks < max_clicks {
            let clicked = page
                .evaluate(script.as_str())
                .await
                .map_err(|e| e.to_string())?
                .into_value::<bool>()
                .map_err(|e| e.to_string())?;
            if !clicked {
                log::info!("Load-more control gone after {clicks} clicks");
                break;
            }
            clicks += 1;
            tokio::time::sleep(self.settings.settle()).await;
        }
        Ok(clicks)
    }

    async fn content(&mut self) -> Result<String, String> {
        let page = self.current_page()?;
        page.content().await.map_err(|e| e.to_string())
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
            log::debug!("Browser session closed");
        }
    }
}
