// src/engine/render.rs

//! Browser-rendered fetching.
//!
//! A [`Renderer`] drives one browser session. [`RenderEngine`] puts the
//! fallback policy on top: the `Browser` kind retries a failed headless
//! render once in a visible window (a failed launch counts as a failed
//! render) and reports that result as degraded. The `Headless` kind never
//! falls back.

use async_trait::async_trait;

use crate::engine::{EngineKind, FetchEngine, Pacing};
use crate::models::Outcome;

/// Window mode of a browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Headless,
    Visible,
}

/// One live browser session.
#[async_trait]
pub trait Renderer: Send {
    /// Navigate to `url` in `mode` and return the DOM once the network has
    /// settled. A session in another mode is replaced.
    async fn render(&mut self, mode: RenderMode, url: &str) -> Result<String, String>;

    /// Click `button_selector` on the current page until it is gone or
    /// `max_clicks` is spent. Returns the number of clicks.
    async fn click_more(&mut self, button_selector: &str, max_clicks: usize)
    -> Result<usize, String>;

    /// Serialize the current page.
    async fn content(&mut self) -> Result<String, String>;

    async fn close(&mut self);
}

/// Fetch engine over a [`Renderer`].
pub struct RenderEngine<R> {
    kind: EngineKind,
    renderer: R,
    mode: RenderMode,
    pacing: Pacing,
    paced: bool,
}

impl<R: Renderer> RenderEngine<R> {
    pub fn new(kind: EngineKind, renderer: R, pacing: Pacing) -> Self {
        Self {
            kind,
            renderer,
            mode: RenderMode::Headless,
            pacing,
            paced: true,
        }
    }

    fn can_fall_back(&self) -> bool {
        self.kind == EngineKind::Browser && self.mode == RenderMode::Headless
    }

    /// Render in the current mode, retrying visibly when allowed.
    ///
    /// After a successful visible retry the engine stays visible; after a
    /// failed one it goes back to headless.
    async fn render(&mut self, url: &str) -> Outcome<String> {
        let reason = match self.renderer.render(self.mode, url).await {
            Ok(content) => return Outcome::Success(content),
            Err(reason) => reason,
        };
        if !self.can_fall_back() {
            log::warn!("Browser fetch failed for {url}: {reason}");
            return Outcome::Failure(reason);
        }

        log::warn!("Headless fetch failed for {url} ({reason}); retrying visibly");
        self.renderer.close().await;
        match self.renderer.render(RenderMode::Visible, url).await {
            Ok(content) => {
                self.mode = RenderMode::Visible;
                Outcome::degraded(
                    content,
                    format!("headless render failed ({reason}); used visible browser"),
                )
            }
            Err(visible_reason) => {
                log::warn!("Visible fetch failed for {url}: {visible_reason}");
                self.renderer.close().await;
                Outcome::failure(format!("headless: {reason}; visible: {visible_reason}"))
            }
        }
    }

    /// Render, then click "load more" until exhausted.
    async fn expand(&mut self, url: &str, button_selector: &str, max_clicks: usize) -> Outcome<String> {
        let rendered = self.render(url).await;
        if rendered.is_failure() {
            return rendered;
        }

        let clicked = match self.renderer.click_more(button_selector, max_clicks).await {
            Ok(clicks) => {
                log::info!("Clicked load-more {clicks} times on {url}");
                self.renderer.content().await
            }
            Err(reason) => Err(reason),
        };
        match clicked {
            Ok(content) => rendered.map(|_| content),
            Err(reason) => {
                log::warn!("Load-more stopped on {url}: {reason}; keeping the first render");
                match rendered.into_value() {
                    Some(content) => Outcome::degraded(content, format!("load-more failed: {reason}")),
                    None => Outcome::failure(reason),
                }
            }
        }
    }

    async fn pace(&mut self, outcome: &Outcome<String>) {
        if self.paced && !outcome.is_failure() {
            self.pacing.pause().await;
        }
    }
}

#[async_trait]
impl<R: Renderer> FetchEngine for RenderEngine<R> {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn fetch(&mut self, url: &str) -> Outcome<String> {
        let outcome = self.render(url).await;
        self.pace(&outcome).await;
        outcome
    }

    async fn load_more(
        &mut self,
        url: &str,
        button_selector: &str,
        max_clicks: usize,
    ) -> Option<Outcome<String>> {
        let outcome = self.expand(url, button_selector, max_clicks).await;
        self.pace(&outcome).await;
        Some(outcome)
    }

    fn set_paced(&mut self, paced: bool) {
        self.paced = paced;
    }

    async fn teardown(&mut self) {
        self.renderer.close().await;
        self.mode = RenderMode::Headless;
    }
}
