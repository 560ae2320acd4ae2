// src/engine/select.rs

//! Engine selection by probing.
//!
//! A candidate qualifies when it fetches the probe URL and the probe selector
//! matches at least one element there. Archive and detail pages are probed
//! separately and may end up on different engines.

use crate::engine::{EngineFactory, EngineKind, FetchEngine};
use crate::error::{AppError, Result};
use crate::models::Outcome;

/// Outcome of probing one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub ok: bool,
    pub message: String,
    pub element_count: usize,
}

/// Fetch `url` with `engine` and count `selector` matches.
///
/// The politeness delay is off for the probe fetch.
pub async fn probe<E: FetchEngine + ?Sized>(engine: &mut E, url: &str, selector: &str) -> ProbeResult {
    engine.set_paced(false);
    let fetched = engine.fetch(url).await;
    engine.set_paced(true);

    let content = match fetched {
        Outcome::Failure(reason) => {
            return ProbeResult {
                ok: false,
                message: format!("no content: {reason}"),
                element_count: 0,
            };
        }
        outcome => outcome.into_value().unwrap_or_default(),
    };

    let found = engine.locate(&content, selector);
    let element_count = found.value().map_or(0, Vec::len);
    if element_count == 0 {
        return ProbeResult {
            ok: false,
            message: format!("selector '{selector}' matched nothing"),
            element_count,
        };
    }

    ProbeResult {
        ok: true,
        message: format!(
            "fetched {} bytes, matched {element_count} elements",
            content.len()
        ),
        element_count,
    }
}

/// Pick the engine for one phase.
///
/// A forced engine skips probing and must build. Otherwise candidates are built
/// lazily in factory order; unavailable ones are skipped and losing ones are
/// torn down.
pub async fn select_for_phase<F: EngineFactory>(
    factory: &F,
    forced: Option<EngineKind>,
    phase: &str,
    url: &str,
    selector: &str,
) -> Result<F::Engine> {
    if let Some(kind) = forced {
        log::info!("Using forced {kind} engine for {phase}");
        return factory.build(kind).await;
    }

    log::info!("Probing engines for {phase} with {url}");
    for kind in factory.candidates() {
        let mut engine = match factory.build(kind).await {
            Ok(engine) => engine,
            Err(e) => {
                log::warn!("Skipping {kind} engine: {e}");
                continue;
            }
        };
        if try_candidate(&mut engine, url, selector).await {
            log::info!("Selected {kind} engine for {phase}");
            return Ok(engine);
        }
        engine.teardown().await;
    }

    Err(AppError::no_engine(phase))
}

async fn try_candidate<E: FetchEngine>(engine: &mut E, url: &str, selector: &str) -> bool {
    let result = probe(engine, url, selector).await;
    if result.ok {
        log::info!("{} engine passed probe: {}", engine.kind(), result.message);
    } else {
        log::warn!("{} engine failed probe: {}", engine.kind(), result.message);
    }
    result.ok
}
