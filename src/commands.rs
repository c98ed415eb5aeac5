//! Command implementations shared by the binary and the integration tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use element_locator::{
    DefaultElementResolver, ElementResolver, InteractionDescriptor, LocatorConfig, LocatorStrategy,
    ResolutionResult, ResolvedElement,
};
use overlay_stabilizer::{
    channel_sink, sampler::document_rect, scroll_into_view, Phase, PositionStabilizer,
    PositionUpdate, ScrollOutcome, StabilizationContext,
};
use page_model::{Document, MemoryDocument, PageFixture, TimelineStep};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use waypoint_core_types::{NodeId, Rect, ScrollOffset};

use crate::config::WaypointConfig;
use crate::errors::CliResult;

/// A loaded page: the live document plus the changes scheduled against it.
pub struct Page {
    pub document: Arc<MemoryDocument>,
    pub timeline: Vec<TimelineStep>,
}

impl Page {
    pub fn load(path: &Path) -> CliResult<Self> {
        let fixture = PageFixture::load(path)?;
        Self::from_fixture(fixture)
    }

    pub fn from_fixture(fixture: PageFixture) -> CliResult<Self> {
        let document = Arc::new(fixture.build()?);
        let mut timeline = fixture.timeline;
        timeline.sort_by_key(|step| step.at_ms);
        Ok(Self { document, timeline })
    }

    fn as_document(&self) -> Arc<dyn Document> {
        self.document.clone()
    }

    /// Play the timeline in real time on a background task.
    pub fn replay(&self) -> JoinHandle<()> {
        let document = self.document.clone();
        let steps = self.timeline.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            for step in steps {
                time::sleep_until(started + Duration::from_millis(step.at_ms)).await;
                if let Err(err) = step.apply(&document) {
                    warn!(at_ms = step.at_ms, "timeline step failed: {}", err);
                    continue;
                }
                debug!(at_ms = step.at_ms, selector = %step.target, "timeline step applied");
            }
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    pub node: NodeId,
    pub tag: Option<String>,
    pub strategy: LocatorStrategy,
    pub exact_matches: usize,
    /// Document-relative rectangle at resolution time
    pub rect: Rect,
}

impl ResolveReport {
    fn new(document: &dyn Document, result: &ResolutionResult) -> Self {
        let node = result.element.node();
        Self {
            node,
            tag: document.tag_name(node),
            strategy: result.strategy,
            exact_matches: result.exact_matches,
            rect: document_rect(document, node),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackReport {
    pub target: ResolveReport,
    pub context: StabilizationContext,
    pub phase: Phase,
    pub updates: Vec<PositionUpdate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrollReport {
    pub target: ResolveReport,
    pub outcome: ScrollOutcome,
    pub scroll: ScrollOffset,
}

pub fn resolve(
    page: &Page,
    config: &LocatorConfig,
    descriptor: &InteractionDescriptor,
) -> CliResult<ResolveReport> {
    let resolver = DefaultElementResolver::with_config(page.as_document(), config.clone());
    let result = resolver.resolve_traced(descriptor)?;
    Ok(ResolveReport::new(page.document.as_ref(), &result))
}

/// Resolve the target, then stabilize an overlay on it while the page timeline plays.
///
/// Ctrl-C cancels the run and reports it as abandoned.
pub async fn track(
    page: &Page,
    config: &WaypointConfig,
    descriptor: &InteractionDescriptor,
) -> CliResult<TrackReport> {
    let target = resolve(page, &config.locator, descriptor)?;
    let stabilizer = PositionStabilizer::new(page.as_document(), config.stabilizer.clone())?;

    let replay = page.replay();
    let (sink, mut rx) = channel_sink();
    let handle = stabilizer.track(ResolvedElement::new(target.node), sink);

    let phase = tokio::select! {
        phase = handle.finished() => phase,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling stabilization run");
            handle.cancel();
            Phase::Abandoned
        }
    };
    replay.abort();

    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    Ok(TrackReport {
        target,
        context: handle.context(),
        phase,
        updates,
    })
}

pub async fn scroll(
    page: &Page,
    config: &WaypointConfig,
    descriptor: &InteractionDescriptor,
) -> CliResult<ScrollReport> {
    let target = resolve(page, &config.locator, descriptor)?;
    let document = page.document.as_ref();
    let outcome = scroll_into_view(document, target.node, &config.scroll).await;
    Ok(ScrollReport {
        target,
        outcome,
        scroll: document.scroll_offset(),
    })
}
