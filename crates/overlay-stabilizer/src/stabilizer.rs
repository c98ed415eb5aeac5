//! Position stabilizer: one cancellable polling task per tracked element

use std::sync::Arc;

use element_locator::ResolvedElement;
use page_model::{Document, MutationKind, MutationRecord};
use tokio::{
    sync::broadcast::{
        self,
        error::{RecvError, TryRecvError},
    },
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use waypoint_core_types::{NodeId, RunId};

use crate::{
    config::StabilizerConfig,
    context::{
        classify, ModalDetector, NavPanelDetector, SelectorModalDetector, SelectorNavDetector,
        StabilizationContext,
    },
    errors::StabilizerError,
    handle::{StabilizationHandle, StatusCell},
    sampler,
    sink::UpdateSink,
    state::{Phase, PositionUpdate, StabilizationState, Step},
};

/// Starts stabilization runs against one document.
pub struct PositionStabilizer {
    document: Arc<dyn Document>,
    config: StabilizerConfig,
    modal: Arc<dyn ModalDetector>,
    nav: Arc<dyn NavPanelDetector>,
}

impl PositionStabilizer {
    /// Build a stabilizer with selector-based detectors taken from `config`.
    pub fn new(
        document: Arc<dyn Document>,
        config: StabilizerConfig,
    ) -> Result<Self, StabilizerError> {
        config.validate()?;
        let modal = Arc::new(SelectorModalDetector::new(&config.modal_selectors)?);
        let nav = Arc::new(SelectorNavDetector::new(&config.nav_selectors)?);
        Ok(Self {
            document,
            config,
            modal,
            nav,
        })
    }

    /// Replace the environment probes.
    pub fn with_detectors(
        mut self,
        modal: Arc<dyn ModalDetector>,
        nav: Arc<dyn NavPanelDetector>,
    ) -> Self {
        self.modal = modal;
        self.nav = nav;
        self
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }

    pub fn classify(&self, element: ResolvedElement) -> StabilizationContext {
        classify(
            self.document.as_ref(),
            element.node(),
            self.modal.as_ref(),
            self.nav.as_ref(),
        )
    }

    /// Spawn a run for `element` with an explicit context.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S: UpdateSink>(
        &self,
        element: ResolvedElement,
        context: StabilizationContext,
        sink: S,
    ) -> StabilizationHandle {
        let run_id = RunId::new();
        let token = CancellationToken::new();
        let status = StatusCell::new();
        let state = StabilizationState::new(context, &self.config);
        let timing = state.timing();

        info!(
            run_id = %run_id,
            node = %element.node(),
            context = %context,
            max_attempts = timing.max_attempts,
            interval_ms = timing.check_interval_ms,
            "starting stabilization run"
        );

        let run = Run {
            run_id: run_id.clone(),
            node: element.node(),
            document: self.document.clone(),
            state,
            max_ancestor_hops: self.config.max_ancestor_hops,
            observe_mutations: self.config.observe_mutations,
            sink,
            token: token.clone(),
            status: status.clone(),
        };
        tokio::spawn(run.drive());

        StabilizationHandle::new(run_id, element, context, token, status)
    }

    /// Classify `element` and start a run for it.
    pub fn track<S: UpdateSink>(&self, element: ResolvedElement, sink: S) -> StabilizationHandle {
        let context = self.classify(element);
        self.start(element, context, sink)
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Tick,
    Mutation,
}

impl Trigger {
    fn name(&self) -> &'static str {
        match self {
            Trigger::Tick => "tick",
            Trigger::Mutation => "mutation",
        }
    }
}

enum Wake {
    Cancelled,
    Sample(Trigger),
}

struct Run<S> {
    run_id: RunId,
    node: NodeId,
    document: Arc<dyn Document>,
    state: StabilizationState,
    max_ancestor_hops: u8,
    observe_mutations: bool,
    sink: S,
    token: CancellationToken,
    status: StatusCell,
}

impl<S: UpdateSink> Run<S> {
    async fn drive(mut self) {
        let timing = self.state.timing();
        let token = self.token.clone();
        let document = self.document.clone();

        let delay = timing.initial_delay();
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.abandon();
                    return;
                }
                _ = time::sleep(delay) => {}
            }
        }

        let mut mutations = self
            .observe_mutations
            .then(|| document.subscribe_mutations());

        let seed = sampler::sample(document.as_ref(), self.node);
        debug!(
            run_id = %self.run_id,
            rect = %seed.rect,
            valid = seed.is_valid(),
            "seed measurement"
        );
        let step = self.state.seed(seed);
        self.apply(step);

        let period = timing.check_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                biased;
                _ = token.cancelled() => Wake::Cancelled,
                _ = ticker.tick() => Wake::Sample(Trigger::Tick),
                _ = next_relevant_mutation(&mut mutations, document.as_ref(), self.node) => {
                    Wake::Sample(Trigger::Mutation)
                }
            };
            match wake {
                Wake::Cancelled => {
                    self.abandon();
                    return;
                }
                Wake::Sample(trigger) => {
                    if self.sample_once(trigger) {
                        break;
                    }
                }
            }
        }

        let phase = self.state.phase();
        if phase == Phase::ForcedVisible {
            warn!(
                run_id = %self.run_id,
                attempt = self.state.attempts(),
                "geometry never stabilized, forcing overlay visible"
            );
        } else {
            info!(
                run_id = %self.run_id,
                attempt = self.state.attempts(),
                phase = %phase,
                "stabilization run finished"
            );
        }
    }

    /// Take one sample and act on it. Returns true once the run is over.
    fn sample_once(&mut self, trigger: Trigger) -> bool {
        let sample = sampler::sample(self.document.as_ref(), self.node);
        let step = match trigger {
            Trigger::Tick => self.state.step(sample),
            Trigger::Mutation => self.state.observe(sample),
        };
        debug!(
            run_id = %self.run_id,
            attempt = self.state.attempts(),
            phase = %self.state.phase(),
            trigger = trigger.name(),
            valid = sample.is_valid(),
            stable = self.state.stability_counter(),
            "geometry sample"
        );

        self.apply(step);
        self.status.publish(self.state.phase(), !self.state.is_finished());
        self.state.is_finished()
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Idle => {}
            Step::Emit(update) => self.emit(update),
            Step::Finish(update) => {
                if let Some(update) = update {
                    self.emit(update);
                }
            }
            Step::AncestorFallback => {
                let fallback = sampler::ancestor_fallback(
                    self.document.as_ref(),
                    self.node,
                    self.max_ancestor_hops,
                );
                match fallback {
                    Some((rect, hops)) => {
                        debug!(run_id = %self.run_id, hops, "target unusable, showing ancestor");
                        let update = self.state.fallback_update(rect, hops);
                        self.emit(update);
                    }
                    None => {
                        debug!(run_id = %self.run_id, "target unusable and no visible ancestor")
                    }
                }
            }
        }
    }

    fn emit(&self, update: PositionUpdate) {
        if self.token.is_cancelled() {
            return;
        }
        self.sink.on_update(update);
    }

    fn abandon(&mut self) {
        if self.state.abandon() {
            debug!(run_id = %self.run_id, attempt = self.state.attempts(), "run abandoned");
        }
        self.status.publish(Phase::Abandoned, false);
    }
}

fn is_relevant(document: &dyn Document, node: NodeId, record: &MutationRecord) -> bool {
    match record.kind {
        MutationKind::Attributes { .. } | MutationKind::ChildList => {
            document.is_inclusive_descendant(record.target, node)
                || (record.kind == MutationKind::ChildList && !document.is_connected(node))
        }
        MutationKind::CharacterData => false,
    }
}

/// Resolves on the next mutation touching the target's subtree, after draining whatever
/// else is already queued so one burst of changes yields one sample. Pends forever when
/// observation is off or the feed has closed.
async fn next_relevant_mutation(
    mutations: &mut Option<broadcast::Receiver<MutationRecord>>,
    document: &dyn Document,
    node: NodeId,
) {
    loop {
        let Some(rx) = mutations.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Ok(record) => {
                if is_relevant(document, node, &record) {
                    drain(rx);
                    return;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "mutation feed lagged, resampling");
                drain(rx);
                return;
            }
            Err(RecvError::Closed) => *mutations = None,
        }
    }
}

fn drain(rx: &mut broadcast::Receiver<MutationRecord>) {
    loop {
        match rx.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_model::MemoryDocument;

    #[test]
    fn relevance_covers_subtree_and_detach() {
        let doc = MemoryDocument::default();
        let card = doc.append_element(None, "div").unwrap();
        let target = doc.append_element(Some(card), "button").unwrap();
        let icon = doc.append_element(Some(target), "span").unwrap();
        let other = doc.append_element(None, "p").unwrap();

        let attr = |node| MutationRecord {
            target: node,
            kind: MutationKind::Attributes {
                name: "class".to_string(),
            },
        };
        assert!(is_relevant(&doc, target, &attr(target)));
        assert!(is_relevant(&doc, target, &attr(icon)));
        assert!(!is_relevant(&doc, target, &attr(card)));
        assert!(!is_relevant(&doc, target, &attr(other)));

        let removed = MutationRecord {
            target: card,
            kind: MutationKind::ChildList,
        };
        assert!(!is_relevant(&doc, target, &removed));
        doc.detach(target).unwrap();
        assert!(is_relevant(&doc, target, &removed));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StabilizerConfig {
            stable_samples: 0,
            ..StabilizerConfig::default()
        };
        let result = PositionStabilizer::new(Arc::new(MemoryDocument::default()), config);
        assert!(matches!(result, Err(StabilizerError::InvalidConfig(_))));
    }
}
