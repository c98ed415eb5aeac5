//! Per-run stabilization state machine
//!
//! Pure and synchronous: the run loop feeds it samples and acts on the returned [`Step`].
//! Periodic ticks go through [`StabilizationState::step`], mutation-triggered samples through
//! [`StabilizationState::observe`]; both apply the same movement rules.

use serde::{Deserialize, Serialize};
use waypoint_core_types::Rect;

use crate::{
    config::{StabilizerConfig, TimingProfile},
    context::StabilizationContext,
    sampler::GeometrySample,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Geometry still moving or not yet confirmed
    Polling,

    /// Consecutive samples agreed; the overlay is pinned
    Stabilized,

    /// Budget exhausted before stabilizing; the overlay is shown regardless
    ForcedVisible,

    /// Run cancelled by its owner
    Abandoned,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Polling => "polling",
            Phase::Stabilized => "stabilized",
            Phase::ForcedVisible => "forced_visible",
            Phase::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an emitted rectangle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum UpdateSource {
    Target,
    Ancestor { hops: u8 },
    LastSample,
}

/// Rectangle pushed to the overlay consumer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub rect: Rect,
    pub phase: Phase,
    pub source: UpdateSource,
    /// Attempt that produced the update (0 for the seed measurement)
    pub attempt: u32,
}

/// Outcome of feeding one sample to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing to report, keep polling
    Idle,
    Emit(PositionUpdate),
    /// Terminal; emit the update if present, then stop polling
    Finish(Option<PositionUpdate>),
    /// Target unusable; look for a visible ancestor and report it via
    /// [`StabilizationState::fallback_update`]
    AncestorFallback,
}

#[derive(Debug, Clone)]
pub struct StabilizationState {
    context: StabilizationContext,
    timing: TimingProfile,
    stable_samples: u32,
    settled_samples: u32,
    tolerance: f64,
    last_rect: Option<Rect>,
    stability_counter: u32,
    attempt_counter: u32,
    phase: Phase,
    finished: bool,
}

impl StabilizationState {
    pub fn new(context: StabilizationContext, config: &StabilizerConfig) -> Self {
        Self {
            context,
            timing: context.timing(config),
            stable_samples: config.stable_samples,
            settled_samples: config.settled_samples,
            tolerance: config.tolerance_px,
            last_rect: None,
            stability_counter: 0,
            attempt_counter: 0,
            phase: Phase::Polling,
            finished: false,
        }
    }

    pub fn context(&self) -> StabilizationContext {
        self.context
    }

    pub fn timing(&self) -> TimingProfile {
        self.timing
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempt_counter
    }

    pub fn stability_counter(&self) -> u32 {
        self.stability_counter
    }

    pub fn last_rect(&self) -> Option<Rect> {
        self.last_rect
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Record the first measurement. It is not an attempt.
    ///
    /// A usable seed is emitted right away; an unusable one asks for an ancestor so the
    /// overlay has a position before the first periodic sample.
    pub fn seed(&mut self, sample: GeometrySample) -> Step {
        if self.finished {
            return Step::Idle;
        }
        self.last_rect = Some(sample.rect);
        if sample.is_valid() {
            return Step::Emit(self.update(sample.rect, UpdateSource::Target));
        }
        self.unusable()
    }

    /// Periodic sample. Unchanged geometry advances the stability counter.
    pub fn step(&mut self, sample: GeometrySample) -> Step {
        self.advance(sample, true)
    }

    /// Sample triggered by a mutation batch.
    ///
    /// Movement is handled as in [`Self::step`], but unchanged geometry does not count
    /// toward stabilization: only time-spaced samples can confirm that layout settled.
    pub fn observe(&mut self, sample: GeometrySample) -> Step {
        self.advance(sample, false)
    }

    fn advance(&mut self, sample: GeometrySample, counts_as_stable: bool) -> Step {
        if self.finished {
            return Step::Idle;
        }
        self.attempt_counter += 1;
        let exhausted = self.attempt_counter >= self.timing.max_attempts;

        if !sample.is_valid() {
            self.stability_counter = 0;
            self.phase = Phase::Polling;
            if exhausted {
                return self.force_visible(sample.rect);
            }
            return self.unusable();
        }

        let moved = self
            .last_rect
            .map_or(true, |last| sample.rect.differs_from(&last, self.tolerance));
        if moved {
            self.stability_counter = 0;
            self.last_rect = Some(sample.rect);
            self.phase = Phase::Polling;
            if exhausted {
                return self.force_visible(sample.rect);
            }
            return Step::Emit(self.update(sample.rect, UpdateSource::Target));
        }

        if !counts_as_stable {
            return self.exhaust_or_idle(sample.rect, exhausted);
        }

        self.stability_counter += 1;
        if self.stability_counter == self.stable_samples {
            self.phase = Phase::Stabilized;
            let update = self.update(sample.rect, UpdateSource::Target);
            if exhausted || self.stability_counter >= self.settled_samples {
                self.finished = true;
                return Step::Finish(Some(update));
            }
            return Step::Emit(update);
        }
        if self.stability_counter >= self.settled_samples {
            self.finished = true;
            return Step::Finish(None);
        }
        self.exhaust_or_idle(sample.rect, exhausted)
    }

    fn exhaust_or_idle(&mut self, rect: Rect, exhausted: bool) -> Step {
        if !exhausted {
            return Step::Idle;
        }
        if self.phase == Phase::Stabilized {
            self.finished = true;
            return Step::Finish(None);
        }
        self.force_visible(rect)
    }

    /// Target detached or zero-sized and budget left.
    fn unusable(&self) -> Step {
        if self.context == StabilizationContext::InExpandingNav
            && self.attempt_counter < self.timing.max_attempts / 2
        {
            return Step::Idle;
        }
        Step::AncestorFallback
    }

    /// Update carrying an ancestor's rectangle in place of the target's.
    pub fn fallback_update(&self, rect: Rect, hops: u8) -> PositionUpdate {
        self.update(rect, UpdateSource::Ancestor { hops })
    }

    /// Mark the run cancelled. Returns false if it had already ended.
    pub fn abandon(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.phase = Phase::Abandoned;
        self.finished = true;
        true
    }

    fn force_visible(&mut self, rect: Rect) -> Step {
        self.phase = Phase::ForcedVisible;
        self.finished = true;
        Step::Finish(Some(self.update(rect, UpdateSource::LastSample)))
    }

    fn update(&self, rect: Rect, source: UpdateSource) -> PositionUpdate {
        PositionUpdate {
            rect,
            phase: self.phase,
            source,
            attempt: self.attempt_counter,
        }
    }
}
