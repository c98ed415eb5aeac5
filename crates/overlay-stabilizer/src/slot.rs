//! Single-owner overlay slot

use element_locator::ResolvedElement;
use tracing::debug;

use crate::{
    context::StabilizationContext, handle::StabilizationHandle, sink::UpdateSink,
    stabilizer::PositionStabilizer, state::Phase,
};

/// Owns the one overlay a consumer displays. Starting a new run cancels the previous one
/// before the new one is spawned, so two runs never write to the same overlay.
#[derive(Debug, Default)]
pub struct OverlaySlot {
    active: Option<StabilizationHandle>,
}

impl OverlaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the current run (if any) and track `element`.
    pub fn track<S: UpdateSink>(
        &mut self,
        stabilizer: &PositionStabilizer,
        element: ResolvedElement,
        sink: S,
    ) -> &StabilizationHandle {
        self.release();
        self.active.insert(stabilizer.track(element, sink))
    }

    /// Like [`OverlaySlot::track`] with a caller-chosen context.
    pub fn start<S: UpdateSink>(
        &mut self,
        stabilizer: &PositionStabilizer,
        element: ResolvedElement,
        context: StabilizationContext,
        sink: S,
    ) -> &StabilizationHandle {
        self.release();
        self.active.insert(stabilizer.start(element, context, sink))
    }

    /// Cancel and forget the current run. Returns its phase after cancellation.
    pub fn release(&mut self) -> Option<Phase> {
        let previous = self.active.take()?;
        previous.cancel();
        debug!(run_id = %previous.run_id(), phase = %previous.phase(), "overlay slot released");
        Some(previous.phase())
    }

    pub fn current(&self) -> Option<&StabilizationHandle> {
        self.active.as_ref()
    }
}

impl Drop for OverlaySlot {
    fn drop(&mut self) {
        self.release();
    }
}
