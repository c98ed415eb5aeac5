//! Run handle: observe and cancel a stabilization run

use std::sync::Arc;

use element_locator::ResolvedElement;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use waypoint_core_types::RunId;

use crate::{context::StabilizationContext, state::Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunStatus {
    pub phase: Phase,
    pub active: bool,
}

/// Status channel shared by a run task and its handle.
///
/// Once a run is inactive its phase is frozen; later publishes are ignored.
#[derive(Debug, Clone)]
pub(crate) struct StatusCell(Arc<watch::Sender<RunStatus>>);

impl StatusCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(RunStatus {
            phase: Phase::Polling,
            active: true,
        });
        Self(Arc::new(tx))
    }

    pub(crate) fn publish(&self, phase: Phase, active: bool) -> bool {
        self.0.send_if_modified(|status| {
            if !status.active {
                return false;
            }
            let next = RunStatus { phase, active };
            let changed = *status != next;
            *status = next;
            changed
        })
    }

    fn current(&self) -> RunStatus {
        *self.0.borrow()
    }
}

/// Owner-side handle of one run.
///
/// Dropping the handle does not stop the run; call [`StabilizationHandle::cancel`] or hand
/// it to an [`crate::OverlaySlot`].
#[derive(Debug, Clone)]
pub struct StabilizationHandle {
    run_id: RunId,
    element: ResolvedElement,
    context: StabilizationContext,
    token: CancellationToken,
    status: StatusCell,
}

impl StabilizationHandle {
    pub(crate) fn new(
        run_id: RunId,
        element: ResolvedElement,
        context: StabilizationContext,
        token: CancellationToken,
        status: StatusCell,
    ) -> Self {
        Self {
            run_id,
            element,
            context,
            token,
            status,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn element(&self) -> ResolvedElement {
        self.element
    }

    pub fn context(&self) -> StabilizationContext {
        self.context
    }

    pub fn phase(&self) -> Phase {
        self.status.current().phase
    }

    pub fn is_active(&self) -> bool {
        self.status.current().active
    }

    /// Stop the run. Safe to call repeatedly and after the run has ended on its own.
    pub fn cancel(&self) {
        if self.status.publish(Phase::Abandoned, false) {
            debug!(run_id = %self.run_id, "stabilization run cancelled");
        }
        self.token.cancel();
    }

    /// Wait for the run to end and return its terminal phase.
    pub async fn finished(&self) -> Phase {
        let mut rx = self.status.0.subscribe();
        let phase = match rx.wait_for(|status| !status.active).await {
            Ok(status) => status.phase,
            Err(_) => self.status.current().phase,
        };
        phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core_types::NodeId;

    fn handle() -> StabilizationHandle {
        StabilizationHandle::new(
            RunId::new(),
            ResolvedElement::new(NodeId(1)),
            StabilizationContext::Standard,
            CancellationToken::new(),
            StatusCell::new(),
        )
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let handle = handle();
        handle.cancel();
        handle.cancel();
        assert_eq!(handle.phase(), Phase::Abandoned);
        assert_eq!(handle.finished().await, Phase::Abandoned);
    }

    #[test]
    fn finished_pends_while_active() {
        let handle = handle();
        let mut finished = tokio_test::task::spawn(handle.finished());
        tokio_test::assert_pending!(finished.poll());

        handle.cancel();
        assert!(finished.is_woken());
        tokio_test::assert_ready_eq!(finished.poll(), Phase::Abandoned);
    }

    #[tokio::test]
    async fn cancel_after_natural_end_keeps_phase() {
        let handle = handle();
        handle.status.publish(Phase::Stabilized, false);
        handle.cancel();
        assert_eq!(handle.phase(), Phase::Stabilized);
        assert!(!handle.is_active());
    }
}
