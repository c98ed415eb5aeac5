use std::sync::Arc;
use std::time::Duration;

use element_locator::ResolvedElement;
use overlay_stabilizer::{
    channel_sink, OverlaySlot, Phase, PositionStabilizer, PositionUpdate, StabilizationContext,
    StabilizationHandle, StabilizerConfig, TimingProfile, UpdateSource,
};
use page_model::MemoryDocument;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, Instant};
use waypoint_core_types::{NodeId, Rect};

fn stabilizer(doc: &Arc<MemoryDocument>, config: StabilizerConfig) -> PositionStabilizer {
    PositionStabilizer::new(doc.clone(), config).unwrap()
}

fn element(node: NodeId) -> ResolvedElement {
    ResolvedElement::new(node)
}

async fn finish(
    handle: &StabilizationHandle,
    rx: &mut UnboundedReceiver<PositionUpdate>,
) -> (Phase, Vec<PositionUpdate>) {
    let phase = handle.finished().await;
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    (phase, updates)
}

fn button_rect() -> Rect {
    Rect::new(120.0, 40.0, 160.0, 32.0)
}

#[tokio::test(start_paused = true)]
async fn constant_rect_stabilizes_after_three_samples() {
    let doc = Arc::new(MemoryDocument::default());
    let button = doc.append_element(None, "button").unwrap();
    doc.set_layout(button, button_rect()).unwrap();

    let started = Instant::now();
    let (sink, mut rx) = channel_sink();
    let handle = stabilizer(&doc, StabilizerConfig::default()).start(
        element(button),
        StabilizationContext::Standard,
        sink,
    );
    let (phase, updates) = finish(&handle, &mut rx).await;

    assert_eq!(phase, Phase::Stabilized);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].phase, Phase::Polling);
    assert_eq!(updates[0].attempt, 0);
    assert_eq!(updates[1].phase, Phase::Stabilized);
    assert_eq!(updates[1].attempt, 3);
    assert_eq!(updates[1].rect, button_rect());

    // Five samples at 50ms.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(250), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn resizing_target_stabilizes_on_fifth_sample() {
    let doc = Arc::new(MemoryDocument::default());
    let panel = doc.append_element(None, "div").unwrap();
    doc.set_layout(panel, Rect::new(0.0, 0.0, 100.0, 100.0))
        .unwrap();

    let driver = {
        let doc = doc.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(25)).await;
            doc.set_layout(panel, Rect::new(0.0, 0.0, 200.0, 150.0))
                .unwrap();
            sleep(Duration::from_millis(50)).await;
            doc.set_layout(panel, Rect::new(0.0, 0.0, 300.0, 200.0))
                .unwrap();
        })
    };

    let (sink, mut rx) = channel_sink();
    let handle = stabilizer(&doc, StabilizerConfig::default()).start(
        element(panel),
        StabilizationContext::Standard,
        sink,
    );
    let (phase, updates) = finish(&handle, &mut rx).await;
    driver.await.unwrap();

    assert_eq!(phase, Phase::Stabilized);
    let attempts: Vec<u32> = updates.iter().map(|u| u.attempt).collect();
    assert_eq!(attempts, vec![0, 1, 2, 5]);
    let last = updates.last().unwrap();
    assert_eq!(last.phase, Phase::Stabilized);
    assert_eq!(last.rect, Rect::new(0.0, 0.0, 300.0, 200.0));
}

#[tokio::test(start_paused = true)]
async fn never_visible_target_is_forced_visible() {
    let doc = Arc::new(MemoryDocument::default());
    let ghost = doc.append_element(None, "button").unwrap();

    let config = StabilizerConfig {
        standard: TimingProfile::new(5, 10, 0),
        ..StabilizerConfig::default()
    };
    let (sink, mut rx) = channel_sink();
    let handle = stabilizer(&doc, config).start(
        element(ghost),
        StabilizationContext::Standard,
        sink,
    );
    let (phase, updates) = finish(&handle, &mut rx).await;

    assert_eq!(phase, Phase::ForcedVisible);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].rect, Rect::ZERO);
    assert_eq!(updates[0].attempt, 5);
    assert_eq!(updates[0].source, UpdateSource::LastSample);
}

#[tokio::test(start_paused = true)]
async fn zero_size_target_shows_visible_parent() {
    let doc = Arc::new(MemoryDocument::default());
    let card = doc.append_element(None, "section").unwrap();
    doc.set_layout(card, Rect::new(50.0, 50.0, 400.0, 300.0))
        .unwrap();
    let target = doc.append_element(Some(card), "button").unwrap();

    let config = StabilizerConfig {
        standard: TimingProfile::new(3, 10, 0),
        ..StabilizerConfig::default()
    };
    let (sink, mut rx) = channel_sink();
    let handle = stabilizer(&doc, config).start(
        element(target),
        StabilizationContext::Standard,
        sink,
    );
    let (phase, updates) = finish(&handle, &mut rx).await;

    assert_eq!(phase, Phase::ForcedVisible);
    // The unusable seed already falls back to the card.
    let first = updates[0];
    assert_eq!(first.attempt, 0);
    assert_eq!(first.rect, Rect::new(50.0, 50.0, 400.0, 300.0));
    assert_eq!(first.source, UpdateSource::Ancestor { hops: 1 });
    assert_eq!(first.phase, Phase::Polling);
}

#[tokio::test(start_paused = true)]
async fn expanding_nav_waits_before_falling_back() {
    let doc = Arc::new(MemoryDocument::default());
    let nav = doc.append_element(None, "nav").unwrap();
    doc.set_layout(nav, Rect::new(0.0, 0.0, 240.0, 600.0))
        .unwrap();
    let link = doc.append_element(Some(nav), "a").unwrap();

    let config = StabilizerConfig {
        in_expanding_nav: TimingProfile::new(10, 10, 0),
        ..StabilizerConfig::default()
    };
    let (sink, mut rx) = channel_sink();
    let handle = stabilizer(&doc, config).track(element(link), sink);
    assert_eq!(handle.context(), StabilizationContext::InExpandingNav);

    let (phase, updates) = finish(&handle, &mut rx).await;
    assert_eq!(phase, Phase::ForcedVisible);
    assert_eq!(updates[0].attempt, 5);
    assert_eq!(updates[0].source, UpdateSource::Ancestor { hops: 1 });
}

#[tokio::test(start_paused = true)]
async fn cancel_is_idempotent_and_silences_the_run() {
    let doc = Arc::new(MemoryDocument::default());
    let button = doc.append_element(None, "button").unwrap();
    doc.set_layout(button, button_rect()).unwrap();

    let (sink, mut rx) = channel_sink();
    let handle = stabilizer(&doc, StabilizerConfig::default()).start(
        element(button),
        StabilizationContext::InModal,
        sink,
    );
    sleep(Duration::from_millis(100)).await;
    handle.cancel();
    handle.cancel();

    assert_eq!(handle.finished().await, Phase::Abandoned);
    // The task drops its sink on exit without having emitted anything.
    assert!(rx.recv().await.is_none());
    handle.cancel();
    assert_eq!(handle.phase(), Phase::Abandoned);
}

#[tokio::test(start_paused = true)]
async fn cancel_after_completion_keeps_terminal_phase() {
    let doc = Arc::new(MemoryDocument::default());
    let button = doc.append_element(None, "button").unwrap();
    doc.set_layout(button, button_rect()).unwrap();

    let (sink, _rx) = channel_sink();
    let handle = stabilizer(&doc, StabilizerConfig::default()).start(
        element(button),
        StabilizationContext::Standard,
        sink,
    );
    assert_eq!(handle.finished().await, Phase::Stabilized);
    handle.cancel();
    assert_eq!(handle.phase(), Phase::Stabilized);
}

#[tokio::test(start_paused = true)]
async fn overlay_slot_cancels_previous_run() {
    let doc = Arc::new(MemoryDocument::default());
    let first = doc.append_element(None, "button").unwrap();
    let second = doc.append_element(None, "button").unwrap();
    doc.set_layout(first, button_rect()).unwrap();
    doc.set_layout(second, Rect::new(400.0, 40.0, 160.0, 32.0))
        .unwrap();
    let stabilizer = stabilizer(&doc, StabilizerConfig::default());

    let mut slot = OverlaySlot::new();
    let (sink, _rx) = channel_sink();
    let previous = slot.track(&stabilizer, element(first), sink).clone();
    assert!(previous.is_active());

    let (sink, _rx2) = channel_sink();
    slot.track(&stabilizer, element(second), sink);
    assert_eq!(previous.phase(), Phase::Abandoned);

    let current = slot.current().unwrap().clone();
    assert_eq!(current.element(), element(second));
    assert!(current.is_active());

    drop(slot);
    assert_eq!(current.finished().await, Phase::Abandoned);
}

#[tokio::test(start_paused = true)]
async fn mutation_reports_movement_immediately() {
    let doc = Arc::new(MemoryDocument::default());
    let button = doc.append_element(None, "button").unwrap();
    doc.set_layout(button, button_rect()).unwrap();

    let started = Instant::now();
    let (sink, mut rx) = channel_sink();
    let handle = stabilizer(&doc, StabilizerConfig::default()).start(
        element(button),
        StabilizationContext::Standard,
        sink,
    );

    sleep(Duration::from_millis(20)).await;
    let moved = Rect::new(180.0, 40.0, 160.0, 32.0);
    doc.set_layout(button, moved).unwrap();
    doc.set_attribute(button, "class", "primary").unwrap();

    let seed = rx.recv().await.unwrap();
    assert_eq!(seed.phase, Phase::Polling);
    let shifted = rx.recv().await.unwrap();
    assert_eq!(shifted.rect, moved);
    assert_eq!(shifted.attempt, 1);
    assert!(started.elapsed() < Duration::from_millis(50));

    // Ticks at 50, 100 and 150ms confirm the new position.
    let stabilized = rx.recv().await.unwrap();
    assert_eq!(stabilized.phase, Phase::Stabilized);
    assert_eq!(stabilized.attempt, 4);
    assert!(started.elapsed() >= Duration::from_millis(150));

    assert_eq!(handle.finished().await, Phase::Stabilized);
}

#[tokio::test(start_paused = true)]
async fn mutation_burst_does_not_settle_the_run() {
    let doc = Arc::new(MemoryDocument::default());
    let button = doc.append_element(None, "button").unwrap();
    doc.set_layout(button, button_rect()).unwrap();

    let started = Instant::now();
    let (sink, mut rx) = channel_sink();
    let handle = stabilizer(&doc, StabilizerConfig::default()).start(
        element(button),
        StabilizationContext::Standard,
        sink,
    );

    sleep(Duration::from_millis(10)).await;
    for (name, value) in [
        ("class", "open"),
        ("aria-expanded", "true"),
        ("data-state", "entering"),
        ("style", "opacity: 0.5"),
        ("title", "Save"),
    ] {
        doc.set_attribute(button, name, value).unwrap();
    }
    sleep(Duration::from_millis(30)).await;
    let landed = Rect::new(300.0, 40.0, 160.0, 32.0);
    doc.set_layout(button, landed).unwrap();

    let (phase, updates) = finish(&handle, &mut rx).await;
    assert_eq!(phase, Phase::Stabilized);

    // One sample for the burst at 10ms, then the move is seen by the 50ms tick.
    let attempts: Vec<u32> = updates.iter().map(|u| u.attempt).collect();
    assert_eq!(attempts, vec![0, 2, 5]);
    assert_eq!(updates[1].rect, landed);
    assert_eq!(updates[1].phase, Phase::Polling);
    let last = updates.last().unwrap();
    assert_eq!(last.rect, landed);
    assert_eq!(last.phase, Phase::Stabilized);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn unrelated_mutations_are_ignored() {
    let doc = Arc::new(MemoryDocument::default());
    let button = doc.append_element(None, "button").unwrap();
    let banner = doc.append_element(None, "div").unwrap();
    doc.set_layout(button, button_rect()).unwrap();

    let started = Instant::now();
    let (sink, mut rx) = channel_sink();
    let _handle = stabilizer(&doc, StabilizerConfig::default()).start(
        element(button),
        StabilizationContext::Standard,
        sink,
    );

    sleep(Duration::from_millis(20)).await;
    doc.set_attribute(banner, "class", "flash").unwrap();

    rx.recv().await.unwrap();
    let stabilized = rx.recv().await.unwrap();
    assert_eq!(stabilized.attempt, 3);
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn modal_context_wins_over_navigation() {
    let doc = Arc::new(MemoryDocument::default());
    let dialog = doc.append_element(None, "div").unwrap();
    doc.set_attribute(dialog, "role", "dialog").unwrap();
    doc.set_layout(dialog, Rect::new(100.0, 100.0, 500.0, 400.0))
        .unwrap();
    let menu = doc.append_element(Some(dialog), "nav").unwrap();
    let item = doc.append_element(Some(menu), "a").unwrap();

    let stabilizer = stabilizer(&doc, StabilizerConfig::default());
    assert_eq!(
        stabilizer.classify(element(item)),
        StabilizationContext::InModal
    );
}
