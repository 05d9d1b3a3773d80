//! Double-click disambiguation: a second click inside the threshold cancels
//! the pending single click and yields exactly one dblclick step.

use std::sync::Arc;
use std::time::Duration;

use pageflow::{Document, Element, StepAction};
use pageflow_recorder::{
    FrameRecorder, FrameRole, MemoryFlowStore, MouseButton, PageEvent, RecorderConfig,
    RecordingMeta, SessionCoordinator, TabId,
};

async fn click_with_detail(recorder: &FrameRecorder, el: &Element, detail: u32) {
    recorder
        .dispatch(PageEvent::Click {
            target: el.clone(),
            button: MouseButton::Left,
            detail,
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_double_click_yields_single_dblclick_step() {
    let store = Arc::new(MemoryFlowStore::new());
    let coordinator = SessionCoordinator::spawn(store, RecorderConfig::default());

    let doc = Document::new("https://example.com/");
    let tab = TabId(1);
    let recorder = FrameRecorder::install(
        &doc,
        RecorderConfig::default(),
        FrameRole::Top(coordinator.data_link(tab)),
    )
    .unwrap();
    coordinator
        .register_tab(tab, Some(doc.href()), recorder.sender())
        .await;

    let button = Element::new("button");
    button.set_attr("id", "b");
    doc.body().append_child(&button);

    coordinator.start(RecordingMeta::default()).await.unwrap();

    // Two clicks inside the 300 ms threshold: the browser reports the second
    // with detail 2.
    click_with_detail(&recorder, &button, 1).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    click_with_detail(&recorder, &button, 2).await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    let clicks = flow
        .steps
        .iter()
        .filter(|s| matches!(s.action, StepAction::Click { .. }))
        .count();
    let dblclicks: Vec<_> = flow
        .steps
        .iter()
        .filter(|s| matches!(s.action, StepAction::Dblclick { .. }))
        .collect();

    assert_eq!(clicks, 0, "a genuine double-click emits no single click");
    assert_eq!(dblclicks.len(), 1);
    match &dblclicks[0].action {
        StepAction::Dblclick { target } => assert_eq!(target.selector, "#b"),
        other => panic!("expected dblclick, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_separated_clicks_stay_single() {
    let store = Arc::new(MemoryFlowStore::new());
    let coordinator = SessionCoordinator::spawn(store, RecorderConfig::default());

    let doc = Document::new("https://example.com/");
    let tab = TabId(1);
    let recorder = FrameRecorder::install(
        &doc,
        RecorderConfig::default(),
        FrameRole::Top(coordinator.data_link(tab)),
    )
    .unwrap();
    coordinator
        .register_tab(tab, Some(doc.href()), recorder.sender())
        .await;

    let button = Element::new("button");
    button.set_attr("id", "b");
    doc.body().append_child(&button);

    coordinator.start(RecordingMeta::default()).await.unwrap();
    recorder
        .dispatch(PageEvent::Click {
            target: button.clone(),
            button: MouseButton::Left,
            detail: 1,
        })
        .await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    recorder
        .dispatch(PageEvent::Click {
            target: button.clone(),
            button: MouseButton::Left,
            detail: 1,
        })
        .await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    let clicks = flow
        .steps
        .iter()
        .filter(|s| matches!(s.action, StepAction::Click { .. }))
        .count();
    assert_eq!(clicks, 2);
    assert!(!flow
        .steps
        .iter()
        .any(|s| matches!(s.action, StepAction::Dblclick { .. })));
}
