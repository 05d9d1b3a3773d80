//! End-to-end session tests: coordinator, per-frame recorders and store wired
//! together the way a host embeds them.

use std::sync::Arc;
use std::time::Duration;

use pageflow::{
    CandidateKind, Document, Element, FillValue, RecorderError, Step, StepAction, WindowId,
};
use pageflow_recorder::{
    send_control, ControlMessage, FrameEnvelope, FrameRecorder, FrameRole, KeyInput,
    MemoryFlowStore, MouseButton, PageEvent, RecorderConfig, RecordingMeta, SessionCoordinator,
    TabId,
};

struct Page {
    doc: Document,
    recorder: FrameRecorder,
    tab: TabId,
}

async fn open_page(coordinator: &SessionCoordinator, id: u32, href: &str) -> Page {
    let doc = Document::new(href);
    let tab = TabId(id);
    let recorder = FrameRecorder::install(
        &doc,
        RecorderConfig::default(),
        FrameRole::Top(coordinator.data_link(tab)),
    )
    .expect("fresh document");
    coordinator
        .register_tab(tab, Some(href.to_string()), recorder.sender())
        .await;
    Page { doc, recorder, tab }
}

fn session() -> (Arc<MemoryFlowStore>, SessionCoordinator) {
    let store = Arc::new(MemoryFlowStore::new());
    let coordinator = SessionCoordinator::spawn(store.clone(), RecorderConfig::default());
    (store, coordinator)
}

async fn type_into(recorder: &FrameRecorder, el: &Element, value: &str) {
    el.set_value(value);
    recorder
        .dispatch(PageEvent::Input {
            target: el.clone(),
            is_composing: false,
        })
        .await;
}

async fn click(recorder: &FrameRecorder, el: &Element) {
    recorder
        .dispatch(PageEvent::Click {
            target: el.clone(),
            button: MouseButton::Left,
            detail: 1,
        })
        .await;
}

fn assert_unique_ids(steps: &[Step]) {
    let mut ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), steps.len(), "step ids must be unique");
}

#[tokio::test(start_paused = true)]
async fn test_fill_then_tab_key() {
    let (store, coordinator) = session();
    let page = open_page(&coordinator, 1, "https://example.com/form").await;
    let user = Element::new("input");
    user.set_attr("id", "u").set_attr("type", "text");
    let next = Element::new("input");
    next.set_attr("id", "v");
    page.doc.body().append_child(&user);
    page.doc.body().append_child(&next);

    coordinator.start(RecordingMeta::default()).await.unwrap();
    page.recorder
        .dispatch(PageEvent::FocusIn {
            target: user.clone(),
        })
        .await;
    for value in ["h", "he", "hel", "hell", "hello"] {
        type_into(&page.recorder, &user, value).await;
    }
    page.recorder
        .dispatch(PageEvent::KeyDown {
            input: KeyInput::plain("Tab"),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let outcome = coordinator.stop().await.unwrap();
    assert!(outcome.ack);
    let flow = outcome.flow;
    assert_unique_ids(&flow.steps);

    // navigate (initial), one fill, one key
    assert_eq!(flow.steps.len(), 3);
    assert!(matches!(flow.steps[0].action, StepAction::Navigate { .. }));
    match &flow.steps[1].action {
        StepAction::Fill { target, value } => {
            assert_eq!(target.selector, "#u");
            assert_eq!(*value, FillValue::Text("hello".to_string()));
        }
        other => panic!("expected fill, got {other:?}"),
    }
    match &flow.steps[2].action {
        StepAction::Key { keys, .. } => assert_eq!(keys, "Tab"),
        other => panic!("expected key, got {other:?}"),
    }

    // The finalized flow reached the store.
    assert_eq!(store.get(&flow.id).unwrap().steps.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_blank_link_becomes_open_and_switch_tab() {
    let (_store, coordinator) = session();
    let page = open_page(&coordinator, 1, "https://example.com/base").await;
    let link = Element::new("a");
    link.set_attr("id", "k")
        .set_attr("href", "/next")
        .set_attr("target", "_blank")
        .set_text("Go");
    page.doc.body().append_child(&link);

    coordinator.start(RecordingMeta::default()).await.unwrap();
    click(&page.recorder, &link).await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    let actions: Vec<&StepAction> = flow.steps.iter().map(|s| &s.action).collect();
    assert!(!actions
        .iter()
        .any(|a| matches!(a, StepAction::Click { .. })));
    match (&flow.steps[1].action, &flow.steps[2].action) {
        (StepAction::OpenTab { url }, StepAction::SwitchTab { url_contains }) => {
            assert_eq!(url, "https://example.com/next");
            assert_eq!(url_contains, "https://example.com/next");
        }
        other => panic!("expected openTab + switchTab, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_password_fill_is_redacted_into_variable() {
    let (_store, coordinator) = session();
    let page = open_page(&coordinator, 1, "https://example.com/login").await;
    let password = Element::new("input");
    password
        .set_attr("id", "p")
        .set_attr("type", "password")
        .set_attr("name", "pwd");
    page.doc.body().append_child(&password);

    coordinator.start(RecordingMeta::default()).await.unwrap();
    for value in ["s", "sec", "secret"] {
        type_into(&page.recorder, &password, value).await;
    }
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    match &flow.steps[1].action {
        StepAction::Fill { value, .. } => {
            assert_eq!(*value, FillValue::Text("{pwd}".to_string()));
        }
        other => panic!("expected fill, got {other:?}"),
    }
    assert_eq!(flow.variables.len(), 1);
    assert_eq!(flow.variables[0].key, "pwd");
    assert!(flow.variables[0].sensitive);
    assert_eq!(flow.variables[0].default, "");

    // The literal never reaches the serialized flow.
    assert!(!flow.to_json().unwrap().contains("secret"));
}

#[tokio::test(start_paused = true)]
async fn test_cross_frame_click_composes_selector() {
    let (_store, coordinator) = session();
    let top = open_page(&coordinator, 1, "https://example.com/app").await;
    let iframe = Element::new("iframe");
    iframe.set_attr("id", "f").set_attr("src", "/sub");
    top.doc.body().append_child(&iframe);

    let child_doc = Document::new("https://example.com/sub");
    iframe.set_content_document(&child_doc);
    let child = FrameRecorder::install(
        &child_doc,
        RecorderConfig::default(),
        FrameRole::Child {
            top: top.recorder.sender(),
        },
    )
    .expect("fresh child document");
    let button = Element::new("button");
    button.set_attr("id", "x");
    child_doc.body().append_child(&button);

    coordinator.start(RecordingMeta::default()).await.unwrap();
    // Injection reaches every frame of the tab.
    send_control(
        &child.sender(),
        ControlMessage::Start {
            meta: RecordingMeta::default(),
            session_id: 1,
        },
    )
    .await
    .unwrap();

    click(&child, &button).await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    let clicks: Vec<&Step> = flow
        .steps
        .iter()
        .filter(|s| matches!(s.action, StepAction::Click { .. }))
        .collect();
    assert_eq!(clicks.len(), 1);
    match &clicks[0].action {
        StepAction::Click { target } => {
            assert_eq!(target.selector, "#f |> #x");
            assert_eq!(target.candidates[0].kind, CandidateKind::Css);
            assert_eq!(target.candidates[0].value, "#f |> #x");
            assert!(target.elem_ref.is_none(), "refs never cross frames");
        }
        other => panic!("expected click, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_forged_frame_message_rejected() {
    let (_store, coordinator) = session();
    let top = open_page(&coordinator, 1, "https://example.com/app").await;

    coordinator.start(RecordingMeta::default()).await.unwrap();

    let stranger = Document::new("https://evil.example/");
    let forged = Step::new(StepAction::Navigate {
        url: "https://evil.example/phish".to_string(),
    });
    let envelope = FrameEnvelope::new("https://evil.example/".to_string(), forged);
    top.recorder
        .dispatch(PageEvent::FrameMessage {
            source: stranger.window_id(),
            origin: "https://evil.example".to_string(),
            data: serde_json::to_value(&envelope).unwrap(),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    // Only the initial navigate survives; the forged message was dropped.
    assert_eq!(flow.steps.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_origin_frame_with_mismatched_origin_rejected() {
    let (_store, coordinator) = session();
    let top = open_page(&coordinator, 1, "https://example.com/app").await;
    let iframe = Element::new("iframe");
    iframe.set_attr("id", "f").set_attr("src", "/sub");
    top.doc.body().append_child(&iframe);
    let child_doc = Document::new("https://example.com/sub");
    iframe.set_content_document(&child_doc);

    coordinator.start(RecordingMeta::default()).await.unwrap();

    let step = Step::new(StepAction::Navigate {
        url: "https://example.com/sub".to_string(),
    });
    let envelope = FrameEnvelope::new(child_doc.href(), step);
    top.recorder
        .dispatch(PageEvent::FrameMessage {
            source: child_doc.window_id(),
            origin: "https://evil.example".to_string(),
            data: serde_json::to_value(&envelope).unwrap(),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    assert_eq!(flow.steps.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_debounce_preserves_fill() {
    let (_store, coordinator) = session();
    let page = open_page(&coordinator, 1, "https://example.com/form").await;
    let input = Element::new("input");
    input.set_attr("id", "q");
    page.doc.body().append_child(&input);

    coordinator.start(RecordingMeta::default()).await.unwrap();
    type_into(&page.recorder, &input, "a").await;
    type_into(&page.recorder, &input, "ab").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The debounce window (800 ms) has not elapsed; the barrier drains it.
    let outcome = coordinator.stop().await.unwrap();
    assert!(outcome.ack);
    let fills: Vec<&Step> = outcome
        .flow
        .steps
        .iter()
        .filter(|s| matches!(s.action, StepAction::Fill { .. }))
        .collect();
    assert_eq!(fills.len(), 1);
    match &fills[0].action {
        StepAction::Fill { value, .. } => assert_eq!(*value, FillValue::Text("ab".to_string())),
        other => panic!("expected fill, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_upsert_keeps_fill_at_first_position() {
    let (_store, coordinator) = session();
    let page = open_page(&coordinator, 1, "https://example.com/form").await;
    let input = Element::new("input");
    input.set_attr("id", "q");
    let button = Element::new("button");
    button.set_attr("id", "b");
    page.doc.body().append_child(&input);
    page.doc.body().append_child(&button);

    coordinator.start(RecordingMeta::default()).await.unwrap();
    type_into(&page.recorder, &input, "a").await;
    tokio::time::sleep(Duration::from_millis(350)).await;
    click(&page.recorder, &button).await;
    tokio::time::sleep(Duration::from_millis(350)).await;
    // Still inside the fill's debounce window: merges into the first step.
    type_into(&page.recorder, &input, "ab").await;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    assert_unique_ids(&flow.steps);
    assert_eq!(flow.steps.len(), 3);
    match &flow.steps[1].action {
        StepAction::Fill { value, .. } => assert_eq!(*value, FillValue::Text("ab".to_string())),
        other => panic!("expected fill first, got {other:?}"),
    }
    assert!(matches!(flow.steps[2].action, StepAction::Click { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_tab_update_enriches_last_click() {
    let (_store, coordinator) = session();
    let page = open_page(&coordinator, 1, "https://example.com/list").await;
    let button = Element::new("button");
    button.set_attr("id", "open");
    page.doc.body().append_child(&button);

    coordinator.start(RecordingMeta::default()).await.unwrap();
    click(&page.recorder, &button).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    coordinator
        .tab_updated(page.tab, "https://example.com/detail")
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    let click_step = flow
        .steps
        .iter()
        .find(|s| matches!(s.action, StepAction::Click { .. }))
        .unwrap();
    assert!(click_step.after.unwrap().wait_for_navigation);
}

#[tokio::test(start_paused = true)]
async fn test_session_state_transitions_are_guarded() {
    let (_store, coordinator) = session();
    let _page = open_page(&coordinator, 1, "https://example.com/").await;

    assert!(matches!(
        coordinator.stop().await,
        Err(RecorderError::NoActiveRecording)
    ));
    assert!(matches!(
        coordinator.pause().await,
        Err(RecorderError::InvalidControl(_))
    ));

    coordinator.start(RecordingMeta::default()).await.unwrap();
    assert!(matches!(
        coordinator.start(RecordingMeta::default()).await,
        Err(RecorderError::AlreadyRecording)
    ));
    assert!(matches!(
        coordinator.resume().await,
        Err(RecorderError::InvalidControl(_))
    ));

    coordinator.pause().await.unwrap();
    coordinator.resume().await.unwrap();
    let outcome = coordinator.stop().await.unwrap();
    assert!(outcome.ack);
}

#[tokio::test(start_paused = true)]
async fn test_start_requires_a_registered_tab() {
    let store = Arc::new(MemoryFlowStore::new());
    let coordinator = SessionCoordinator::spawn(store, RecorderConfig::default());
    assert!(matches!(
        coordinator.start(RecordingMeta::default()).await,
        Err(RecorderError::NoActiveTab)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_flow_identity_from_start_metadata() {
    let (store, coordinator) = session();
    let _page = open_page(&coordinator, 1, "https://example.com/").await;

    coordinator
        .start(RecordingMeta {
            id: Some("flow-7".to_string()),
            name: Some("Checkout".to_string()),
            description: Some("happy path".to_string()),
        })
        .await
        .unwrap();
    let flow = coordinator.stop().await.unwrap().flow;

    assert_eq!(flow.id, "flow-7");
    assert_eq!(flow.name, "Checkout");
    assert_eq!(flow.description.as_deref(), Some("happy path"));
    assert_eq!(flow.version, 1);
    assert!(store.get("flow-7").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_window_id_is_not_a_capability() {
    // Knowing a frame's WindowId is not enough: the sender must actually be
    // a child frame element's content window.
    let (_store, coordinator) = session();
    let top = open_page(&coordinator, 1, "https://example.com/app").await;
    coordinator.start(RecordingMeta::default()).await.unwrap();

    let unattached = Document::new("https://example.com/popup");
    let own_id: WindowId = unattached.window_id();
    let envelope = FrameEnvelope::new(
        unattached.href(),
        Step::new(StepAction::Navigate {
            url: "https://example.com/popup".to_string(),
        }),
    );
    top.recorder
        .dispatch(PageEvent::FrameMessage {
            source: own_id,
            origin: "https://example.com".to_string(),
            data: serde_json::to_value(&envelope).unwrap(),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let flow = coordinator.stop().await.unwrap().flow;
    assert_eq!(flow.steps.len(), 1);
}
