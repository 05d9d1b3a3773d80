//! Records a short simulated session and prints the resulting flow as JSON.

use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pageflow::{Document, Element};
use pageflow_recorder::{
    FrameRecorder, FrameRole, KeyInput, MemoryFlowStore, MouseButton, PageEvent, RecorderConfig,
    RecordingMeta, SessionCoordinator, TabId,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // A small login page.
    let doc = Document::new("https://example.com/login");
    let user = Element::new("input");
    user.set_attr("id", "user").set_attr("name", "user");
    let pass = Element::new("input");
    pass.set_attr("id", "pass")
        .set_attr("name", "pwd")
        .set_attr("type", "password");
    let submit = Element::new("button");
    submit.set_attr("id", "submit").set_text("Sign in");
    doc.body().append_child(&user);
    doc.body().append_child(&pass);
    doc.body().append_child(&submit);

    let store = Arc::new(MemoryFlowStore::new());
    let coordinator = SessionCoordinator::spawn(store.clone(), RecorderConfig::default());

    let tab = TabId(1);
    let recorder = FrameRecorder::install(
        &doc,
        RecorderConfig::default(),
        FrameRole::Top(coordinator.data_link(tab)),
    )
    .ok_or("recorder already installed")?;
    coordinator
        .register_tab(tab, Some(doc.href()), recorder.sender())
        .await;

    let session = coordinator
        .start(RecordingMeta {
            name: Some("Login".to_string()),
            ..Default::default()
        })
        .await?;
    info!(session, "recording");

    // Type a username, a password, then submit.
    for value in ["al", "alice"] {
        user.set_value(value);
        recorder
            .dispatch(PageEvent::Input {
                target: user.clone(),
                is_composing: false,
            })
            .await;
    }
    pass.set_value("hunter2");
    recorder
        .dispatch(PageEvent::Input {
            target: pass.clone(),
            is_composing: false,
        })
        .await;
    recorder
        .dispatch(PageEvent::Click {
            target: submit.clone(),
            button: MouseButton::Left,
            detail: 1,
        })
        .await;
    recorder
        .dispatch(PageEvent::KeyDown {
            input: KeyInput::plain("Escape"),
        })
        .await;

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let outcome = coordinator.stop().await?;
    info!(ack = outcome.ack, steps = outcome.flow.steps.len(), "stopped");
    println!("{}", outcome.flow.to_json()?);
    Ok(())
}
