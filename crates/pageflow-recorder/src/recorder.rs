//! The per-document recorder.
//!
//! One [`FrameRecorder`] is installed per frame. It owns a cooperative
//! single-threaded loop over the frame's inbox (raw events and control
//! commands on one ordered channel) and its debounce deadlines; all
//! normalization state lives inside the loop. The top frame additionally
//! aggregates steps forwarded by child frames.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use pageflow::{Document, Step, WindowId};

use crate::events::PageEvent;
use crate::messages::{CoordinatorLink, FrameMessage, FrameSender};
use crate::recorder::frame::FrameEngine;

pub mod frame;

/// Configuration for the recorder and the coordinator barrier.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Window during which input events on one element collapse into a
    /// single fill step.
    pub input_debounce: Duration,

    /// Interval at which buffered steps are flushed to the coordinator.
    pub batch_interval: Duration,

    /// Window during which scrolls from one source coalesce.
    pub scroll_debounce: Duration,

    /// How long a single click is held back waiting for a possible second.
    pub double_click_window: Duration,

    /// Input `type` values whose literal values are always redacted.
    pub sensitive_input_types: HashSet<String>,

    /// Redact every fill, not only sensitive input types.
    pub redact_all_inputs: bool,

    /// Track the hovered element with the overlay hover box.
    pub hover_overlay: bool,

    /// Timeline entries the status overlay retains.
    pub timeline_retention: usize,

    /// Per-tab cap on the stop acknowledgment.
    pub stop_ack_timeout: Duration,

    /// Wait after the last tab resolves for final in-flight messages.
    pub stop_grace_period: Duration,

    /// How long after a click a tab update still counts as its navigation.
    pub navigation_enrich_window: Duration,

    /// Minimum spacing between two navigation enrichments.
    pub navigation_enrich_min_gap: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            input_debounce: Duration::from_millis(800),
            batch_interval: Duration::from_millis(100),
            scroll_debounce: Duration::from_millis(350),
            double_click_window: Duration::from_millis(300),
            sensitive_input_types: ["password".to_string()].into_iter().collect(),
            redact_all_inputs: false,
            hover_overlay: false,
            timeline_retention: 30,
            stop_ack_timeout: Duration::from_millis(3000),
            stop_grace_period: Duration::from_millis(100),
            navigation_enrich_window: Duration::from_secs(5),
            navigation_enrich_min_gap: Duration::from_millis(500),
        }
    }
}

/// Recording status of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Idle,
    Recording,
    Paused,
    Stopping,
}

/// Where a frame's steps go: top frames talk to the coordinator, child
/// frames post envelopes to their top window.
#[derive(Debug, Clone)]
pub enum FrameRole {
    Top(CoordinatorLink),
    Child { top: FrameSender },
}

/// Handle to an installed per-frame recorder.
pub struct FrameRecorder {
    window: WindowId,
    tx: FrameSender,
    steps_tx: broadcast::Sender<Step>,
    _task: JoinHandle<()>,
}

impl FrameRecorder {
    /// Installs the recorder into a document. Installation is idempotent:
    /// a second injection into the same document is a safe no-op and
    /// returns `None`.
    pub fn install(doc: &Document, config: RecorderConfig, role: FrameRole) -> Option<FrameRecorder> {
        if !doc.mark_recorder_installed() {
            warn!(window = ?doc.window_id(), "recorder already installed, skipping");
            return None;
        }
        info!(window = ?doc.window_id(), href = %doc.href(), "installing recorder");

        let (tx, rx) = mpsc::channel(256);
        let (steps_tx, _) = broadcast::channel(128);

        let engine = FrameEngine::new(doc, config, role, steps_tx.clone());
        let task = tokio::spawn(frame::run(engine, rx));

        Some(FrameRecorder {
            window: doc.window_id(),
            tx,
            steps_tx,
            _task: task,
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window
    }

    /// The frame's inbox. Raw events and control commands ride the same
    /// ordered channel, so an event dispatched before a command is always
    /// processed before it.
    pub fn sender(&self) -> FrameSender {
        self.tx.clone()
    }

    /// Live stream of steps as this frame records them.
    pub fn watch_steps(&self) -> broadcast::Receiver<Step> {
        self.steps_tx.subscribe()
    }

    /// [`watch_steps`](Self::watch_steps) as a lag-tolerant `Stream`.
    pub fn step_stream(&self) -> impl tokio_stream::Stream<Item = Step> {
        use tokio_stream::StreamExt;
        tokio_stream::wrappers::BroadcastStream::new(self.steps_tx.subscribe())
            .filter_map(|item| item.ok())
    }

    /// Dispatches one raw event, dropping it if the recorder is gone.
    pub async fn dispatch(&self, event: PageEvent) {
        let _ = self.tx.send(FrameMessage::Event(event)).await;
    }
}
