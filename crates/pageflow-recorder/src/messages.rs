//! Message types exchanged between the coordinator, the per-frame recorders
//! and child frames, plus the ack transport they ride on.
//!
//! Commands are tagged enums over a finite set; unknown shapes fail to parse
//! instead of being dispatched on open strings. Every request/reply pair
//! carries a oneshot sender, and transport failures degrade to a boolean
//! result rather than an error crossing a listener boundary.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use pageflow::{RecorderError, Result, Step, VariableDef};

use crate::events::PageEvent;

/// Envelope type tag for cross-frame forwarding.
pub const RR_IFRAME_EVENT: &str = "rr_iframe_event";

/// `postMessage` envelope a child frame posts to its top window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: FramePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePayload {
    pub href: String,
    pub step: Step,
}

impl FrameEnvelope {
    pub fn new(href: String, step: Step) -> Self {
        FrameEnvelope {
            kind: RR_IFRAME_EVENT.to_string(),
            payload: FramePayload { href, step },
        }
    }
}

/// Identity a flow can be started under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Coordinator → content commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlMessage {
    #[serde(rename_all = "camelCase")]
    Start {
        meta: RecordingMeta,
        session_id: u64,
    },
    Pause,
    Resume,
    #[serde(rename_all = "camelCase")]
    Stop {
        session_id: u64,
        require_ack: bool,
    },
    /// UI broadcast of the authoritative timeline; ignored unless recording.
    TimelineUpdate {
        steps: Vec<Step>,
    },
    Ping,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopStats {
    pub steps: usize,
    pub variables: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlReply {
    Ok,
    Pong,
    StopAck { ack: bool, stats: StopStats },
    Error { error: String },
}

/// Content → coordinator data messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataMessage {
    Steps { steps: Vec<Step> },
    Variables { variables: Vec<VariableDef> },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DataReply {
    pub ok: bool,
}

/// Identity of a participating tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u32);

/// One item on a frame's inbox. Raw events and control commands share a
/// single ordered queue: a command sent after an event is processed after
/// it, the way a page's event loop serializes dispatch. This is what makes
/// the stop barrier complete — an input that fired before stop is always
/// drained before the barrier runs.
#[derive(Debug)]
pub enum FrameMessage {
    Event(PageEvent),
    Control(ControlMessage, oneshot::Sender<ControlReply>),
}

pub type FrameSender = mpsc::Sender<FrameMessage>;
pub type FrameReceiver = mpsc::Receiver<FrameMessage>;

/// Sends a control message and awaits its reply.
pub async fn send_control(tx: &FrameSender, message: ControlMessage) -> Result<ControlReply> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(FrameMessage::Control(message, reply_tx))
        .await
        .map_err(|_| RecorderError::Transport("frame channel closed".to_string()))?;
    reply_rx
        .await
        .map_err(|_| RecorderError::Transport("control reply dropped".to_string()))
}

/// A data message in flight from one tab's recorder to the coordinator.
#[derive(Debug)]
pub struct DataEnvelope {
    pub from: TabId,
    pub message: DataMessage,
    pub reply: oneshot::Sender<DataReply>,
}

/// The content side of the data channel. `send` resolves `true` on an ok
/// reply and `false` on any transport failure; it never errors.
#[derive(Debug, Clone)]
pub struct CoordinatorLink {
    from: TabId,
    tx: mpsc::Sender<DataEnvelope>,
}

impl CoordinatorLink {
    pub fn new(from: TabId, tx: mpsc::Sender<DataEnvelope>) -> Self {
        CoordinatorLink { from, tx }
    }

    pub fn tab(&self) -> TabId {
        self.from
    }

    pub async fn send(&self, message: DataMessage) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = DataEnvelope {
            from: self.from,
            message,
            reply: reply_tx,
        };
        if self.tx.send(envelope).await.is_err() {
            warn!(tab = self.from.0, "data send failed: coordinator gone");
            return false;
        }
        match reply_rx.await {
            Ok(reply) => reply.ok,
            Err(_) => {
                warn!(tab = self.from.0, "data reply dropped");
                false
            }
        }
    }
}
