//! Interaction recorder producing replayable flows.
//!
//! This crate records user interactions with a live document (clicks, fills,
//! scrolls, key combos, tab and frame transitions) and normalizes them into
//! a compact [`pageflow::Flow`] another engine can replay. One
//! [`FrameRecorder`] lives per frame; a [`SessionCoordinator`] owns the
//! authoritative flow, the session state machine and the stop barrier that
//! guarantees no debounced input is lost when a session ends.

pub mod coordinator;
pub mod events;
pub mod messages;
pub mod overlay;
pub mod recorder;
pub mod store;

pub use coordinator::{SessionCoordinator, SessionStatus, StopOutcome};
pub use events::{KeyInput, MouseButton, PageEvent, ScrollSource};
pub use messages::{
    send_control, ControlMessage, ControlReply, CoordinatorLink, DataMessage, FrameEnvelope,
    FrameMessage, FrameSender, RecordingMeta, StopStats, TabId, RR_IFRAME_EVENT,
};
pub use overlay::{HOVER_BOX_ID, STATUS_OVERLAY_ID};
pub use recorder::{FrameRecorder, FrameRole, RecorderConfig, RecorderStatus};
pub use store::{FlowStore, JsonFileStore, MemoryFlowStore};
