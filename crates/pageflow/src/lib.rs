//! Document model, selector engine and flow data model for the pageflow
//! recorder.
//!
//! This crate is the pure analysis layer: it knows how to describe elements
//! (selectors, refs) and how to hold a recorded [`Flow`], but it never listens
//! to events. The stateful recording runtime lives in `pageflow-recorder`.

pub mod css;
pub mod dom;
pub mod errors;
pub mod flow;
pub mod selector;

pub use dom::{Document, Element, Rect, WeakElement, WindowId};
pub use errors::{RecorderError, Result};
pub use flow::{
    mint_step_id, now_ms, AfterHints, Candidate, CandidateKind, FillValue, Flow, FlowMeta,
    FrameTarget, Offset, ScrollMode, Step, StepAction, Target, VariableDef,
};
pub use selector::SelectorEngine;
