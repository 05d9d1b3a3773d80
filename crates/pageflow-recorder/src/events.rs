//! Raw page events.
//!
//! These are the capture-phase observations a host document feeds into a
//! [`FrameRecorder`](crate::FrameRecorder): low-level, noisy, and ordered the
//! way they fired. The recorder normalizes them into semantic steps.

use pageflow::{Element, WindowId};

/// Represents the type of mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// One keyboard event with its modifier state.
#[derive(Debug, Clone)]
pub struct KeyInput {
    /// DOM key value (`"a"`, `"Enter"`, `"Escape"`, ...).
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    /// Auto-repeat while held down.
    pub repeat: bool,
}

impl KeyInput {
    pub fn plain(key: &str) -> Self {
        KeyInput {
            key: key.to_string(),
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
            repeat: false,
        }
    }
}

/// What scrolled: the document viewport or a scrollable container.
#[derive(Debug, Clone)]
pub enum ScrollSource {
    Document,
    Container(Element),
}

/// A raw event observed in one document.
#[derive(Debug, Clone)]
pub enum PageEvent {
    Click {
        target: Element,
        button: MouseButton,
        /// Click count as the browser reports it; 2+ means double-click.
        detail: u32,
    },
    FocusIn {
        target: Element,
    },
    FocusOut {
        target: Element,
    },
    Input {
        target: Element,
        /// IME composition in progress.
        is_composing: bool,
    },
    Change {
        target: Element,
    },
    Scroll {
        source: ScrollSource,
    },
    KeyDown {
        input: KeyInput,
    },
    KeyUp {
        input: KeyInput,
    },
    MouseMove {
        target: Element,
    },
    /// A `postMessage` arriving at the top window. `source` identifies the
    /// sending browsing context, `origin` its serialized origin; `data` is
    /// untrusted until the aggregator authenticates it.
    FrameMessage {
        source: WindowId,
        origin: String,
        data: serde_json::Value,
    },
}
