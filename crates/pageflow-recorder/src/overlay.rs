//! Recording status overlay.
//!
//! A small chrome the recorder owns inside the page: a status panel showing
//! the most recent timeline entries, and a pointer-events-none hover box that
//! tracks the element under the cursor. The overlay never emits steps, and
//! scrolls originating inside it are discarded by the recorder.

use std::collections::VecDeque;

use pageflow::{Document, Element, Rect, Step};

pub const STATUS_OVERLAY_ID: &str = "rr-status-overlay";
pub const HOVER_BOX_ID: &str = "rr-hover-box";

pub(crate) struct Overlay {
    doc: Document,
    retention: usize,
    panel: Option<Element>,
    hover_box: Option<Element>,
    entries: VecDeque<String>,
}

impl Overlay {
    pub fn new(doc: &Document, retention: usize) -> Self {
        Overlay {
            doc: doc.clone(),
            retention,
            panel: None,
            hover_box: None,
            entries: VecDeque::new(),
        }
    }

    pub fn install(&mut self) {
        if self.panel.is_some() {
            return;
        }
        let panel = Element::new("div");
        panel.set_attr("id", STATUS_OVERLAY_ID);
        panel.set_attr("data-status", "idle");
        self.doc.body().append_child(&panel);
        self.panel = Some(panel);

        let hover = Element::new("div");
        hover.set_attr("id", HOVER_BOX_ID);
        hover.set_attr("style", "pointer-events:none");
        self.doc.body().append_child(&hover);
        self.hover_box = Some(hover);
    }

    pub fn set_status(&self, status: &str) {
        if let Some(panel) = &self.panel {
            panel.set_attr("data-status", status);
        }
    }

    /// Appends one timeline entry, keeping only the most recent ones.
    pub fn push_entry(&mut self, label: &str) {
        self.entries.push_back(label.to_string());
        while self.entries.len() > self.retention {
            self.entries.pop_front();
        }
        self.render();
    }

    /// Replaces the timeline with the broadcast authoritative one.
    pub fn set_timeline(&mut self, steps: &[Step]) {
        self.entries = steps
            .iter()
            .rev()
            .take(self.retention)
            .rev()
            .map(|s| s.type_name().to_string())
            .collect();
        self.render();
    }

    fn render(&self) {
        if let Some(panel) = &self.panel {
            let lines: Vec<&str> = self.entries.iter().map(String::as_str).collect();
            panel.set_text(&lines.join("\n"));
        }
    }

    pub fn track(&self, rect: Rect) {
        if let Some(hover) = &self.hover_box {
            hover.set_rect(rect);
        }
    }

    /// Whether an element lives inside the overlay chrome, checked over the
    /// composed path so shadow-wrapped descendants are caught too.
    pub fn contains(&self, el: &Element) -> bool {
        el.composed_path().iter().any(|node| {
            matches!(
                node.id_attr().as_deref(),
                Some(STATUS_OVERLAY_ID) | Some(HOVER_BOX_ID)
            )
        })
    }

    pub fn remove(&mut self) {
        if let Some(panel) = self.panel.take() {
            panel.detach();
        }
        if let Some(hover) = self.hover_box.take() {
            hover.detach();
        }
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow::StepAction;

    #[test]
    fn test_timeline_retention() {
        let doc = Document::new("https://example.com/");
        let mut overlay = Overlay::new(&doc, 3);
        overlay.install();

        for i in 0..5 {
            overlay.push_entry(&format!("entry-{i}"));
        }
        assert_eq!(overlay.entries(), vec!["entry-2", "entry-3", "entry-4"]);

        let steps: Vec<Step> = (0..4)
            .map(|_| {
                Step::new(StepAction::Navigate {
                    url: "https://example.com/".to_string(),
                })
            })
            .collect();
        overlay.set_timeline(&steps);
        assert_eq!(overlay.entries().len(), 3);
    }

    #[test]
    fn test_contains_matches_chrome_only() {
        let doc = Document::new("https://example.com/");
        let mut overlay = Overlay::new(&doc, 30);
        overlay.install();

        let panel = doc
            .body()
            .subtree()
            .into_iter()
            .find(|el| el.id_attr().as_deref() == Some(STATUS_OVERLAY_ID))
            .unwrap();
        let inner = Element::new("span");
        panel.append_child(&inner);
        assert!(overlay.contains(&inner));

        let outside = Element::new("div");
        doc.body().append_child(&outside);
        assert!(!overlay.contains(&outside));
    }

    #[test]
    fn test_remove_detaches_chrome() {
        let doc = Document::new("https://example.com/");
        let mut overlay = Overlay::new(&doc, 30);
        overlay.install();
        overlay.remove();
        assert!(doc
            .body()
            .subtree()
            .iter()
            .all(|el| el.id_attr().as_deref() != Some(STATUS_OVERLAY_ID)));
    }
}
