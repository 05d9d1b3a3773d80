//! The per-frame recording engine: event normalization, step synthesis,
//! batching, cross-frame aggregation and the content side of the stop
//! barrier.

use tokio::sync::{broadcast, oneshot};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, warn};

use pageflow::{
    mint_step_id, Candidate, CandidateKind, Document, Element, FillValue, Offset, ScrollMode,
    SelectorEngine, Step, StepAction, Target, VariableDef, WeakElement, WindowId,
};

use crate::events::{KeyInput, MouseButton, PageEvent, ScrollSource};
use crate::messages::{
    ControlMessage, ControlReply, DataMessage, FrameEnvelope, FrameMessage, FrameReceiver,
    StopStats, RR_IFRAME_EVENT,
};
use crate::overlay::Overlay;
use crate::recorder::{FrameRole, RecorderConfig, RecorderStatus};

struct PendingClick {
    step: Step,
    due: Instant,
}

struct PendingFill {
    step: Step,
    node: WeakElement,
    sensitive: bool,
    due: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrollKey {
    Document,
    Node(u64),
}

struct PendingScroll {
    key: ScrollKey,
    target: Option<WeakElement>,
    offset: Offset,
    due: Instant,
}

pub(crate) struct FrameEngine {
    doc: Document,
    cfg: RecorderConfig,
    role: FrameRole,
    status: RecorderStatus,
    selectors: SelectorEngine,
    overlay: Overlay,

    session_steps: Vec<Step>,
    session_vars: Vec<VariableDef>,
    batch: Vec<Step>,
    batch_due: Option<Instant>,

    pending_click: Option<PendingClick>,
    pending_fill: Option<PendingFill>,
    pending_scroll: Option<PendingScroll>,

    hover_target: Option<WeakElement>,
    hover_queued: bool,

    steps_tx: broadcast::Sender<Step>,
    var_counter: u64,
}

// Events and control commands share one inbox: a stop that arrives after an
// input can never overtake it, which is what the stop barrier's completeness
// guarantee rests on.
pub(crate) async fn run(mut engine: FrameEngine, mut inbox: FrameReceiver) {
    loop {
        let deadline = engine.next_deadline();
        let sleep_to = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
        tokio::select! {
            message = inbox.recv() => match message {
                Some(FrameMessage::Control(command, reply)) => {
                    engine.handle_control(command, reply).await
                }
                Some(FrameMessage::Event(event)) => engine.handle_event(event).await,
                None => break,
            },
            _ = sleep_until(sleep_to), if deadline.is_some() => {
                engine.on_timer(Instant::now()).await;
            }
        }
    }
}

impl FrameEngine {
    pub(crate) fn new(
        doc: &Document,
        cfg: RecorderConfig,
        role: FrameRole,
        steps_tx: broadcast::Sender<Step>,
    ) -> Self {
        let overlay = Overlay::new(doc, cfg.timeline_retention);
        FrameEngine {
            doc: doc.clone(),
            selectors: SelectorEngine::new(doc),
            overlay,
            cfg,
            role,
            status: RecorderStatus::Idle,
            session_steps: Vec::new(),
            session_vars: Vec::new(),
            batch: Vec::new(),
            batch_due: None,
            pending_click: None,
            pending_fill: None,
            pending_scroll: None,
            hover_target: None,
            hover_queued: false,
            steps_tx,
            var_counter: 0,
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.batch_due,
            self.pending_click.as_ref().map(|p| p.due),
            self.pending_fill.as_ref().map(|p| p.due),
            self.pending_scroll.as_ref().map(|p| p.due),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    async fn on_timer(&mut self, now: Instant) {
        if self.pending_click.as_ref().is_some_and(|p| p.due <= now) {
            self.flush_pending_click().await;
        }
        if self.pending_fill.as_ref().is_some_and(|p| p.due <= now) {
            // The fill step already carries its final value; the window just
            // closes so the next input starts a fresh step.
            self.pending_fill = None;
        }
        if self.pending_scroll.as_ref().is_some_and(|p| p.due <= now) {
            self.flush_pending_scroll().await;
        }
        if self.batch_due.is_some_and(|due| due <= now) {
            self.flush_batch().await;
        }
    }

    // ---- control ----------------------------------------------------------

    async fn handle_control(
        &mut self,
        message: ControlMessage,
        reply: oneshot::Sender<ControlReply>,
    ) {
        let response = match message {
            ControlMessage::Start { .. } => match self.status {
                RecorderStatus::Recording => ControlReply::Ok,
                RecorderStatus::Paused => {
                    self.status = RecorderStatus::Recording;
                    self.overlay.set_status("recording");
                    ControlReply::Ok
                }
                RecorderStatus::Idle => {
                    self.status = RecorderStatus::Recording;
                    self.overlay.install();
                    self.overlay.set_status("recording");
                    ControlReply::Ok
                }
                RecorderStatus::Stopping => ControlReply::Error {
                    error: "stop in progress".to_string(),
                },
            },
            ControlMessage::Pause => {
                if self.status == RecorderStatus::Recording {
                    self.finalize_pending_fill().await;
                    self.flush_pending_scroll().await;
                    self.flush_pending_click().await;
                    self.flush_batch().await;
                    self.status = RecorderStatus::Paused;
                    self.overlay.set_status("paused");
                    ControlReply::Ok
                } else {
                    ControlReply::Error {
                        error: "not recording".to_string(),
                    }
                }
            }
            ControlMessage::Resume => {
                if self.status == RecorderStatus::Paused {
                    self.status = RecorderStatus::Recording;
                    self.overlay.set_status("recording");
                    ControlReply::Ok
                } else {
                    ControlReply::Error {
                        error: "not paused".to_string(),
                    }
                }
            }
            ControlMessage::Stop { .. } => {
                let (ack, stats) = self.stop_barrier().await;
                ControlReply::StopAck { ack, stats }
            }
            ControlMessage::TimelineUpdate { steps } => {
                if self.status == RecorderStatus::Recording {
                    self.overlay.set_timeline(&steps);
                }
                ControlReply::Ok
            }
            ControlMessage::Ping => ControlReply::Pong,
        };
        let _ = reply.send(response);
    }

    /// The content side of the stop barrier. Drains every pending buffer,
    /// flushes, and acks only if both sends were acknowledged.
    async fn stop_barrier(&mut self) -> (bool, StopStats) {
        if self.status == RecorderStatus::Idle {
            return (true, StopStats::default());
        }
        // No new events enter the buffer from here on.
        self.status = RecorderStatus::Stopping;

        self.finalize_pending_fill().await;
        self.flush_pending_scroll().await;
        self.flush_pending_click().await;

        self.batch_due = None;
        self.hover_queued = false;
        self.hover_target = None;

        let steps_acked = self.flush_batch().await;
        let vars_acked = self.send_variables().await;

        let stats = StopStats {
            steps: self.session_steps.len(),
            variables: self.session_vars.len(),
        };

        self.overlay.remove();
        self.session_steps.clear();
        self.session_vars.clear();
        self.batch.clear();
        self.var_counter = 0;
        self.status = RecorderStatus::Idle;

        (steps_acked && vars_acked, stats)
    }

    // ---- raw events -------------------------------------------------------

    async fn handle_event(&mut self, event: PageEvent) {
        if self.status != RecorderStatus::Recording {
            return;
        }
        match event {
            PageEvent::Click {
                target,
                button,
                detail,
            } => self.on_click(target, button, detail).await,
            PageEvent::FocusIn { target } => self.doc.set_focus(Some(&target)),
            PageEvent::FocusOut { target } => {
                if self
                    .doc
                    .deep_active_element()
                    .is_some_and(|el| el.same(&target))
                {
                    self.doc.set_focus(None);
                }
            }
            PageEvent::Input {
                target,
                is_composing,
            } => self.on_input(target, is_composing).await,
            PageEvent::Change { target } => self.on_change(target).await,
            PageEvent::Scroll { source } => self.on_scroll(source).await,
            PageEvent::KeyDown { input } => self.on_keydown(input).await,
            PageEvent::KeyUp { .. } => {}
            PageEvent::MouseMove { target } => self.on_mouse_move(target),
            PageEvent::FrameMessage {
                source,
                origin,
                data,
            } => self.on_frame_message(source, origin, data).await,
        }
    }

    async fn on_click(&mut self, target: Element, button: MouseButton, detail: u32) {
        if button != MouseButton::Left {
            return;
        }
        if self.overlay.contains(&target) {
            return;
        }
        // Checkbox/radio clicks would duplicate the change event.
        if is_toggle_input(&target) {
            return;
        }

        if detail >= 2 {
            self.pending_click = None;
            let step = Step::new(StepAction::Dblclick {
                target: self.target_for(&target),
            });
            self.emit(step).await;
            return;
        }

        if let Some(link) = blank_link(&target) {
            self.flush_pending_click().await;
            let url = self.resolve_href(&link);
            self.emit(Step::new(StepAction::OpenTab { url: url.clone() }))
                .await;
            self.emit(Step::new(StepAction::SwitchTab { url_contains: url }))
                .await;
            return;
        }

        self.flush_pending_click().await;
        let step = Step::new(StepAction::Click {
            target: self.target_for(&target),
        });
        self.pending_click = Some(PendingClick {
            step,
            due: Instant::now() + self.cfg.double_click_window,
        });
    }

    async fn flush_pending_click(&mut self) {
        if let Some(pending) = self.pending_click.take() {
            self.emit(pending.step).await;
        }
    }

    async fn on_input(&mut self, target: Element, is_composing: bool) {
        if is_composing {
            return;
        }
        let Some(el) = self.resolve_input_target(&target) else {
            return;
        };

        // Merge into the open debounce window for the same element (matched
        // by node identity, or by primary selector for re-created nodes).
        let el_selector = self.selectors.build_target(&el).selector;
        let mut merged = None;
        if let Some(pending) = &mut self.pending_fill {
            let same_node = pending.node.upgrade().is_some_and(|n| n.same(&el));
            let same_selector = pending
                .step
                .target()
                .is_some_and(|t| t.selector == el_selector);
            if same_node || same_selector {
                pending.due = Instant::now() + self.cfg.input_debounce;
                if !pending.sensitive {
                    let value = read_fill_value(&el);
                    if let StepAction::Fill { value: v, .. } = &mut pending.step.action {
                        *v = FillValue::Text(value);
                    }
                }
                merged = Some(pending.step.clone());
            }
        }
        if let Some(updated) = merged {
            self.emit(updated).await;
            return;
        }

        let sensitive = self.is_sensitive(&el);
        let value = if sensitive {
            let key = self.variable_key(&el);
            self.record_variable(VariableDef {
                key: key.clone(),
                sensitive: true,
                default: String::new(),
            });
            FillValue::Text(format!("{{{key}}}"))
        } else {
            FillValue::Text(read_fill_value(&el))
        };

        let step = Step::new(StepAction::Fill {
            target: self.target_for(&el),
            value,
        });
        self.pending_fill = Some(PendingFill {
            step: step.clone(),
            node: el.downgrade(),
            sensitive,
            due: Instant::now() + self.cfg.input_debounce,
        });
        self.emit(step).await;
    }

    /// Closes the fill window, refreshing the value from the element when it
    /// is still attached. Sensitive fills keep their placeholder.
    async fn finalize_pending_fill(&mut self) {
        if let Some(mut pending) = self.pending_fill.take() {
            if !pending.sensitive {
                if let Some(el) = pending.node.upgrade() {
                    if el.attached() {
                        if let StepAction::Fill { value, .. } = &mut pending.step.action {
                            *value = FillValue::Text(read_fill_value(&el));
                        }
                        self.emit(pending.step).await;
                    }
                }
            }
        }
    }

    async fn on_change(&mut self, target: Element) {
        match target.tag() {
            "select" => {
                let step = Step::new(StepAction::Fill {
                    target: self.target_for(&target),
                    value: FillValue::Text(target.value()),
                });
                self.emit(step).await;
            }
            "input" => match target.attr("type").as_deref() {
                Some("checkbox") | Some("radio") => {
                    let step = Step::new(StepAction::Fill {
                        target: self.target_for(&target),
                        value: FillValue::Flag(target.checked()),
                    });
                    self.emit(step).await;
                }
                Some("file") => {
                    let key = self.variable_key(&target);
                    self.record_variable(VariableDef {
                        key: key.clone(),
                        sensitive: false,
                        default: target.value(),
                    });
                    let step = Step::new(StepAction::Fill {
                        target: self.target_for(&target),
                        value: FillValue::Text(format!("{{{key}}}")),
                    });
                    self.emit(step).await;
                }
                _ => {}
            },
            _ => {}
        }
    }

    async fn on_scroll(&mut self, source: ScrollSource) {
        if let ScrollSource::Container(el) = &source {
            if self.overlay.contains(el) {
                return;
            }
        }
        let (key, target, offset) = match &source {
            ScrollSource::Document => (ScrollKey::Document, None, self.doc.scroll_offset()),
            ScrollSource::Container(el) => (
                ScrollKey::Node(el.node_id()),
                Some(el.downgrade()),
                el.scroll_offset(),
            ),
        };

        let same_source = matches!(&self.pending_scroll, Some(p) if p.key == key);
        if same_source {
            if let Some(pending) = &mut self.pending_scroll {
                pending.offset = offset;
                pending.due = Instant::now() + self.cfg.scroll_debounce;
            }
        } else {
            self.flush_pending_scroll().await;
            self.pending_scroll = Some(PendingScroll {
                key,
                target,
                offset,
                due: Instant::now() + self.cfg.scroll_debounce,
            });
        }
    }

    async fn flush_pending_scroll(&mut self) {
        if let Some(pending) = self.pending_scroll.take() {
            let action = match pending.key {
                ScrollKey::Document => StepAction::Scroll {
                    mode: ScrollMode::Offset,
                    offset: pending.offset,
                    target: None,
                },
                ScrollKey::Node(_) => {
                    let Some(el) = pending.target.as_ref().and_then(WeakElement::upgrade) else {
                        return;
                    };
                    StepAction::Scroll {
                        mode: ScrollMode::Container,
                        offset: pending.offset,
                        target: Some(self.target_for(&el)),
                    }
                }
            };
            self.emit(Step::new(action)).await;
        }
    }

    async fn on_keydown(&mut self, input: KeyInput) {
        if input.repeat || is_modifier_key(&input.key) {
            return;
        }
        let active = self.doc.deep_active_element();
        let editable = active.as_ref().filter(|el| is_editable(el));

        if let Some(el) = editable {
            let el = el.clone();
            match input.key.as_str() {
                "Enter" => {
                    self.finalize_pending_fill().await;
                    let step = Step::new(StepAction::Key {
                        keys: format_combo(&input),
                        target: Some(self.target_for(&el)),
                    });
                    self.emit(step).await;
                }
                // Tab completes the fill and leaves the field.
                "Tab" => {
                    self.finalize_pending_fill().await;
                    let step = Step::new(StepAction::Key {
                        keys: format_combo(&input),
                        target: None,
                    });
                    self.emit(step).await;
                }
                _ => {}
            }
            return;
        }

        let named = matches!(input.key.as_str(), "Enter" | "Escape" | "Tab");
        if named || input.ctrl || input.alt || input.shift || input.meta {
            let step = Step::new(StepAction::Key {
                keys: format_combo(&input),
                target: None,
            });
            self.emit(step).await;
        }
    }

    fn on_mouse_move(&mut self, target: Element) {
        if !self.cfg.hover_overlay || self.overlay.contains(&target) {
            return;
        }
        // Single queued frame: the latest target wins, one update per turn.
        self.hover_target = Some(target.downgrade());
        if !self.hover_queued {
            self.hover_queued = true;
            self.flush_hover();
        }
    }

    fn flush_hover(&mut self) {
        self.hover_queued = false;
        if let Some(el) = self.hover_target.take().and_then(|w| w.upgrade()) {
            match el.bounding_rect() {
                Ok(rect) => self.overlay.track(rect),
                Err(e) => debug!("hover rect unavailable: {e}"),
            }
        }
    }

    // ---- cross-frame aggregation ------------------------------------------

    async fn on_frame_message(
        &mut self,
        source: WindowId,
        origin: String,
        data: serde_json::Value,
    ) {
        if !matches!(self.role, FrameRole::Top(_)) {
            return;
        }
        let envelope: FrameEnvelope = match serde_json::from_value(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("dropping malformed frame message: {e}");
                return;
            }
        };
        if envelope.kind != RR_IFRAME_EVENT {
            return;
        }

        // Authenticate: the sender must be the content window of one of our
        // child frame elements.
        let Some(frame_el) = self
            .doc
            .frame_elements()
            .into_iter()
            .find(|f| {
                f.content_document()
                    .is_some_and(|d| d.window_id() == source)
            })
        else {
            warn!(?source, "rejected frame message from unknown source");
            return;
        };
        let frame_doc = match frame_el.content_document() {
            Some(doc) => doc,
            None => return,
        };
        if frame_doc.origin() == self.doc.origin()
            && origin != self.doc.origin()
            && origin != "null"
        {
            warn!(%origin, "rejected same-origin frame message with mismatched origin");
            return;
        }

        let mut step = envelope.payload.step;
        if step.id.is_empty() {
            step.id = mint_step_id();
        }
        if let Some(target) = step.target_mut() {
            let frame_target = self.selectors.build_target(&frame_el);
            let composite = format!("{} |> {}", frame_target.selector, target.selector);
            target.candidates.insert(
                0,
                Candidate {
                    kind: CandidateKind::Css,
                    value: composite.clone(),
                },
            );
            target.selector = composite;
            // A ref never leaks across frames.
            target.elem_ref = None;
        }
        self.push_local(step);
    }

    // ---- buffer, batching, transport --------------------------------------

    async fn emit(&mut self, step: Step) {
        let top = match &self.role {
            FrameRole::Child { top } => Some(top.clone()),
            FrameRole::Top(_) => None,
        };
        match top {
            // Child frames forward and never touch the local buffer.
            Some(top) => {
                let envelope = FrameEnvelope::new(self.doc.href(), step);
                let data = match serde_json::to_value(&envelope) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("failed to encode frame envelope: {e}");
                        return;
                    }
                };
                let message = PageEvent::FrameMessage {
                    source: self.doc.window_id(),
                    origin: self.doc.origin().to_string(),
                    data,
                };
                if top.send(FrameMessage::Event(message)).await.is_err() {
                    warn!("top window unreachable, step dropped");
                }
            }
            None => self.push_local(step),
        }
    }

    /// Appends into the session buffer with upsert semantics, coalescing
    /// adjacent scrolls on the same source, and enqueues for the next batch.
    fn push_local(&mut self, step: Step) {
        if let StepAction::Scroll { mode, offset, target } = &step.action {
            let merged = match self.session_steps.last_mut() {
                Some(last) => match &mut last.action {
                    StepAction::Scroll {
                        mode: last_mode,
                        offset: last_offset,
                        target: last_target,
                    } => {
                        let same_target = match (target, &*last_target) {
                            (None, None) => true,
                            (Some(a), Some(b)) => a.selector == b.selector,
                            _ => false,
                        };
                        if same_target && *last_mode == *mode {
                            *last_offset = *offset;
                            true
                        } else {
                            false
                        }
                    }
                    _ => false,
                },
                None => false,
            };
            if merged {
                if let Some(updated) = self.session_steps.last().cloned() {
                    self.upsert_batch(updated.clone());
                    let _ = self.steps_tx.send(updated);
                    self.ensure_batch_deadline();
                }
                return;
            }
        }

        match self.session_steps.iter().position(|s| s.id == step.id) {
            Some(i) => self.session_steps[i] = step.clone(),
            None => {
                self.session_steps.push(step.clone());
                self.overlay.push_entry(step.type_name());
            }
        }
        self.upsert_batch(step.clone());
        let _ = self.steps_tx.send(step);
        self.ensure_batch_deadline();
    }

    fn upsert_batch(&mut self, step: Step) {
        match self.batch.iter().position(|s| s.id == step.id) {
            Some(i) => self.batch[i] = step,
            None => self.batch.push(step),
        }
    }

    fn ensure_batch_deadline(&mut self) {
        if self.batch_due.is_none() {
            self.batch_due = Some(Instant::now() + self.cfg.batch_interval);
        }
    }

    async fn flush_batch(&mut self) -> bool {
        self.batch_due = None;
        if self.batch.is_empty() {
            return true;
        }
        let steps = std::mem::take(&mut self.batch);
        match &self.role {
            FrameRole::Top(link) => link.send(DataMessage::Steps { steps }).await,
            FrameRole::Child { .. } => true,
        }
    }

    async fn send_variables(&mut self) -> bool {
        if self.session_vars.is_empty() {
            return true;
        }
        match &self.role {
            FrameRole::Top(link) => {
                link.send(DataMessage::Variables {
                    variables: self.session_vars.clone(),
                })
                .await
            }
            FrameRole::Child { .. } => true,
        }
    }

    // ---- helpers ----------------------------------------------------------

    fn target_for(&self, el: &Element) -> Target {
        let mut target = self.selectors.build_target(el);
        target.elem_ref = Some(self.selectors.ref_for(el));
        target
    }

    fn is_sensitive(&self, el: &Element) -> bool {
        if self.cfg.redact_all_inputs {
            return true;
        }
        el.attr("type")
            .is_some_and(|t| self.cfg.sensitive_input_types.contains(&t))
    }

    fn variable_key(&mut self, el: &Element) -> String {
        if let Some(existing) = self
            .session_vars
            .iter()
            .find(|v| {
                el.attr("name").as_deref() == Some(v.key.as_str())
                    || el.id_attr().as_deref() == Some(v.key.as_str())
            })
            .map(|v| v.key.clone())
        {
            return existing;
        }
        el.attr("name")
            .filter(|n| !n.is_empty())
            .or_else(|| el.id_attr())
            .unwrap_or_else(|| {
                let key = format!("field_{}", self.var_counter);
                self.var_counter += 1;
                key
            })
    }

    fn record_variable(&mut self, var: VariableDef) {
        match self.session_vars.iter_mut().find(|v| v.key == var.key) {
            Some(existing) => *existing = var,
            None => self.session_vars.push(var),
        }
    }

    fn resolve_input_target(&self, target: &Element) -> Option<Element> {
        if is_editable(target) {
            return Some(target.clone());
        }
        // Composed event retargeted to a shadow host: the real editable is on
        // the composed path below it.
        if target.shadow_root().is_some() {
            if let Some(inner) = self.doc.deep_active_element() {
                if is_editable(&inner) && inner.composed_path().iter().any(|n| n.same(target)) {
                    return Some(inner);
                }
            }
        }
        // Fallback: deep active-element traversal through shadow roots.
        let deep = self.doc.deep_active_element()?;
        is_editable(&deep).then_some(deep)
    }

    fn resolve_href(&self, link: &Element) -> String {
        let href = link.attr("href").unwrap_or_default();
        match url::Url::parse(&self.doc.href()).and_then(|base| base.join(&href)) {
            Ok(abs) => abs.to_string(),
            Err(_) => href,
        }
    }
}

fn is_toggle_input(el: &Element) -> bool {
    el.tag() == "input"
        && matches!(
            el.attr("type").as_deref(),
            Some("checkbox") | Some("radio")
        )
}

fn is_editable(el: &Element) -> bool {
    if el
        .attr("contenteditable")
        .is_some_and(|v| v != "false")
    {
        return true;
    }
    match el.tag() {
        "textarea" => true,
        "input" => !matches!(
            el.attr("type").as_deref(),
            Some("checkbox") | Some("radio") | Some("file") | Some("button") | Some("submit")
        ),
        _ => false,
    }
}

fn is_contenteditable(el: &Element) -> bool {
    el.attr("contenteditable").is_some_and(|v| v != "false")
}

fn read_fill_value(el: &Element) -> String {
    if is_contenteditable(el) {
        el.inner_text()
    } else {
        el.value()
    }
}

/// The anchor with `target="_blank"` on the click path, if any.
fn blank_link(el: &Element) -> Option<Element> {
    el.composed_path().into_iter().find(|node| {
        node.tag() == "a"
            && node.attr("target").as_deref() == Some("_blank")
            && node.attr("href").is_some()
    })
}

fn is_modifier_key(key: &str) -> bool {
    matches!(key, "Control" | "Alt" | "Shift" | "Meta")
}

/// Formats `[Ctrl+][Alt+][Shift+][Meta+]<Key>`; `Escape` becomes `Esc`,
/// space becomes `Space`, single letters are uppercased.
pub(crate) fn format_combo(input: &KeyInput) -> String {
    let mut combo = String::new();
    if input.ctrl {
        combo.push_str("Ctrl+");
    }
    if input.alt {
        combo.push_str("Alt+");
    }
    if input.shift {
        combo.push_str("Shift+");
    }
    if input.meta {
        combo.push_str("Meta+");
    }
    combo.push_str(&normalize_key(&input.key));
    combo
}

fn normalize_key(key: &str) -> String {
    match key {
        "Escape" => "Esc".to_string(),
        " " | "Spacebar" => "Space".to_string(),
        k if k.chars().count() == 1 && k.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) => {
            k.to_ascii_uppercase()
        }
        k => k.to_string(),
    }
}
