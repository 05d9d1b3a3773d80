//! The session coordinator.
//!
//! Owns the authoritative [`Flow`], the recording-status state machine,
//! per-tab participation tracking, the stop barrier and the timeline
//! broadcast. The coordinator is a single-threaded actor: every mutation goes
//! through its command loop, and the stop/pause barriers run as spawned
//! sends so the loop keeps draining data messages while it waits for acks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

use pageflow::{Flow, RecorderError, Result, Step, StepAction};

use crate::messages::{
    send_control, ControlMessage, ControlReply, FrameSender, CoordinatorLink, DataEnvelope,
    DataMessage, DataReply, RecordingMeta, TabId,
};
use crate::recorder::RecorderConfig;
use crate::store::FlowStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Recording,
    Paused,
    Stopping,
}

/// What a completed stop returns: the finalized flow, and whether every
/// participating tab acknowledged the barrier in time.
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub flow: Flow,
    pub ack: bool,
}

struct TabConnection {
    control: FrameSender,
    url: Option<String>,
}

enum Command {
    RegisterTab {
        id: TabId,
        url: Option<String>,
        control: FrameSender,
    },
    SetActiveTab {
        id: TabId,
    },
    TabUpdated {
        id: TabId,
        url: String,
    },
    Start {
        meta: RecordingMeta,
        reply: oneshot::Sender<Result<u64>>,
    },
    Stop {
        reply: oneshot::Sender<Result<StopOutcome>>,
    },
    Pause {
        reply: oneshot::Sender<Result<()>>,
    },
    Resume {
        reply: oneshot::Sender<Result<()>>,
    },
    FinishStop {
        results: Vec<(TabId, bool)>,
    },
    FinishPause,
}

/// Handle to a spawned coordinator actor.
pub struct SessionCoordinator {
    cmd_tx: mpsc::Sender<Command>,
    data_tx: mpsc::Sender<DataEnvelope>,
    _task: JoinHandle<()>,
}

impl SessionCoordinator {
    pub fn spawn(store: Arc<dyn FlowStore>, cfg: RecorderConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (data_tx, data_rx) = mpsc::channel(256);
        let actor = Coordinator {
            cfg,
            store,
            session_id: 0,
            status: SessionStatus::Idle,
            origin_tab: None,
            flow: None,
            active_tabs: HashSet::new(),
            stopped_tabs: HashSet::new(),
            tabs: HashMap::new(),
            active_tab: None,
            last_click: None,
            last_enrichment: None,
            pending_stop: None,
            pending_pause: None,
            self_tx: cmd_tx.clone(),
            _data_keepalive: data_tx.clone(),
        };
        let task = tokio::spawn(actor.run(cmd_rx, data_rx));
        SessionCoordinator {
            cmd_tx,
            data_tx,
            _task: task,
        }
    }

    /// The data channel a tab's top-frame recorder reports on.
    pub fn data_link(&self, tab: TabId) -> CoordinatorLink {
        CoordinatorLink::new(tab, self.data_tx.clone())
    }

    /// Registers a tab's main-frame control channel. The first registered
    /// tab becomes the active one.
    pub async fn register_tab(&self, id: TabId, url: Option<String>, control: FrameSender) {
        let _ = self
            .cmd_tx
            .send(Command::RegisterTab { id, url, control })
            .await;
    }

    pub async fn set_active_tab(&self, id: TabId) {
        let _ = self.cmd_tx.send(Command::SetActiveTab { id }).await;
    }

    /// Feed of browser tab-update events (URL changes, loads).
    pub async fn tab_updated(&self, id: TabId, url: &str) {
        let _ = self
            .cmd_tx
            .send(Command::TabUpdated {
                id,
                url: url.to_string(),
            })
            .await;
    }

    pub async fn start(&self, meta: RecordingMeta) -> Result<u64> {
        self.request(|reply| Command::Start { meta, reply }).await
    }

    pub async fn stop(&self) -> Result<StopOutcome> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| Command::Resume { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| RecorderError::Transport("coordinator gone".to_string()))?;
        reply_rx
            .await
            .map_err(|_| RecorderError::Transport("coordinator reply dropped".to_string()))?
    }
}

struct Coordinator {
    cfg: RecorderConfig,
    store: Arc<dyn FlowStore>,
    session_id: u64,
    status: SessionStatus,
    origin_tab: Option<TabId>,
    flow: Option<Flow>,
    active_tabs: HashSet<TabId>,
    stopped_tabs: HashSet<TabId>,
    tabs: HashMap<TabId, TabConnection>,
    active_tab: Option<TabId>,
    last_click: Option<(String, Instant)>,
    last_enrichment: Option<Instant>,
    pending_stop: Option<oneshot::Sender<Result<StopOutcome>>>,
    pending_pause: Option<oneshot::Sender<Result<()>>>,
    self_tx: mpsc::Sender<Command>,
    // Keeps the data channel open even when no recorder link is alive.
    _data_keepalive: mpsc::Sender<DataEnvelope>,
}

impl Coordinator {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut data_rx: mpsc::Receiver<DataEnvelope>,
    ) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(envelope) = data_rx.recv() => self.handle_data(envelope),
            }
        }
    }

    fn can_accept_steps(&self) -> bool {
        matches!(self.status, SessionStatus::Recording | SessionStatus::Stopping)
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::RegisterTab { id, url, control } => {
                self.tabs.insert(id, TabConnection { control, url });
                if self.active_tab.is_none() {
                    self.active_tab = Some(id);
                }
            }
            Command::SetActiveTab { id } => {
                if self.tabs.contains_key(&id) {
                    self.active_tab = Some(id);
                } else {
                    warn!(tab = id.0, "cannot activate unregistered tab");
                }
            }
            Command::TabUpdated { id, url } => self.handle_tab_updated(id, url),
            Command::Start { meta, reply } => {
                let result = self.start_recording(meta).await;
                let _ = reply.send(result);
            }
            Command::Stop { reply } => self.begin_stop(reply),
            Command::Pause { reply } => self.begin_pause(reply),
            Command::Resume { reply } => {
                let _ = reply.send(self.resume_recording());
            }
            Command::FinishStop { results } => self.finish_stop(results),
            Command::FinishPause => {
                if self.status == SessionStatus::Recording {
                    self.status = SessionStatus::Paused;
                }
                if let Some(reply) = self.pending_pause.take() {
                    let _ = reply.send(Ok(()));
                }
            }
        }
    }

    // ---- data -------------------------------------------------------------

    fn handle_data(&mut self, envelope: DataEnvelope) {
        let accepted = self.can_accept_steps() && self.active_tabs.contains(&envelope.from);
        if !accepted {
            let _ = envelope.reply.send(DataReply { ok: false });
            return;
        }
        match envelope.message {
            DataMessage::Steps { steps } => self.append_steps(steps),
            DataMessage::Variables { variables } => {
                if let Some(flow) = &mut self.flow {
                    flow.append_variables(variables);
                }
            }
        }
        let _ = envelope.reply.send(DataReply { ok: true });
    }

    fn append_steps(&mut self, steps: Vec<Step>) {
        let now = Instant::now();
        for step in &steps {
            if matches!(
                step.action,
                StepAction::Click { .. } | StepAction::Dblclick { .. }
            ) {
                self.last_click = Some((step.id.clone(), now));
            }
        }
        if let Some(flow) = &mut self.flow {
            flow.append_steps(steps);
        }
        self.broadcast_timeline();
    }

    /// Pushes the full authoritative timeline to every participating tab so
    /// their overlays agree.
    fn broadcast_timeline(&self) {
        let Some(flow) = &self.flow else { return };
        let steps = flow.steps.clone();
        for id in &self.active_tabs {
            if let Some(conn) = self.tabs.get(id) {
                let control = conn.control.clone();
                let steps = steps.clone();
                tokio::spawn(async move {
                    let _ = send_control(&control, ControlMessage::TimelineUpdate { steps }).await;
                });
            }
        }
    }

    // ---- incidental browser events ----------------------------------------

    fn handle_tab_updated(&mut self, id: TabId, url: String) {
        if let Some(conn) = self.tabs.get_mut(&id) {
            conn.url = Some(url);
        }
        if self.status != SessionStatus::Recording || !self.active_tabs.contains(&id) {
            return;
        }
        // Heuristic: a tab update close after a click is treated as that
        // click's navigation, even when the page navigated on its own
        // (meta-refresh). Applies to clicks and double-clicks alike.
        let Some((step_id, at)) = &self.last_click else {
            return;
        };
        if at.elapsed() > self.cfg.navigation_enrich_window {
            return;
        }
        if self
            .last_enrichment
            .is_some_and(|e| e.elapsed() < self.cfg.navigation_enrich_min_gap)
        {
            return;
        }
        if let Some(flow) = &mut self.flow {
            if let Some(step) = flow.steps.iter_mut().find(|s| s.id == *step_id) {
                step.after.get_or_insert_with(Default::default).wait_for_navigation = true;
                self.last_enrichment = Some(Instant::now());
            }
        }
    }

    // ---- start ------------------------------------------------------------

    async fn start_recording(&mut self, meta: RecordingMeta) -> Result<u64> {
        if self.status != SessionStatus::Idle {
            return Err(RecorderError::AlreadyRecording);
        }
        let tab = self.active_tab.ok_or(RecorderError::NoActiveTab)?;
        let control = self
            .tabs
            .get(&tab)
            .map(|c| c.control.clone())
            .ok_or(RecorderError::NoActiveTab)?;

        let flow = Flow::new(meta.id, meta.name, meta.description);
        self.session_id += 1;
        self.status = SessionStatus::Recording;
        self.origin_tab = Some(tab);
        self.active_tabs.clear();
        self.active_tabs.insert(tab);
        self.stopped_tabs.clear();
        self.last_click = None;
        self.last_enrichment = None;

        // The recorder must already answer in the origin tab before the
        // session is announced.
        let ping = timeout(
            self.cfg.stop_ack_timeout,
            send_control(&control, ControlMessage::Ping),
        )
        .await;
        if !matches!(ping, Ok(Ok(ControlReply::Pong))) {
            self.reset_session();
            return Err(RecorderError::Transport(
                "recorder not reachable in origin tab".to_string(),
            ));
        }

        let start_meta = RecordingMeta {
            id: Some(flow.id.clone()),
            name: Some(flow.name.clone()),
            description: flow.description.clone(),
        };
        let started = timeout(
            self.cfg.stop_ack_timeout,
            send_control(
                &control,
                ControlMessage::Start {
                    meta: start_meta,
                    session_id: self.session_id,
                },
            ),
        )
        .await;
        if !matches!(started, Ok(Ok(ControlReply::Ok))) {
            self.reset_session();
            return Err(RecorderError::Transport(
                "recorder rejected start".to_string(),
            ));
        }

        info!(session = self.session_id, flow = %flow.id, "recording started");
        self.flow = Some(flow);

        if let Some(url) = self.tabs.get(&tab).and_then(|c| c.url.clone()) {
            self.append_steps(vec![Step::new(StepAction::Navigate { url })]);
            self.persist();
        }
        Ok(self.session_id)
    }

    // ---- stop barrier -----------------------------------------------------

    fn begin_stop(&mut self, reply: oneshot::Sender<Result<StopOutcome>>) {
        match self.status {
            SessionStatus::Idle => {
                let _ = reply.send(Err(RecorderError::NoActiveRecording));
                return;
            }
            SessionStatus::Stopping => {
                let _ = reply.send(Err(RecorderError::StopInProgress));
                return;
            }
            _ => {}
        }

        let session_id = self.begin_stopping();
        self.pending_stop = Some(reply);

        let targets: Vec<(TabId, FrameSender)> = self
            .active_tabs
            .iter()
            .filter_map(|id| self.tabs.get(id).map(|c| (*id, c.control.clone())))
            .collect();
        let ack_timeout = self.cfg.stop_ack_timeout;
        let grace = self.cfg.stop_grace_period;
        let self_tx = self.self_tx.clone();

        tokio::spawn(async move {
            let results = join_all(targets.into_iter().map(|(id, control)| async move {
                let result = timeout(
                    ack_timeout,
                    send_control(
                        &control,
                        ControlMessage::Stop {
                            session_id,
                            require_ack: true,
                        },
                    ),
                )
                .await;
                let ack = matches!(result, Ok(Ok(ControlReply::StopAck { ack: true, .. })));
                (id, ack)
            }))
            .await;
            // Grace period: final in-flight batches drain through the actor.
            sleep(grace).await;
            let _ = self_tx.send(Command::FinishStop { results }).await;
        });
    }

    /// Flips the session into `stopping` and returns its id.
    fn begin_stopping(&mut self) -> u64 {
        self.status = SessionStatus::Stopping;
        self.stopped_tabs.clear();
        self.session_id
    }

    fn finish_stop(&mut self, results: Vec<(TabId, bool)>) {
        for (id, ack) in &results {
            if *ack {
                self.stopped_tabs.insert(*id);
            } else {
                warn!(tab = id.0, "tab did not acknowledge stop");
            }
        }
        let all_acked = results.iter().all(|(_, ack)| *ack);

        let flow = self.stop_session();
        let reply = self.pending_stop.take();
        match flow {
            Some(flow) => {
                // The flow is preserved even when a tab timed out.
                if let Err(e) = self.store.save(&flow) {
                    error!("failed to persist flow: {e}");
                }
                info!(flow = %flow.id, steps = flow.steps.len(), ack = all_acked, "recording stopped");
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(StopOutcome {
                        flow,
                        ack: all_acked,
                    }));
                }
            }
            None => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(RecorderError::NoActiveRecording));
                }
            }
        }
    }

    /// Captures the flow and resets all session state.
    fn stop_session(&mut self) -> Option<Flow> {
        let flow = self.flow.take();
        self.reset_session();
        flow
    }

    fn reset_session(&mut self) {
        self.status = SessionStatus::Idle;
        self.origin_tab = None;
        self.active_tabs.clear();
        self.stopped_tabs.clear();
        self.last_click = None;
        self.last_enrichment = None;
    }

    // ---- pause / resume ---------------------------------------------------

    fn begin_pause(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.status != SessionStatus::Recording {
            let _ = reply.send(Err(RecorderError::InvalidControl(
                "not recording".to_string(),
            )));
            return;
        }
        self.pending_pause = Some(reply);

        let targets: Vec<FrameSender> = self
            .active_tabs
            .iter()
            .filter_map(|id| self.tabs.get(id).map(|c| c.control.clone()))
            .collect();
        let ack_timeout = self.cfg.stop_ack_timeout;
        let self_tx = self.self_tx.clone();

        // Status flips only after the tabs flushed, so their final batches
        // are still accepted.
        tokio::spawn(async move {
            join_all(targets.into_iter().map(|control| async move {
                let _ = timeout(ack_timeout, send_control(&control, ControlMessage::Pause)).await;
            }))
            .await;
            let _ = self_tx.send(Command::FinishPause).await;
        });
    }

    fn resume_recording(&mut self) -> Result<()> {
        if self.status != SessionStatus::Paused {
            return Err(RecorderError::InvalidControl("not paused".to_string()));
        }
        self.status = SessionStatus::Recording;
        for id in &self.active_tabs {
            if let Some(conn) = self.tabs.get(id) {
                let control = conn.control.clone();
                tokio::spawn(async move {
                    let _ = send_control(&control, ControlMessage::Resume).await;
                });
            }
        }
        Ok(())
    }

    fn persist(&self) {
        if let Some(flow) = &self.flow {
            if let Err(e) = self.store.save(flow) {
                error!("failed to persist flow: {e}");
            }
        }
    }
}
