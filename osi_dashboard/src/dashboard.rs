use crate::attack::{AttackOverlay, OverlayContext};
use crate::chart_feed::ChartFeed;
use crate::config::DashboardConfig;
use crate::connection::{
    Connector, ConnectionController, ControllerEvent, Envelope, Generation, SessionState,
};
use crate::error::DashboardError;
use crate::sequencer::{AnimationSequencer, PlayOutcome, ENCAPSULATION};
use crate::sinks::{LogEntry, PanelContent, Severity, Sinks};
use crate::telemetry::{LayerSnapshot, TelemetryStore};
use crate::timer::{Timer, TimerOwner, TimerQueue};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The externally invocable actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardCommand {
    StartAnalysis(String),
    TriggerSequence,
    TriggerAttack,
}

/// Owns every dashboard component and routes commands, transport events and
/// timer expiries between them. Single-threaded; the runtime loop feeds it.
pub struct Dashboard {
    controller: ConnectionController,
    store: TelemetryStore,
    chart: ChartFeed,
    sequencer: AnimationSequencer,
    overlay: AttackOverlay,
    timers: TimerQueue,
    sinks: Sinks,
}

impl Dashboard {
    pub fn new(config: &DashboardConfig, sinks: Sinks, connector: Box<dyn Connector>) -> Self {
        let mut dashboard = Self {
            controller: ConnectionController::new(connector),
            store: TelemetryStore::new(),
            chart: ChartFeed::new(config.chart_capacity),
            sequencer: AnimationSequencer::encapsulation(),
            overlay: AttackOverlay::new(config.attack.clone()),
            timers: TimerQueue::new(),
            sinks,
        };
        dashboard.sinks.scene.set_topology(config.topology);
        dashboard.render_panels();
        dashboard.render_chart();
        dashboard.log(Severity::Info, "System initialized. Ready to analyze.");
        dashboard
    }

    pub fn dispatch(&mut self, command: DashboardCommand) {
        debug!(?command, "dispatch");
        match command {
            DashboardCommand::StartAnalysis(target) => self.start_analysis(&target),
            DashboardCommand::TriggerSequence => self.trigger_sequence(),
            DashboardCommand::TriggerAttack => self.trigger_attack(),
        }
    }

    pub fn start_analysis(&mut self, target: &str) {
        match self.controller.start_analysis(target) {
            Ok(events) => self.route(events),
            Err(DashboardError::EmptyTarget) => debug!("blank target ignored"),
            Err(e) => warn!("could not start analysis: {e}"),
        }
    }

    pub fn trigger_sequence(&mut self) {
        match self
            .sequencer
            .play(ENCAPSULATION, &mut self.timers, self.sinks.stage.as_mut())
        {
            Ok(PlayOutcome::Started) => info!("encapsulation playback started"),
            Ok(PlayOutcome::AlreadyRunning) => {}
            Err(e) => warn!("{}", DashboardError::from(e)),
        }
    }

    /// Cancels encapsulation playback and returns the stack to its baseline.
    pub fn reset_sequence(&mut self) {
        self.sequencer
            .stop(&mut self.timers, self.sinks.stage.as_mut());
    }

    pub fn trigger_attack(&mut self) {
        let mut ctx = OverlayContext {
            timers: &mut self.timers,
            chart: &mut self.chart,
            sinks: &mut self.sinks,
            current: self.store.current(),
            generation: self.controller.generation(),
        };
        self.overlay.trigger(&mut ctx);
    }

    pub fn stop_attack(&mut self) -> bool {
        let mut ctx = OverlayContext {
            timers: &mut self.timers,
            chart: &mut self.chart,
            sinks: &mut self.sinks,
            current: self.store.current(),
            generation: self.controller.generation(),
        };
        self.overlay.stop(&mut ctx)
    }

    pub fn handle_transport(&mut self, envelope: Envelope) {
        let events = self.controller.handle(envelope);
        self.route(events);
    }

    /// Fires every timer due up to `now` (offset from the runtime origin) in deadline order.
    pub fn advance_to(&mut self, now: Duration) {
        while let Some(timer) = self.timers.pop_due(now) {
            self.fire(timer);
        }
        self.timers.set_now(now);
    }

    pub fn advance(&mut self, by: Duration) {
        self.advance_to(self.timers.now() + by);
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn session_state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn generation(&self) -> Generation {
        self.controller.generation()
    }

    pub fn layers(&self) -> &[LayerSnapshot] {
        self.store.current()
    }

    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    pub fn chart(&self) -> &ChartFeed {
        &self.chart
    }

    pub fn sequencer(&self) -> &AnimationSequencer {
        &self.sequencer
    }

    pub fn overlay(&self) -> &AttackOverlay {
        &self.overlay
    }

    pub fn pending_timers(&self, owner: TimerOwner) -> usize {
        self.timers.pending(owner)
    }

    fn fire(&mut self, timer: Timer) {
        match timer.owner {
            TimerOwner::Sequencer => {
                self.sequencer.on_timer(
                    timer.token,
                    timer.kind,
                    &mut self.timers,
                    self.sinks.stage.as_mut(),
                );
            }
            TimerOwner::Overlay => {
                let mut ctx = OverlayContext {
                    timers: &mut self.timers,
                    chart: &mut self.chart,
                    sinks: &mut self.sinks,
                    current: self.store.current(),
                    generation: self.controller.generation(),
                };
                self.overlay.on_tick(timer.token, &mut ctx);
            }
        }
    }

    fn route(&mut self, events: Vec<ControllerEvent>) {
        for event in events {
            match event {
                ControllerEvent::Log { severity, message } => self.log(severity, message),
                ControllerEvent::SessionStarted { .. } => {
                    self.store.reset_to_placeholder();
                    self.render_panels();
                }
                ControllerEvent::FrameAccepted => self.sinks.scene.spawn_particle(),
                ControllerEvent::Result(data) => self.apply_result(&data),
                ControllerEvent::Ended { state } => debug!(?state, "session ended"),
            }
        }
    }

    fn apply_result(&mut self, data: &serde_json::Value) {
        self.store.apply(data);
        self.render_panels();

        if let Some(latency) = self.store.transport_latency() {
            if self.chart.push(self.timers.now_ms(), latency) {
                self.render_chart();
            }
        }

        let summary = self.store.insight().map(|insight| {
            let score = insight
                .score
                .map_or_else(|| "?".to_string(), |s| s.to_string());
            format!(
                "Threat score {score}/100 ({}), {} finding(s).",
                insight.risk_level, insight.findings
            )
        });
        if let Some(summary) = summary {
            self.log(Severity::Info, summary);
        }
    }

    fn render_panels(&mut self) {
        for snap in self.store.current() {
            self.sinks
                .panels
                .render(snap.key, PanelContent::from(&snap.state));
        }
    }

    fn render_chart(&mut self) {
        self.sinks
            .chart
            .render(&self.chart.snapshot(), self.chart.style());
    }

    fn log(&mut self, severity: Severity, message: impl Into<String>) {
        self.sinks.log.append(LogEntry {
            at_ms: self.timers.now_ms(),
            severity,
            message: message.into(),
        });
    }
}
