use crate::attack::IncidentContent;
use crate::chart_feed::{ChartSample, TrendStyle};
use crate::sequencer::{TargetId, TargetUpdate, VisualState};
use crate::telemetry::{LayerState, LayerView};
use osi_protocol::LayerKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
    Attack,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub at_ms: u64,
    pub severity: Severity,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopologyMode {
    #[default]
    Osi,
    TcpIp,
}

/// What a layer panel should show.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "content")]
pub enum PanelContent {
    /// Scan in progress or awaiting the next scan.
    Placeholder,
    Unknown,
    Ready(LayerView),
    Incident(IncidentContent),
}

impl From<&LayerState> for PanelContent {
    fn from(state: &LayerState) -> Self {
        match state {
            LayerState::Pending => PanelContent::Placeholder,
            LayerState::Unknown => PanelContent::Unknown,
            LayerState::Ready(view) => PanelContent::Ready(view.clone()),
        }
    }
}

pub trait PanelSink {
    fn render(&mut self, key: LayerKey, content: PanelContent);
}

pub trait ChartSink {
    fn render(&mut self, samples: &[ChartSample], style: TrendStyle);
}

pub trait SceneSink {
    fn set_topology(&mut self, mode: TopologyMode);
    fn spawn_particle(&mut self);
    fn spawn_attack_burst(&mut self);
}

pub trait LogSink {
    fn append(&mut self, entry: LogEntry);
}

/// Surface the encapsulation stack is drawn on.
pub trait StageSink {
    fn has_target(&self, target: TargetId) -> bool;
    /// Every update of one step, applied together.
    fn apply(&mut self, updates: &[TargetUpdate]);
}

pub struct Sinks {
    pub panels: Box<dyn PanelSink>,
    pub chart: Box<dyn ChartSink>,
    pub scene: Box<dyn SceneSink>,
    pub log: Box<dyn LogSink>,
    pub stage: Box<dyn StageSink>,
}

impl Sinks {
    /// Every sink backed by one shared in-memory recorder.
    pub fn recording() -> (Self, RecordingSinks) {
        let rec = RecordingSinks::default();
        let sinks = Sinks {
            panels: Box::new(rec.clone()),
            chart: Box::new(rec.clone()),
            scene: Box::new(rec.clone()),
            log: Box::new(rec.clone()),
            stage: Box::new(rec.clone()),
        };
        (sinks, rec)
    }
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub panels: BTreeMap<LayerKey, PanelContent>,
    pub panel_renders: usize,
    pub chart: Vec<ChartSample>,
    pub chart_style: TrendStyle,
    pub chart_renders: usize,
    pub topology: Option<TopologyMode>,
    pub particles: usize,
    pub attack_bursts: usize,
    pub log: Vec<LogEntry>,
    pub stage: BTreeMap<TargetId, VisualState>,
    pub stage_frames: Vec<Vec<TargetUpdate>>,
    /// Targets reported as torn down.
    pub missing_targets: BTreeSet<TargetId>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSinks {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSinks {
    /// Runs `f` against the recorded state. A poisoned lock yields the default.
    pub fn with<R: Default>(&self, f: impl FnOnce(&Recorded) -> R) -> R {
        match self.inner.lock() {
            Ok(g) => f(&g),
            Err(_) => R::default(),
        }
    }

    pub fn panel(&self, key: LayerKey) -> Option<PanelContent> {
        self.with(|r| r.panels.get(&key).cloned())
    }

    pub fn log_messages(&self) -> Vec<String> {
        self.with(|r| r.log.iter().map(|e| e.message.clone()).collect())
    }

    pub fn chart_values(&self) -> Vec<f64> {
        self.with(|r| r.chart.iter().map(|s| s.value).collect())
    }

    pub fn chart_style(&self) -> TrendStyle {
        self.with(|r| r.chart_style)
    }

    pub fn stage_state(&self, target: TargetId) -> Option<VisualState> {
        self.with(|r| r.stage.get(&target).copied())
    }

    pub fn remove_target(&self, target: TargetId) {
        if let Ok(mut g) = self.inner.lock() {
            g.missing_targets.insert(target);
        }
    }

    fn update(&self, f: impl FnOnce(&mut Recorded)) {
        if let Ok(mut g) = self.inner.lock() {
            f(&mut g);
        }
    }
}

impl PanelSink for RecordingSinks {
    fn render(&mut self, key: LayerKey, content: PanelContent) {
        self.update(|r| {
            r.panels.insert(key, content);
            r.panel_renders += 1;
        });
    }
}

impl ChartSink for RecordingSinks {
    fn render(&mut self, samples: &[ChartSample], style: TrendStyle) {
        self.update(|r| {
            r.chart = samples.to_vec();
            r.chart_style = style;
            r.chart_renders += 1;
        });
    }
}

impl SceneSink for RecordingSinks {
    fn set_topology(&mut self, mode: TopologyMode) {
        self.update(|r| r.topology = Some(mode));
    }

    fn spawn_particle(&mut self) {
        self.update(|r| r.particles += 1);
    }

    fn spawn_attack_burst(&mut self) {
        self.update(|r| r.attack_bursts += 1);
    }
}

impl LogSink for RecordingSinks {
    fn append(&mut self, entry: LogEntry) {
        self.update(|r| r.log.push(entry));
    }
}

impl StageSink for RecordingSinks {
    fn has_target(&self, target: TargetId) -> bool {
        self.with(|r| !r.missing_targets.contains(&target))
    }

    fn apply(&mut self, updates: &[TargetUpdate]) {
        self.update(|r| {
            for u in updates {
                r.stage.insert(u.target, u.visual);
            }
            r.stage_frames.push(updates.to_vec());
        });
    }
}
