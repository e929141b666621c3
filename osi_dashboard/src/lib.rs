mod attack;
mod chart_feed;
mod config;
mod connection;
mod dashboard;
mod error;
mod mock_service;
mod runtime;
mod sequencer;
mod sinks;
mod telemetry;
mod timer;

pub use crate::attack::{
    incident_for, AttackEvent, AttackOverlay, IncidentContent, IncidentSeverity, RestorePolicy,
    DETECTED, MITIGATED, SOURCE,
};
pub use crate::chart_feed::{ChartFeed, ChartSample, TrendStyle, DEFAULT_CAPACITY};
pub use crate::config::{AttackConfig, DashboardConfig, DEFAULT_WS_URL};
pub use crate::connection::{
    ConnectionController, Connector, ControllerEvent, Envelope, Generation, SessionHandle,
    SessionState, TransportEvent, WsConnector,
};
pub use crate::dashboard::{Dashboard, DashboardCommand};
pub use crate::error::DashboardError;
pub use crate::mock_service::{sample_payload, MockAnalyzer, FAILING_TLD, WS_PATH};
pub use crate::runtime::{DashboardHandle, DashboardRuntime};
pub use crate::sequencer::{
    AnimationSequencer, AnimationStep, PlayOutcome, Sequence, SequenceError, SequencerState,
    StageTarget, TargetId, TargetUpdate, VisualState, DATA, ENCAPSULATION, ETH, IP, TCP,
};
pub use crate::sinks::{
    ChartSink, LogEntry, LogSink, PanelContent, PanelSink, Recorded, RecordingSinks, SceneSink,
    Severity, Sinks, StageSink, TopologyMode,
};
pub use crate::telemetry::{
    AnalysisInsight, ApplicationView, LayerSnapshot, LayerState, LayerView, LinkView,
    NetworkView, PortState, PortStatus, PresentationView, RobotsStatus, SessionView,
    TelemetryStore, TransportView,
};
pub use crate::timer::{Timer, TimerKind, TimerOwner, TimerQueue};
pub use osi_protocol::LayerKey;

/// Installs the `RUST_LOG`-driven fmt subscriber. Safe to call more than once.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
