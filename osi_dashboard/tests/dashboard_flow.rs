use osi_dashboard::{
    sample_payload, AnimationSequencer, AttackConfig, Connector, Dashboard, DashboardCommand,
    DashboardConfig, Envelope, Generation, LayerKey, LayerView, PanelContent, PortState,
    RecordingSinks, RestorePolicy, SessionHandle, SessionState, Severity, Sinks, TimerOwner,
    TimerQueue, TopologyMode, TransportEvent, TrendStyle, VisualState, DATA, DETECTED,
    ENCAPSULATION, ETH, MITIGATED, TCP,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Script {
    opened: Vec<(Generation, String)>,
    closed: Vec<Generation>,
}

#[derive(Clone, Default)]
struct ScriptedConnector(Arc<Mutex<Script>>);

struct ScriptedHandle(Generation, Arc<Mutex<Script>>);

impl SessionHandle for ScriptedHandle {
    fn close(&mut self) {
        self.1.lock().unwrap().closed.push(self.0);
    }
}

impl Connector for ScriptedConnector {
    fn open(&mut self, generation: Generation, target: &str) -> Box<dyn SessionHandle> {
        self.0
            .lock()
            .unwrap()
            .opened
            .push((generation, target.to_string()));
        Box::new(ScriptedHandle(generation, self.0.clone()))
    }
}

fn rig(config: DashboardConfig) -> (Dashboard, RecordingSinks, ScriptedConnector) {
    let (sinks, rec) = Sinks::recording();
    let connector = ScriptedConnector::default();
    let dashboard = Dashboard::new(&config, sinks, Box::new(connector.clone()));
    (dashboard, rec, connector)
}

fn seeded() -> DashboardConfig {
    DashboardConfig {
        attack: AttackConfig {
            seed: Some(9),
            ..AttackConfig::default()
        },
        ..DashboardConfig::default()
    }
}

fn event(generation: Generation, event: TransportEvent) -> Envelope {
    Envelope { generation, event }
}

fn frame(generation: Generation, value: serde_json::Value) -> Envelope {
    event(generation, TransportEvent::Frame(value.to_string()))
}

fn complete(generation: Generation, target: &str) -> Envelope {
    frame(
        generation,
        json!({ "status": "complete", "data": sample_payload(target) }),
    )
}

#[test]
fn startup_sets_topology_and_placeholders() {
    let (_dash, rec, _) = rig(DashboardConfig {
        topology: TopologyMode::TcpIp,
        ..DashboardConfig::default()
    });
    assert_eq!(rec.with(|r| r.topology), Some(TopologyMode::TcpIp));
    for key in LayerKey::ALL {
        assert_eq!(rec.panel(key), Some(PanelContent::Placeholder));
    }
}

#[test]
fn scan_populates_panels_chart_and_log() {
    let (mut dash, rec, conn) = rig(seeded());
    dash.dispatch(DashboardCommand::StartAnalysis("example.com".into()));
    assert_eq!(conn.0.lock().unwrap().opened, vec![(1, "example.com".to_string())]);

    dash.handle_transport(event(1, TransportEvent::Opened));
    dash.handle_transport(frame(1, json!({ "status": "starting", "message": "Analyzing example.com..." })));
    dash.handle_transport(complete(1, "example.com"));

    assert_eq!(dash.session_state(), SessionState::Complete);
    for key in LayerKey::ALL {
        assert!(matches!(rec.panel(key), Some(PanelContent::Ready(_))), "{key:?}");
    }
    let latency = sample_payload("example.com")["layer4"]["latency_tcp_handshake"]
        .as_f64()
        .unwrap();
    assert_eq!(rec.chart_values(), vec![latency]);
    assert_eq!(rec.with(|r| r.particles), 2);

    let log = rec.log_messages();
    assert!(log.contains(&"Initiating scan sequence for target: example.com".to_string()));
    assert!(log.contains(&"Analyzing example.com...".to_string()));
    assert!(log.contains(&"Analysis complete. Parsing results...".to_string()));
    assert!(log.iter().any(|m| m.starts_with("Threat score 72/100")));
}

#[test]
fn second_scan_wins_and_stale_results_never_render() {
    let (mut dash, rec, conn) = rig(seeded());
    dash.start_analysis("first.example");
    dash.start_analysis("second.example");
    assert_eq!(conn.0.lock().unwrap().closed, vec![1]);

    dash.handle_transport(complete(1, "first.example"));
    assert_eq!(dash.session_state(), SessionState::Connecting);
    assert!(rec.chart_values().is_empty());
    assert_eq!(rec.panel(LayerKey::Network), Some(PanelContent::Placeholder));

    dash.handle_transport(complete(2, "second.example"));
    assert_eq!(dash.session_state(), SessionState::Complete);
    let ip = dash
        .store()
        .layer(LayerKey::Network)
        .map(|s| s.present())
        .unwrap_or(false);
    assert!(ip);
}

#[test]
fn new_scan_clears_previous_results_immediately() {
    let (mut dash, rec, _) = rig(seeded());
    dash.start_analysis("a.example");
    dash.handle_transport(complete(1, "a.example"));
    assert!(matches!(rec.panel(LayerKey::Application), Some(PanelContent::Ready(_))));

    dash.start_analysis("b.example");
    for key in LayerKey::ALL {
        assert_eq!(rec.panel(key), Some(PanelContent::Placeholder));
    }
    assert!(dash.store().insight().is_none());
}

#[test]
fn blank_target_is_ignored() {
    let (mut dash, rec, conn) = rig(seeded());
    let before = rec.log_messages().len();
    dash.dispatch(DashboardCommand::StartAnalysis("  ".into()));
    assert!(conn.0.lock().unwrap().opened.is_empty());
    assert_eq!(rec.log_messages().len(), before);
}

#[test]
fn service_error_and_early_close_fail_the_session() {
    let (mut dash, rec, _) = rig(seeded());
    dash.start_analysis("a.example");
    dash.handle_transport(frame(1, json!({ "error": "Name resolution failed" })));
    assert_eq!(dash.session_state(), SessionState::Failed);
    assert!(rec.with(|r| r
        .log
        .iter()
        .any(|e| e.severity == Severity::Error && e.message == "Error: Name resolution failed")));

    dash.start_analysis("b.example");
    dash.handle_transport(event(2, TransportEvent::Opened));
    dash.handle_transport(event(2, TransportEvent::Closed));
    assert_eq!(dash.session_state(), SessionState::Failed);
}

#[test]
fn example_com_scan_shows_latency_and_open_http_port() {
    let (mut dash, rec, _) = rig(seeded());
    dash.start_analysis("example.com");
    dash.handle_transport(event(1, TransportEvent::Opened));
    dash.handle_transport(frame(1, json!({ "status": "starting", "message": "scanning" })));
    assert!(rec.log_messages().contains(&"scanning".to_string()));

    dash.handle_transport(frame(
        1,
        json!({
            "status": "complete",
            "data": {
                "layer4": {
                    "latency_tcp_handshake": 42,
                    "tcp_ports": { "80": "Open" }
                }
            }
        }),
    ));

    assert_eq!(dash.session_state(), SessionState::Complete);
    assert_eq!(rec.chart_values(), vec![42.0]);
    let Some(PanelContent::Ready(LayerView::Transport(t))) = rec.panel(LayerKey::Transport) else {
        panic!("transport panel not ready");
    };
    assert_eq!(t.latency_ms, Some(42.0));
    assert_eq!(t.port("80").map(|p| p.state.clone()), Some(PortState::Open));
    for key in [LayerKey::Application, LayerKey::Presentation, LayerKey::Network] {
        assert_eq!(rec.panel(key), Some(PanelContent::Unknown), "{key:?}");
    }
}

#[test]
fn missing_http_fields_fall_back_to_unknown() {
    let (mut dash, rec, _) = rig(seeded());
    dash.start_analysis("example.com");
    dash.handle_transport(frame(
        1,
        json!({ "status": "complete", "data": { "layer7": { "http": { "status_code": 200 } } } }),
    ));
    let Some(PanelContent::Ready(LayerView::Application(a))) = rec.panel(LayerKey::Application) else {
        panic!("application panel not ready");
    };
    assert_eq!(a.server, "Unknown");
}

#[test]
fn zero_latency_is_not_charted() {
    let (mut dash, rec, _) = rig(seeded());
    dash.start_analysis("a.example");
    dash.handle_transport(frame(
        1,
        json!({ "status": "complete", "data": { "layer4": { "latency_tcp_handshake": 0 } } }),
    ));
    assert!(rec.chart_values().is_empty());
    assert_eq!(rec.panel(LayerKey::Link), Some(PanelContent::Unknown));
}

#[test]
fn sequence_runs_on_virtual_time() {
    let (mut dash, rec, _) = rig(seeded());
    dash.dispatch(DashboardCommand::TriggerSequence);
    dash.dispatch(DashboardCommand::TriggerSequence);
    assert!(dash.sequencer().is_running());

    dash.advance(Duration::from_millis(4_800));
    assert!(!dash.sequencer().is_running());
    assert_eq!(dash.sequencer().completed_runs(), 1);
    assert_eq!(rec.stage_state(ETH), Some(VisualState::shown(280)));
    assert_eq!(rec.stage_state(DATA), Some(VisualState::nested(310, TCP)));

    dash.dispatch(DashboardCommand::TriggerSequence);
    dash.advance(Duration::from_millis(1_000));
    dash.reset_sequence();
    assert_eq!(dash.pending_timers(TimerOwner::Sequencer), 0);
    assert_eq!(rec.stage_state(DATA), Some(VisualState::hidden(20)));
}

#[test]
fn attack_overlay_runs_its_course_alongside_a_scan() {
    let (mut dash, rec, _) = rig(seeded());
    dash.start_analysis("a.example");
    dash.dispatch(DashboardCommand::TriggerAttack);
    assert!(dash.overlay().is_active());
    assert_eq!(rec.chart_style(), TrendStyle::Incident);

    dash.advance(Duration::from_millis(2_000));
    dash.dispatch(DashboardCommand::TriggerAttack);
    assert_eq!(dash.overlay().tick_count(), 20);

    dash.handle_transport(complete(1, "a.example"));
    assert!(dash.chart().len() <= dash.chart().capacity());

    dash.advance(Duration::from_secs(9));
    assert!(!dash.overlay().is_active());
    assert_eq!(dash.pending_timers(TimerOwner::Overlay), 0);
    assert_eq!(rec.chart_style(), TrendStyle::Baseline);

    let log = rec.log_messages();
    assert_eq!(log.iter().filter(|m| *m == DETECTED).count(), 1);
    assert_eq!(log.iter().filter(|m| *m == MITIGATED).count(), 1);
    assert!(!dash.stop_attack());
}

#[test]
fn stop_attack_restores_placeholders() {
    let (mut dash, rec, _) = rig(seeded());
    dash.trigger_attack();
    dash.advance(Duration::from_millis(350));
    assert!(dash.stop_attack());
    for key in LayerKey::ALL {
        assert_eq!(rec.panel(key), Some(PanelContent::Placeholder));
    }
}

#[test]
fn stop_attack_right_after_trigger() {
    let (mut dash, rec, _) = rig(seeded());
    dash.trigger_attack();
    assert_eq!(dash.overlay().tick_count(), 0);
    assert!(dash.stop_attack());
    assert_eq!(dash.pending_timers(TimerOwner::Overlay), 0);
    assert_eq!(rec.chart_style(), TrendStyle::Baseline);
    assert_eq!(rec.log_messages().iter().filter(|m| *m == MITIGATED).count(), 1);
    assert!(!dash.stop_attack());
}

#[test]
fn prior_content_never_restores_a_superseded_scan() {
    let (mut dash, rec, _) = rig(DashboardConfig {
        attack: AttackConfig {
            seed: Some(9),
            restore: RestorePolicy::PriorContent,
            ..AttackConfig::default()
        },
        ..DashboardConfig::default()
    });
    dash.start_analysis("a.example");
    dash.handle_transport(complete(1, "a.example"));
    dash.trigger_attack();
    dash.advance(Duration::from_millis(300));

    dash.start_analysis("b.example");
    assert_eq!(dash.generation(), 2);
    dash.stop_attack();
    for key in LayerKey::ALL {
        assert_eq!(rec.panel(key), Some(PanelContent::Placeholder), "{key:?}");
    }

    dash.handle_transport(complete(2, "b.example"));
    dash.trigger_attack();
    dash.stop_attack();
    assert!(matches!(rec.panel(LayerKey::Network), Some(PanelContent::Ready(_))));
}

#[test]
fn unvalidated_attack_config_does_not_panic_on_tick() {
    let (mut dash, rec, _) = rig(DashboardConfig {
        attack: AttackConfig {
            seed: Some(9),
            latency_span_ms: 0.0,
            ..AttackConfig::default()
        },
        ..DashboardConfig::default()
    });
    assert!(DashboardConfig {
        attack: AttackConfig {
            latency_span_ms: 0.0,
            ..AttackConfig::default()
        },
        ..DashboardConfig::default()
    }
    .validate()
    .is_err());

    dash.trigger_attack();
    dash.advance(Duration::from_millis(100));
    assert_eq!(dash.overlay().tick_count(), 1);
    assert_eq!(rec.chart_values(), vec![200.0]);
}

#[test]
fn sequencer_can_be_driven_with_its_own_timer_queue() {
    let (mut sinks, rec) = Sinks::recording();
    let mut timers = TimerQueue::new();
    let mut seq = AnimationSequencer::encapsulation();
    seq.play(ENCAPSULATION, &mut timers, sinks.stage.as_mut()).unwrap();

    let mut finished = false;
    while let Some(t) = timers.pop_due(Duration::from_secs(10)) {
        assert_eq!(t.owner, TimerOwner::Sequencer);
        finished |= seq.on_timer(t.token, t.kind, &mut timers, sinks.stage.as_mut());
    }
    assert!(finished);
    assert_eq!(rec.stage_state(DATA), Some(VisualState::nested(310, TCP)));

    seq.stop(&mut timers, sinks.stage.as_mut());
    assert_eq!(rec.stage_state(DATA), Some(VisualState::hidden(20)));
}
