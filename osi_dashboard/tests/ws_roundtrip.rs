use osi_dashboard::{
    sample_payload, AttackConfig, DashboardConfig, DashboardError, DashboardRuntime, LayerKey,
    LayerState, LayerView, MockAnalyzer, PanelContent, Recorded, RecordingSinks, SessionState,
    Severity, Sinks, MITIGATED,
};
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn config(ws_url: String) -> DashboardConfig {
    DashboardConfig {
        ws_url,
        attack: AttackConfig {
            seed: Some(3),
            ..AttackConfig::default()
        },
        ..DashboardConfig::default()
    }
}

async fn wait_for(rec: &RecordingSinks, timeout: Duration, pred: impl Fn(&Recorded) -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if rec.with(|r| pred(r)) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

fn logged(r: &Recorded, message: &str) -> bool {
    r.log.iter().any(|e| e.message == message)
}

#[tokio::test]
async fn scan_roundtrip_fills_every_panel() {
    let server = MockAnalyzer::bind("127.0.0.1:0").await.unwrap();
    let (sinks, rec) = Sinks::recording();
    let (runtime, handle) = DashboardRuntime::new(&config(server.ws_url()), sinks).unwrap();

    let watcher = rec.clone();
    let driver = async move {
        handle.start_analysis("example.com").await.unwrap();
        wait_for(&watcher, Duration::from_secs(3), |r| {
            logged(r, "Analysis complete. Parsing results...")
        })
        .await
    };
    let (dashboard, done) = tokio::join!(runtime.run(), driver);

    assert!(done, "no complete frame: {:?}", rec.log_messages());
    assert_eq!(dashboard.session_state(), SessionState::Complete);
    for key in LayerKey::ALL {
        assert!(matches!(rec.panel(key), Some(PanelContent::Ready(_))), "{key:?}");
    }
    let log = rec.log_messages();
    assert!(log.contains(&"WebSocket connection established. Sending payload...".to_string()));
    assert!(log.contains(&"Analyzing example.com...".to_string()));
    assert_eq!(rec.chart_values().len(), 1);
}

#[tokio::test]
async fn service_error_fails_the_session() {
    let server = MockAnalyzer::bind("127.0.0.1:0").await.unwrap();
    let (sinks, rec) = Sinks::recording();
    let (runtime, handle) = DashboardRuntime::new(&config(server.ws_url()), sinks).unwrap();

    let watcher = rec.clone();
    let driver = async move {
        handle.start_analysis("down.invalid").await.unwrap();
        wait_for(&watcher, Duration::from_secs(3), |r| {
            r.log.iter().any(|e| e.severity == Severity::Error)
        })
        .await
    };
    let (dashboard, done) = tokio::join!(runtime.run(), driver);

    assert!(done);
    assert_eq!(dashboard.session_state(), SessionState::Failed);
    assert!(rec
        .log_messages()
        .contains(&"Error: Name resolution failed for down.invalid".to_string()));
}

#[tokio::test]
async fn unreachable_service_reports_transport_failure() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (sinks, rec) = Sinks::recording();
    let (runtime, handle) = DashboardRuntime::new(&config(format!("ws://{addr}/ws")), sinks).unwrap();

    let watcher = rec.clone();
    let driver = async move {
        handle.start_analysis("example.com").await.unwrap();
        wait_for(&watcher, Duration::from_secs(3), |r| {
            r.log
                .iter()
                .any(|e| e.message.starts_with("WebSocket connection failed"))
        })
        .await
    };
    let (dashboard, done) = tokio::join!(runtime.run(), driver);

    assert!(done);
    assert_eq!(dashboard.session_state(), SessionState::Failed);
}

#[tokio::test]
async fn superseded_scan_never_renders() {
    let server = MockAnalyzer::bind_with_delay("127.0.0.1:0", Duration::from_millis(200))
        .await
        .unwrap();
    let (sinks, rec) = Sinks::recording();
    let (runtime, handle) = DashboardRuntime::new(&config(server.ws_url()), sinks).unwrap();

    let watcher = rec.clone();
    let driver = async move {
        handle.start_analysis("first.example").await.unwrap();
        sleep(Duration::from_millis(50)).await;
        handle.start_analysis("second.example").await.unwrap();
        let done = wait_for(&watcher, Duration::from_secs(3), |r| {
            logged(r, "Analysis complete. Parsing results...")
        })
        .await;
        // give a late first-session frame time to arrive if it were going to
        sleep(Duration::from_millis(300)).await;
        done
    };
    let (dashboard, done) = tokio::join!(runtime.run(), driver);

    assert!(done);
    assert_eq!(dashboard.generation(), 2);
    let expected = sample_payload("second.example")["layer3"]["ip_address"]
        .as_str()
        .unwrap()
        .to_string();
    let Some(LayerState::Ready(LayerView::Network(net))) =
        dashboard.store().layer(LayerKey::Network).map(|s| &s.state)
    else {
        panic!("network layer not populated");
    };
    assert_eq!(net.ip_address, expected);
    let completes = rec
        .log_messages()
        .iter()
        .filter(|m| *m == "Analysis complete. Parsing results...")
        .count();
    assert_eq!(completes, 1);
}

#[tokio::test]
async fn attack_overlay_expires_on_wall_clock() {
    let mut cfg = config(osi_dashboard::DEFAULT_WS_URL.to_string());
    cfg.attack.tick_ms = 5;
    cfg.attack.max_ticks = 10;
    let (sinks, rec) = Sinks::recording();
    let (runtime, handle) = DashboardRuntime::new(&cfg, sinks).unwrap();

    let watcher = rec.clone();
    let driver = async move {
        handle.trigger_attack().await.unwrap();
        wait_for(&watcher, Duration::from_secs(3), |r| logged(r, MITIGATED)).await
    };
    let (dashboard, done) = tokio::join!(runtime.run(), driver);

    assert!(done);
    assert!(!dashboard.overlay().is_active());
    assert_eq!(rec.with(|r| r.attack_bursts), 10);
}

#[tokio::test]
async fn commands_after_the_loop_exits_report_it() {
    let (sinks, _rec) = Sinks::recording();
    let (runtime, handle) =
        DashboardRuntime::new(&config(osi_dashboard::DEFAULT_WS_URL.to_string()), sinks).unwrap();
    drop(runtime);

    let err = handle.trigger_sequence().await.unwrap_err();
    assert!(matches!(err, DashboardError::LoopStopped));
    assert_eq!(err.to_string(), "dashboard loop has stopped");
}
