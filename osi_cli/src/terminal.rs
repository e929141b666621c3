use osi_dashboard::{
    AnimationSequencer, ChartSample, ChartSink, LayerKey, LayerView, LogEntry, LogSink,
    PanelContent, PanelSink, PortState, SceneSink, Severity, Sinks, StageSink, TargetId,
    TargetUpdate, TopologyMode, TrendStyle,
};
use std::collections::BTreeMap;
use tracing::trace;

/// Sinks that print to stdout. `json` switches panels to one JSON object per line.
pub fn sinks(json: bool) -> Sinks {
    let labels = AnimationSequencer::encapsulation()
        .targets()
        .iter()
        .map(|t| (t.id, t.label.clone()))
        .collect();
    Sinks {
        panels: Box::new(Panels { json }),
        chart: Box::new(Chart),
        scene: Box::new(Scene),
        log: Box::new(Log),
        stage: Box::new(Stage { labels }),
    }
}

struct Panels {
    json: bool,
}

impl PanelSink for Panels {
    fn render(&mut self, key: LayerKey, content: PanelContent) {
        if self.json {
            match serde_json::to_string(&serde_json::json!({ "layer": key, "panel": content })) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("panel encode failed: {e}"),
            }
            return;
        }
        let body = match &content {
            PanelContent::Placeholder => "...".to_string(),
            PanelContent::Unknown => "no data".to_string(),
            PanelContent::Ready(view) => describe(view),
            PanelContent::Incident(incident) => format!(
                "!! {} [{:?}] {}",
                incident.title, incident.severity, incident.description
            ),
        };
        println!("[{:<15}] {body}", key.title());
    }
}

fn or_dash<T: ToString>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn describe(view: &LayerView) -> String {
    match view {
        LayerView::Application(a) => {
            let mut line = format!(
                "server={} status={} type={} robots={:?}",
                a.server,
                or_dash(a.status_code),
                a.content_type,
                a.robots
            );
            if !a.cms.is_empty() {
                line.push_str(&format!(" cms={}", a.cms.join(",")));
            }
            if !a.missing_security_headers.is_empty() {
                line.push_str(&format!(" missing={}", a.missing_security_headers.join(",")));
            }
            line
        }
        LayerView::Presentation(p) => format!(
            "{} cipher={} ({}/{}/{}) expires_in={}d",
            p.tls_version,
            p.cipher_suite,
            p.key_exchange,
            p.encryption,
            p.mac,
            or_dash(p.days_remaining)
        ),
        LayerView::Session(s) => format!(
            "keep_alive={} cookies=[{}] websocket={}",
            or_dash(s.keep_alive),
            s.cookies.join(","),
            or_dash(s.websocket_support)
        ),
        LayerView::Transport(t) => {
            let ports: Vec<String> = t
                .ports
                .iter()
                .map(|p| {
                    let state = match &p.state {
                        PortState::Open => "open".to_string(),
                        PortState::Closed => "closed".to_string(),
                        PortState::Other(s) => s.clone(),
                    };
                    format!("{}:{state}", p.port)
                })
                .collect();
            format!(
                "handshake={} ports=[{}] quic={}",
                t.latency_ms
                    .map_or_else(|| "timeout".to_string(), |ms| format!("{ms:.1}ms")),
                ports.join(" "),
                t.quic
            )
        }
        LayerView::Network(n) => format!(
            "ip={} {}, {} cdn={} ping={}",
            n.ip_address,
            n.city,
            n.country,
            n.cdn,
            n.ping_ms.map_or_else(|| "-".to_string(), |ms| format!("{ms:.1}ms"))
        ),
        LayerView::Link(l) => format!("interfaces=[{}] gateway={}", l.interfaces.join(","), l.gateway_ip),
    }
}

struct Chart;

impl ChartSink for Chart {
    fn render(&mut self, samples: &[ChartSample], style: TrendStyle) {
        if samples.is_empty() {
            return;
        }
        let values: Vec<String> = samples.iter().map(|s| format!("{:.0}", s.value)).collect();
        let tag = match style {
            TrendStyle::Baseline => "latency",
            TrendStyle::Incident => "latency!!",
        };
        println!("[{tag:<15}] {}", values.join(" "));
    }
}

struct Scene;

impl SceneSink for Scene {
    fn set_topology(&mut self, mode: TopologyMode) {
        let layers = match mode {
            TopologyMode::Osi => "7-layer OSI",
            TopologyMode::TcpIp => "4-layer TCP/IP",
        };
        println!("topology: {layers}");
    }

    fn spawn_particle(&mut self) {
        trace!("particle");
    }

    fn spawn_attack_burst(&mut self) {
        trace!("attack burst");
    }
}

struct Log;

impl LogSink for Log {
    fn append(&mut self, entry: LogEntry) {
        let tag = match entry.severity {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Attack => "ATTACK",
        };
        let secs = entry.at_ms as f64 / 1000.0;
        println!("{secs:>8.3}s {tag:<6} {}", entry.message);
    }
}

struct Stage {
    labels: BTreeMap<TargetId, String>,
}

impl Stage {
    fn label(&self, id: TargetId) -> &str {
        self.labels.get(&id).map_or("?", String::as_str)
    }
}

impl StageSink for Stage {
    fn has_target(&self, target: TargetId) -> bool {
        self.labels.contains_key(&target)
    }

    fn apply(&mut self, updates: &[TargetUpdate]) {
        let parts: Vec<String> = updates
            .iter()
            .filter(|u| u.visual.opacity > 0.0)
            .map(|u| match u.visual.wrapped_by {
                Some(parent) => format!("{} inside {}", self.label(u.target), self.label(parent)),
                None => format!("{} @{}", self.label(u.target), u.visual.top),
            })
            .collect();
        if !parts.is_empty() {
            println!("[{:<15}] {}", "encapsulation", parts.join(", "));
        }
    }
}
