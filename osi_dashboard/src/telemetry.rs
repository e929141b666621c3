use osi_protocol::{
    AnalysisData, ApplicationPayload, HttpInfo, LayerKey, LinkPayload, NetworkPayload,
    PresentationPayload, SessionPayload, TransportPayload,
};
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const UNKNOWN: &str = "Unknown";
pub const DASH: &str = "-";

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "state", content = "view")]
pub enum LayerState {
    /// Placeholder shown while a scan runs or before the first one.
    Pending,
    /// The payload carried no object for this layer.
    Unknown,
    Ready(LayerView),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LayerSnapshot {
    pub key: LayerKey,
    pub state: LayerState,
}

impl LayerSnapshot {
    pub fn present(&self) -> bool {
        matches!(self.state, LayerState::Ready(_))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "layer")]
pub enum LayerView {
    Application(ApplicationView),
    Presentation(PresentationView),
    Session(SessionView),
    Transport(TransportView),
    Network(NetworkView),
    Link(LinkView),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RobotsStatus {
    Found,
    Missing,
    Unknown,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ApplicationView {
    pub server: String,
    /// `None` renders as a dash, never as zero.
    pub status_code: Option<u16>,
    pub content_type: String,
    pub robots: RobotsStatus,
    pub cms: Vec<String>,
    pub missing_security_headers: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PresentationView {
    pub tls_version: String,
    pub days_remaining: Option<i64>,
    pub cipher_suite: String,
    pub key_exchange: String,
    pub encryption: String,
    pub mac: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionView {
    pub keep_alive: Option<bool>,
    pub cookies: Vec<String>,
    pub cookie_notes: BTreeMap<String, String>,
    pub websocket_support: Option<bool>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Open,
    Closed,
    Other(String),
}

impl PortState {
    fn parse(raw: &str) -> Self {
        let t = raw.trim();
        if t.eq_ignore_ascii_case("open") {
            PortState::Open
        } else if t.to_ascii_lowercase().starts_with("closed") {
            PortState::Closed
        } else {
            PortState::Other(t.to_string())
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PortStatus {
    pub port: String,
    pub state: PortState,
    pub description: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TransportView {
    /// `None` means the handshake timed out (payload value `<= 0` or absent).
    pub latency_ms: Option<f64>,
    pub ports: Vec<PortStatus>,
    pub primary_port: Option<String>,
    pub established: bool,
    pub quic: String,
}

impl TransportView {
    pub fn port(&self, port: &str) -> Option<&PortStatus> {
        self.ports.iter().find(|p| p.port == port)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NetworkView {
    pub ip_address: String,
    pub city: String,
    pub country: String,
    pub cdn: String,
    pub ping_ms: Option<f64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LinkView {
    pub interfaces: Vec<String>,
    pub gateway_ip: String,
}

/// Scan-wide extras that are not tied to one panel.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct AnalysisInsight {
    pub score: Option<i64>,
    pub risk_level: String,
    pub summary: Vec<String>,
    pub findings: usize,
    pub journey: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TelemetryStore {
    layers: Vec<LayerSnapshot>,
    insight: Option<AnalysisInsight>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self {
            layers: placeholder_set(),
            insight: None,
        }
    }
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure normalization of a raw `data` object into the fixed layer set.
    pub fn normalize(raw: &serde_json::Value) -> Vec<LayerSnapshot> {
        let data = decode(raw);
        normalize_data(raw, &data)
    }

    /// Normalizes and stores `raw`, returning the new snapshot set.
    pub fn apply(&mut self, raw: &serde_json::Value) -> &[LayerSnapshot] {
        let data = decode(raw);
        self.layers = normalize_data(raw, &data);
        self.insight = insight_from(&data);
        &self.layers
    }

    /// Marks every layer pending so stale data never lingers during a new scan.
    pub fn reset_to_placeholder(&mut self) -> &[LayerSnapshot] {
        self.layers = placeholder_set();
        self.insight = None;
        &self.layers
    }

    pub fn current(&self) -> &[LayerSnapshot] {
        &self.layers
    }

    pub fn layer(&self, key: LayerKey) -> Option<&LayerSnapshot> {
        self.layers.iter().find(|s| s.key == key)
    }

    pub fn insight(&self) -> Option<&AnalysisInsight> {
        self.insight.as_ref()
    }

    pub fn transport_latency(&self) -> Option<f64> {
        match self.layer(LayerKey::Transport).map(|s| &s.state) {
            Some(LayerState::Ready(LayerView::Transport(t))) => t.latency_ms,
            _ => None,
        }
    }
}

fn placeholder_set() -> Vec<LayerSnapshot> {
    LayerKey::ALL
        .iter()
        .map(|&key| LayerSnapshot {
            key,
            state: LayerState::Pending,
        })
        .collect()
}

fn decode(raw: &serde_json::Value) -> AnalysisData {
    if !raw.is_object() {
        debug!("complete frame carried non-object data; every layer unknown");
        return AnalysisData::default();
    }
    AnalysisData::deserialize(raw).unwrap_or_else(|e| {
        debug!("analysis data decode failed: {e}");
        AnalysisData::default()
    })
}

fn normalize_data(raw: &serde_json::Value, data: &AnalysisData) -> Vec<LayerSnapshot> {
    let http = data.layer7.as_ref().and_then(|l7| l7.http.as_ref());

    LayerKey::ALL
        .iter()
        .map(|&key| {
            let view = match key {
                LayerKey::Application => data.layer7.as_ref().map(application_view),
                LayerKey::Presentation => data.layer6.as_ref().map(presentation_view),
                LayerKey::Session => data.layer5.as_ref().map(|l5| session_view(l5, http)),
                LayerKey::Transport => data.layer4.as_ref().map(transport_view),
                LayerKey::Network => data.layer3.as_ref().map(network_view),
                LayerKey::Link => data.layer1_2.as_ref().map(link_view),
            };
            if view.is_none() && raw.get(key.wire_key()).is_some() {
                debug!(layer = key.wire_key(), "layer object has unexpected shape");
            }
            LayerSnapshot {
                key,
                state: view.map_or(LayerState::Unknown, LayerState::Ready),
            }
        })
        .collect()
}

fn or_default(value: Option<&String>, default: &str) -> String {
    match value.map(|s| s.trim()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => default.to_string(),
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn application_view(l7: &ApplicationPayload) -> LayerView {
    let http = l7.http.as_ref();
    let robots = match l7.robots_txt.as_ref().and_then(|r| r.present) {
        Some(true) => RobotsStatus::Found,
        Some(false) => RobotsStatus::Missing,
        None => RobotsStatus::Unknown,
    };
    let cms = l7
        .cms
        .iter()
        .flatten()
        .filter(|(_, detected)| **detected)
        .map(|(name, _)| name.clone())
        .collect();
    let missing_security_headers = l7
        .security_headers
        .iter()
        .flatten()
        .filter(|(_, h)| h.present == Some(false))
        .map(|(name, _)| name.clone())
        .collect();

    LayerView::Application(ApplicationView {
        server: or_default(http.and_then(|h| h.server.as_ref()), UNKNOWN),
        status_code: http.and_then(|h| h.status_code),
        content_type: or_default(http.and_then(|h| h.content_type.as_ref()), DASH),
        robots,
        cms,
        missing_security_headers,
    })
}

fn presentation_view(l6: &PresentationPayload) -> LayerView {
    let tls = l6.tls.as_ref();
    let breakdown = l6.cipher_breakdown.as_ref();
    LayerView::Presentation(PresentationView {
        tls_version: or_default(tls.and_then(|t| t.version.as_ref()), UNKNOWN),
        days_remaining: tls.and_then(|t| t.days_remaining),
        cipher_suite: or_default(tls.and_then(|t| t.cipher_suite.as_ref()), UNKNOWN),
        key_exchange: or_default(breakdown.and_then(|b| b.key_exchange.as_ref()), UNKNOWN),
        encryption: or_default(breakdown.and_then(|b| b.encryption.as_ref()), UNKNOWN),
        mac: or_default(breakdown.and_then(|b| b.mac.as_ref()), UNKNOWN),
    })
}

fn session_view(l5: &SessionPayload, http: Option<&HttpInfo>) -> LayerView {
    // Older services only report these through the layer7 response headers.
    let keep_alive = l5.keep_alive.or_else(|| {
        http.and_then(|h| h.header("connection"))
            .map(|v| v.trim().eq_ignore_ascii_case("keep-alive"))
    });
    let cookies = match l5.cookies.as_ref() {
        Some(map) => map.keys().cloned().collect(),
        None => http
            .and_then(|h| h.header("set-cookie"))
            .and_then(|v| v.split(';').next())
            .and_then(|pair| pair.split('=').next())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .into_iter()
            .collect(),
    };

    LayerView::Session(SessionView {
        keep_alive,
        cookies,
        cookie_notes: l5.cookie_education.clone().unwrap_or_default(),
        websocket_support: l5.websocket_support,
    })
}

fn transport_view(l4: &TransportPayload) -> LayerView {
    let descriptions = l4.port_descriptions.as_ref();
    let mut ports: Vec<PortStatus> = l4
        .tcp_ports
        .iter()
        .flatten()
        .map(|(port, state)| PortStatus {
            port: port.clone(),
            state: PortState::parse(state),
            description: descriptions.and_then(|d| d.get(port)).cloned(),
        })
        .collect();
    ports.sort_by_key(|p| (p.port.parse::<u32>().unwrap_or(u32::MAX), p.port.clone()));

    let primary = ports
        .iter()
        .find(|p| p.state == PortState::Open)
        .or_else(|| ports.first());
    let established = primary.is_some_and(|p| p.state == PortState::Open);
    let primary_port = primary.map(|p| p.port.clone());

    LayerView::Transport(TransportView {
        latency_ms: positive(l4.latency_tcp_handshake),
        ports,
        primary_port,
        established,
        quic: or_default(l4.udp_quic.as_ref(), UNKNOWN),
    })
}

fn network_view(l3: &NetworkPayload) -> LayerView {
    let geo = l3.geolocation.as_ref();
    LayerView::Network(NetworkView {
        ip_address: or_default(l3.ip_address.as_ref(), "Unresolved"),
        city: or_default(geo.and_then(|g| g.city.as_ref()), "Unknown City"),
        country: or_default(geo.and_then(|g| g.country.as_ref()), "Unknown Country"),
        cdn: or_default(l3.cdn_detection.as_ref(), "None"),
        ping_ms: positive(l3.ping_latency),
    })
}

fn link_view(l12: &LinkPayload) -> LayerView {
    LayerView::Link(LinkView {
        interfaces: l12
            .interfaces
            .as_ref()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default(),
        gateway_ip: or_default(
            l12.default_gateway.as_ref().and_then(|g| g.gateway_ip.as_ref()),
            UNKNOWN,
        ),
    })
}

fn insight_from(data: &AnalysisData) -> Option<AnalysisInsight> {
    if data.ai_analysis.is_none() && data.journey.is_none() {
        return None;
    }
    let ai = data.ai_analysis.clone().unwrap_or_default();
    Some(AnalysisInsight {
        score: ai.score,
        risk_level: or_default(ai.risk_level.as_ref(), UNKNOWN),
        summary: ai.summary.unwrap_or_default(),
        findings: ai.findings.map(|f| f.len()).unwrap_or(0),
        journey: data
            .journey
            .iter()
            .flatten()
            .filter_map(|s| s.title.clone())
            .collect(),
    })
}
