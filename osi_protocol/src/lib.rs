use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sent once per session, right after the transport opens.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    #[serde(alias = "url")]
    pub target: String,
}

/// Service -> client frame. A session ends with either `complete` or `error`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ServerFrame {
    Error { error: String },
    Status(StatusFrame),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StatusFrame {
    Starting {
        #[serde(default)]
        message: String,
    },
    Complete {
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl ServerFrame {
    pub fn starting(message: impl Into<String>) -> Self {
        ServerFrame::Status(StatusFrame::Starting {
            message: message.into(),
        })
    }

    pub fn complete(data: serde_json::Value) -> Self {
        ServerFrame::Status(StatusFrame::Complete { data })
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: error.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ServerFrame::Status(StatusFrame::Starting { .. }))
    }
}

/// The fixed display taxonomy, in panel order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LayerKey {
    Application,
    Presentation,
    Session,
    Transport,
    Network,
    Link,
}

impl LayerKey {
    pub const ALL: [LayerKey; 6] = [
        LayerKey::Application,
        LayerKey::Presentation,
        LayerKey::Session,
        LayerKey::Transport,
        LayerKey::Network,
        LayerKey::Link,
    ];

    /// Key of this layer's object inside a `complete` frame's `data`.
    pub fn wire_key(self) -> &'static str {
        match self {
            LayerKey::Application => "layer7",
            LayerKey::Presentation => "layer6",
            LayerKey::Session => "layer5",
            LayerKey::Transport => "layer4",
            LayerKey::Network => "layer3",
            LayerKey::Link => "layer1_2",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            LayerKey::Application => "L7 Application",
            LayerKey::Presentation => "L6 Presentation",
            LayerKey::Session => "L5 Session",
            LayerKey::Transport => "L4 Transport",
            LayerKey::Network => "L3 Network",
            LayerKey::Link => "L1/L2 Link",
        }
    }
}

/// Field-level tolerant decoding: a value of the wrong JSON type reads as absent
/// instead of failing the enclosing record.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AnalysisData {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub layer7: Option<ApplicationPayload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub layer6: Option<PresentationPayload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub layer5: Option<SessionPayload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub layer4: Option<TransportPayload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub layer3: Option<NetworkPayload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub layer1_2: Option<LinkPayload>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AiAnalysis>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub journey: Option<Vec<JourneyStep>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ApplicationPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub robots_txt: Option<RobotsTxt>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cms: Option<BTreeMap<String, bool>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub security_headers: Option<BTreeMap<String, SecurityHeader>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct HttpInfo {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, serde_json::Value>>,
}

impl HttpInfo {
    /// Case-insensitive string header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RobotsTxt {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SecurityHeader {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PresentationPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsInfo>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cipher_breakdown: Option<CipherBreakdown>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TlsInfo {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cipher_suite: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CipherBreakdown {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub key_exchange: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SessionPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cookies: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cookie_education: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub websocket_support: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TransportPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub latency_tcp_handshake: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tcp_ports: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub port_descriptions: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub udp_quic: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NetworkPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cdn_detection: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ping_latency: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Geolocation {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LinkPayload {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<Gateway>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Gateway {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AiAnalysis {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub findings: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct JourneyStep {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
}
