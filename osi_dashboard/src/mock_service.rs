//! In-process stand-in for the analysis service, speaking the same frames.

use futures_util::{SinkExt, StreamExt};
use osi_protocol::{ClientRequest, ServerFrame};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

pub const WS_PATH: &str = "/api/v1/ws/analyze";

/// Targets under this reserved TLD get an error frame instead of a result.
pub const FAILING_TLD: &str = ".invalid";

pub struct MockAnalyzer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockAnalyzer {
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        Self::bind_with_delay(addr, Duration::ZERO).await
    }

    /// `complete_delay` is the pause between the `starting` and `complete` frames.
    pub async fn bind_with_delay(addr: &str, complete_delay: Duration) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(accept_loop(listener, complete_delay));
        Ok(Self { addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, WS_PATH)
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for MockAnalyzer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, complete_delay: Duration) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(serve(stream, peer, complete_delay));
            }
            Err(e) => warn!("accept failed: {e}"),
        }
    }
}

async fn serve(stream: TcpStream, peer: SocketAddr, complete_delay: Duration) {
    let mut ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "websocket handshake failed: {e}");
            return;
        }
    };
    debug!(%peer, "client connected");

    while let Some(Ok(msg)) = ws.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let (first, last) = respond(text.as_str());
        if send_frame(&mut ws, &first).await.is_err() {
            return;
        }
        if let Some(last) = last {
            if !complete_delay.is_zero() {
                tokio::time::sleep(complete_delay).await;
            }
            if send_frame(&mut ws, &last).await.is_err() {
                return;
            }
        }
    }
    debug!(%peer, "client gone");
}

async fn send_frame<S>(ws: &mut S, frame: &ServerFrame) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let payload = serde_json::to_string(frame).map_err(|_| ())?;
    ws.send(Message::Text(payload.into())).await.map_err(|_| ())
}

/// Frames answering one request: an immediate frame plus, for a valid target, the result.
pub fn respond(request: &str) -> (ServerFrame, Option<ServerFrame>) {
    let Ok(req) = serde_json::from_str::<ClientRequest>(request) else {
        return (ServerFrame::error("Invalid JSON"), None);
    };
    let target = req.target.trim();
    if target.is_empty() {
        return (ServerFrame::error("URL is required"), None);
    }
    if target.ends_with(FAILING_TLD) {
        return (
            ServerFrame::error(format!("Name resolution failed for {target}")),
            None,
        );
    }
    (
        ServerFrame::starting(format!("Analyzing {target}...")),
        Some(ServerFrame::complete(sample_payload(target))),
    )
}

/// Deterministic per-target result shaped like a real scan.
pub fn sample_payload(target: &str) -> Value {
    let seed: u32 = target.bytes().map(u32::from).sum();
    let latency = 10.0 + f64::from(seed % 90);
    let octet = seed % 254 + 1;

    json!({
        "layer7": {
            "http": {
                "server": "nginx",
                "status_code": 200,
                "content_type": "text/html; charset=utf-8",
                "headers": {
                    "Connection": "keep-alive",
                    "Set-Cookie": "sid=mock; Secure; HttpOnly"
                }
            },
            "robots_txt": { "present": true },
            "cms": { "WordPress": false, "Drupal": false },
            "security_headers": {
                "Strict-Transport-Security": { "present": true },
                "Content-Security-Policy": { "present": false }
            }
        },
        "layer6": {
            "tls": {
                "version": "TLSv1.3",
                "days_remaining": 42,
                "cipher_suite": "TLS_AES_256_GCM_SHA384",
                "valid": true
            },
            "cipher_breakdown": {
                "key_exchange": "ECDHE",
                "encryption": "AES-256-GCM",
                "mac": "SHA384"
            }
        },
        "layer5": {
            "keep_alive": true,
            "cookies": { "sid": { "secure": true, "httponly": true } },
            "cookie_education": { "sid": "Session identifier; Secure and HttpOnly are set." },
            "websocket_support": false
        },
        "layer4": {
            "latency_tcp_handshake": latency,
            "tcp_ports": { "443": "Open", "80": "Open", "22": "Closed/Filtered" },
            "port_descriptions": { "443": "HTTPS", "80": "HTTP", "22": "SSH" },
            "udp_quic": "Not Detected"
        },
        "layer3": {
            "ip_address": format!("203.0.113.{octet}"),
            "geolocation": { "city": "Amsterdam", "country": "Netherlands" },
            "cdn_detection": "None",
            "ping_latency": latency / 2.0
        },
        "layer1_2": {
            "interfaces": { "eth0": { "mac": "02:42:ac:11:00:02" } },
            "default_gateway": { "gateway_ip": "172.17.0.1" }
        },
        "ai_analysis": {
            "score": 72,
            "risk_level": "Medium",
            "summary": ["Content-Security-Policy header missing."],
            "findings": [{ "layer": "L7", "issue": "Missing CSP" }]
        },
        "journey": [
            { "step": 1, "title": "DNS Resolution", "layer": "L3" },
            { "step": 2, "title": "TCP Handshake", "layer": "L4" },
            { "step": 3, "title": "TLS Negotiation", "layer": "L6" },
            { "step": 4, "title": "HTTP Request", "layer": "L7" }
        ],
        "timestamp": 1_700_000_000.0
    })
}
