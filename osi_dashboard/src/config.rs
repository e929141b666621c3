use crate::attack::RestorePolicy;
use crate::chart_feed::DEFAULT_CAPACITY;
use crate::error::DashboardError;
use crate::sinks::TopologyMode;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/api/v1/ws/analyze";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub tick_ms: u64,
    pub max_ticks: u32,
    /// Chance per tick of a "DROP" log line.
    pub drop_probability: f64,
    pub latency_floor_ms: f64,
    pub latency_span_ms: f64,
    pub restore: RestorePolicy,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            max_ticks: 100,
            drop_probability: 0.3,
            latency_floor_ms: 200.0,
            latency_span_ms: 500.0,
            restore: RestorePolicy::default(),
            seed: None,
        }
    }
}

impl AttackConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub ws_url: String,
    pub chart_capacity: usize,
    pub topology: TopologyMode,
    pub attack: AttackConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            chart_capacity: DEFAULT_CAPACITY,
            topology: TopologyMode::default(),
            attack: AttackConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Defaults overridden by `OSI_*` environment variables.
    pub fn from_env() -> Result<Self, DashboardError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DashboardError> {
        let get = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        };

        let mut cfg = Self::default();
        if let Some((_, v)) = get("OSI_WS_URL") {
            cfg.ws_url = v;
        }
        if let Some(kv) = get("OSI_CHART_CAPACITY") {
            cfg.chart_capacity = parse(kv)?;
        }
        if let Some(kv) = get("OSI_TOPOLOGY") {
            cfg.topology = parse(kv)?;
        }
        if let Some(kv) = get("OSI_ATTACK_TICK_MS") {
            cfg.attack.tick_ms = parse(kv)?;
        }
        if let Some(kv) = get("OSI_ATTACK_MAX_TICKS") {
            cfg.attack.max_ticks = parse(kv)?;
        }
        if let Some(kv) = get("OSI_ATTACK_RESTORE") {
            cfg.attack.restore = parse(kv)?;
        }
        if let Some(kv) = get("OSI_ATTACK_SEED") {
            cfg.attack.seed = Some(parse(kv)?);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        self.ws_url()?;
        if self.chart_capacity == 0 {
            return Err(invalid("chart_capacity", "0", "must be at least 1"));
        }
        if self.attack.tick_ms == 0 {
            return Err(invalid("attack.tick_ms", "0", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.attack.drop_probability) {
            return Err(invalid(
                "attack.drop_probability",
                &self.attack.drop_probability.to_string(),
                "must be within 0..=1",
            ));
        }
        if self.attack.latency_span_ms.is_nan() || self.attack.latency_span_ms <= 0.0 {
            return Err(invalid(
                "attack.latency_span_ms",
                &self.attack.latency_span_ms.to_string(),
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn ws_url(&self) -> Result<Url, DashboardError> {
        let url = Url::parse(&self.ws_url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(invalid("ws_url", &self.ws_url, &format!("unsupported scheme {other}"))),
        }
    }
}

fn parse<T: FromStr>((key, value): (&'static str, String)) -> Result<T, DashboardError> {
    value.parse().map_err(|_| DashboardError::Config {
        key,
        value,
        reason: "could not parse".to_string(),
    })
}

fn invalid(key: &'static str, value: &str, reason: &str) -> DashboardError {
    DashboardError::Config {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for TopologyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "osi" => Ok(Self::Osi),
            "tcp_ip" | "tcpip" | "tcp/ip" => Ok(Self::TcpIp),
            other => Err(format!("unknown topology: {other}")),
        }
    }
}
