use crate::chart_feed::{ChartFeed, TrendStyle};
use crate::config::AttackConfig;
use crate::connection::Generation;
use crate::sinks::{LogEntry, PanelContent, Severity, Sinks};
use crate::telemetry::LayerSnapshot;
use crate::timer::{TimerKind, TimerOwner, TimerQueue};
use osi_protocol::LayerKey;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const DETECTED: &str = "DDOS SIGNATURE DETECTED";
pub const SOURCE: &str = "Source: 192.168.1.X (Botnet)";
pub const MITIGATED: &str = "Attack mitigated. Firewalls active.";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Critical,
    High,
    Medium,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncidentContent {
    pub title: &'static str,
    pub severity: IncidentSeverity,
    pub description: &'static str,
}

pub fn incident_for(key: LayerKey) -> IncidentContent {
    let (title, severity, description) = match key {
        LayerKey::Application => (
            "HTTP Flood",
            IncidentSeverity::Critical,
            "Request rate far above baseline; origin workers saturated.",
        ),
        LayerKey::Presentation => (
            "TLS Handshake Exhaustion",
            IncidentSeverity::High,
            "Renegotiation storm pinning CPU on handshake processing.",
        ),
        LayerKey::Session => (
            "Session Table Saturation",
            IncidentSeverity::High,
            "Half-open sessions are evicting legitimate clients.",
        ),
        LayerKey::Transport => (
            "SYN Flood",
            IncidentSeverity::Critical,
            "Backlog full of SYN_RECV entries; new connections dropped.",
        ),
        LayerKey::Network => (
            "Volumetric Spoofed Traffic",
            IncidentSeverity::Critical,
            "Spoofed sources from 192.168.1.X saturating ingress.",
        ),
        LayerKey::Link => (
            "Uplink Congestion",
            IncidentSeverity::Medium,
            "Interface queues overflowing; frames dropped at the gateway.",
        ),
    };
    IncidentContent {
        title,
        severity,
        description,
    }
}

/// What the panels show once the overlay ends.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestorePolicy {
    #[default]
    Placeholder,
    /// The panel content captured when the overlay started.
    PriorContent,
}

impl FromStr for RestorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "placeholder" => Ok(Self::Placeholder),
            "prior" | "prior_content" => Ok(Self::PriorContent),
            other => Err(format!("unknown restore policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttackEvent {
    pub started_at_ms: u64,
    pub tick_count: u32,
    pub max_ticks: u32,
    /// Session generation the prior snapshots belong to.
    pub generation: Generation,
    pub prior: Vec<LayerSnapshot>,
}

/// Everything the overlay touches outside itself.
pub struct OverlayContext<'a> {
    pub timers: &'a mut TimerQueue,
    pub chart: &'a mut ChartFeed,
    pub sinks: &'a mut Sinks,
    pub current: &'a [LayerSnapshot],
    pub generation: Generation,
}

impl OverlayContext<'_> {
    fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let at_ms = self.timers.now_ms();
        self.sinks.log.append(LogEntry {
            at_ms,
            severity,
            message: message.into(),
        });
    }

    fn render_chart(&mut self) {
        self.sinks
            .chart
            .render(&self.chart.snapshot(), self.chart.style());
    }
}

pub struct AttackOverlay {
    config: AttackConfig,
    event: Option<AttackEvent>,
    token: u64,
    rng: StdRng,
}

impl AttackOverlay {
    pub fn new(config: AttackConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            event: None,
            token: 0,
            rng,
        }
    }

    pub fn is_active(&self) -> bool {
        self.event.is_some()
    }

    pub fn event(&self) -> Option<&AttackEvent> {
        self.event.as_ref()
    }

    pub fn tick_count(&self) -> u32 {
        self.event.as_ref().map_or(0, |e| e.tick_count)
    }

    /// Starts the overlay. A trigger while active is ignored; returns whether it started.
    pub fn trigger(&mut self, ctx: &mut OverlayContext<'_>) -> bool {
        if let Some(event) = &self.event {
            debug!(tick = event.tick_count, "attack overlay already active");
            return false;
        }
        self.token += 1;
        self.event = Some(AttackEvent {
            started_at_ms: ctx.timers.now_ms(),
            tick_count: 0,
            max_ticks: self.config.max_ticks,
            generation: ctx.generation,
            prior: ctx.current.to_vec(),
        });

        ctx.log(Severity::Attack, DETECTED);
        ctx.log(Severity::Attack, SOURCE);
        for key in LayerKey::ALL {
            ctx.sinks
                .panels
                .render(key, PanelContent::Incident(incident_for(key)));
        }
        ctx.chart.set_style(TrendStyle::Incident);
        ctx.render_chart();

        warn!(max_ticks = self.config.max_ticks, "attack overlay engaged");
        if self.config.max_ticks == 0 {
            self.stop(ctx);
        } else {
            self.schedule_tick(ctx.timers);
        }
        true
    }

    pub fn on_tick(&mut self, token: u64, ctx: &mut OverlayContext<'_>) {
        if token != self.token {
            debug!(token, current = self.token, "tick from a stopped overlay ignored");
            return;
        }
        let Some(event) = self.event.as_mut() else {
            return;
        };

        let span = self.config.latency_span_ms;
        let jitter = if span.is_finite() && span > 0.0 {
            self.rng.gen_range(0.0..span)
        } else {
            0.0
        };
        let value = self.config.latency_floor_ms + jitter;
        let now = ctx.timers.now_ms();
        ctx.chart.push(now, value);
        ctx.render_chart();

        let drop = self.config.drop_probability;
        let drop = if drop.is_nan() { 0.0 } else { drop.clamp(0.0, 1.0) };
        if self.rng.gen_bool(drop) {
            let packet: u32 = self.rng.gen_range(0..90_000);
            ctx.log(Severity::Attack, format!("DROP: Packet #{packet}"));
        }
        ctx.sinks.scene.spawn_attack_burst();

        event.tick_count += 1;
        if event.tick_count >= event.max_ticks {
            self.stop(ctx);
        } else {
            self.schedule_tick(ctx.timers);
        }
    }

    /// Ends the overlay and restores panels and chart. Returns false if it was not active.
    pub fn stop(&mut self, ctx: &mut OverlayContext<'_>) -> bool {
        let Some(event) = self.event.take() else {
            return false;
        };
        ctx.timers.cancel(TimerOwner::Overlay);
        self.token += 1;

        match self.config.restore {
            RestorePolicy::Placeholder => {
                for key in LayerKey::ALL {
                    ctx.sinks.panels.render(key, PanelContent::Placeholder);
                }
            }
            RestorePolicy::PriorContent => {
                // A newer session owns the panels now; its state wins over the capture.
                let snaps = if event.generation == ctx.generation {
                    event.prior.as_slice()
                } else {
                    debug!(
                        captured = event.generation,
                        current = ctx.generation,
                        "session changed during overlay, restoring live panels"
                    );
                    ctx.current
                };
                for snap in snaps {
                    ctx.sinks.panels.render(snap.key, PanelContent::from(&snap.state));
                }
            }
        }
        ctx.chart.set_style(TrendStyle::Baseline);
        ctx.render_chart();
        ctx.log(Severity::Info, MITIGATED);
        info!(ticks = event.tick_count, "attack overlay stopped");
        true
    }

    fn schedule_tick(&self, timers: &mut TimerQueue) {
        timers.schedule(
            TimerOwner::Overlay,
            self.token,
            self.config.tick(),
            TimerKind::OverlayTick,
        );
    }
}
