use crate::config::DashboardConfig;
use crate::connection::{Envelope, WsConnector};
use crate::dashboard::{Dashboard, DashboardCommand};
use crate::error::DashboardError;
use crate::sinks::Sinks;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

const COMMAND_BUFFER: usize = 32;

/// Cloneable entry point for whoever drives the dashboard (CLI, tests).
#[derive(Clone)]
pub struct DashboardHandle {
    tx: mpsc::Sender<DashboardCommand>,
}

impl DashboardHandle {
    pub async fn send(&self, command: DashboardCommand) -> Result<(), DashboardError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DashboardError::LoopStopped)
    }

    pub async fn start_analysis(&self, target: impl Into<String>) -> Result<(), DashboardError> {
        self.send(DashboardCommand::StartAnalysis(target.into())).await
    }

    pub async fn trigger_sequence(&self) -> Result<(), DashboardError> {
        self.send(DashboardCommand::TriggerSequence).await
    }

    pub async fn trigger_attack(&self) -> Result<(), DashboardError> {
        self.send(DashboardCommand::TriggerAttack).await
    }
}

pub struct DashboardRuntime {
    dashboard: Dashboard,
    commands: mpsc::Receiver<DashboardCommand>,
    transport: mpsc::UnboundedReceiver<Envelope>,
}

impl DashboardRuntime {
    /// Wires a dashboard to the real socket transport. Must be called inside a tokio runtime.
    pub fn new(config: &DashboardConfig, sinks: Sinks) -> Result<(Self, DashboardHandle), DashboardError> {
        config.validate()?;
        let (events_tx, transport) = mpsc::unbounded_channel();
        let connector = WsConnector::new(config.ws_url()?, events_tx);
        let dashboard = Dashboard::new(config, sinks, Box::new(connector));
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        Ok((
            Self {
                dashboard,
                commands,
                transport,
            },
            DashboardHandle { tx },
        ))
    }

    /// Runs until every `DashboardHandle` is dropped, then hands the dashboard back.
    pub async fn run(self) -> Dashboard {
        let Self {
            mut dashboard,
            mut commands,
            mut transport,
        } = self;
        let origin = Instant::now();

        loop {
            dashboard.advance_to(origin.elapsed());
            let deadline = dashboard.next_deadline().map(|d| origin + d);

            tokio::select! {
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    dashboard.advance_to(origin.elapsed());
                    dashboard.dispatch(cmd);
                }
                Some(envelope) = transport.recv() => {
                    dashboard.advance_to(origin.elapsed());
                    dashboard.handle_transport(envelope);
                }
                _ = sleep_until(deadline.unwrap_or(origin)), if deadline.is_some() => {}
            }
        }

        debug!("command channel closed; dashboard loop exiting");
        dashboard
    }
}
