use crate::error::DashboardError;
use crate::sinks::Severity;
use futures_util::{Sink, SinkExt, StreamExt};
use osi_protocol::{ClientRequest, ServerFrame, StatusFrame};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

pub type Generation = u64;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Awaiting,
    Complete,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Socket open and request sent.
    Opened,
    Frame(String),
    Failed(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub generation: Generation,
    pub event: TransportEvent,
}

pub trait SessionHandle {
    fn close(&mut self);
}

/// Opens the transport for one session. Events come back through whatever
/// channel the connector was built with, tagged with `generation`.
pub trait Connector {
    fn open(&mut self, generation: Generation, target: &str) -> Box<dyn SessionHandle>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    SessionStarted { generation: Generation, target: String },
    Log { severity: Severity, message: String },
    /// A well-formed frame arrived for the current session.
    FrameAccepted,
    Result(serde_json::Value),
    Ended { state: SessionState },
}

impl ControllerEvent {
    fn log(severity: Severity, message: impl Into<String>) -> Self {
        ControllerEvent::Log {
            severity,
            message: message.into(),
        }
    }
}

pub struct ScanSession {
    pub generation: Generation,
    pub target: String,
    pub state: SessionState,
    handle: Option<Box<dyn SessionHandle>>,
}

impl ScanSession {
    fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }
}

pub struct ConnectionController {
    connector: Box<dyn Connector>,
    generation: Generation,
    session: Option<ScanSession>,
}

impl ConnectionController {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            generation: 0,
            session: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn session(&self) -> Option<&ScanSession> {
        self.session.as_ref()
    }

    pub fn target(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.target.as_str())
    }

    pub fn state(&self) -> SessionState {
        self.session.as_ref().map_or(SessionState::Idle, |s| s.state)
    }

    /// Closes any prior session and opens a new one for `target`.
    pub fn start_analysis(&mut self, target: &str) -> Result<Vec<ControllerEvent>, DashboardError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(DashboardError::EmptyTarget);
        }

        let mut events = vec![ControllerEvent::log(
            Severity::Info,
            format!("Initiating scan sequence for target: {target}"),
        )];
        if let Some(mut prior) = self.session.take() {
            debug!(generation = prior.generation, "closing superseded session");
            prior.close();
        }

        self.generation += 1;
        let generation = self.generation;
        events.push(ControllerEvent::SessionStarted {
            generation,
            target: target.to_string(),
        });

        let handle = self.connector.open(generation, target);
        self.session = Some(ScanSession {
            generation,
            target: target.to_string(),
            state: SessionState::Connecting,
            handle: Some(handle),
        });
        info!(generation, target, "analysis session started");
        Ok(events)
    }

    pub fn handle(&mut self, envelope: Envelope) -> Vec<ControllerEvent> {
        let Some(session) = self.session.as_mut() else {
            debug!(generation = envelope.generation, "transport event with no session");
            return Vec::new();
        };
        if envelope.generation != session.generation {
            debug!(
                stale = envelope.generation,
                current = session.generation,
                "dropping event from superseded session"
            );
            return Vec::new();
        }
        if session.state.is_terminal() {
            debug!(generation = session.generation, "event after terminal state ignored");
            return Vec::new();
        }

        match envelope.event {
            TransportEvent::Opened => {
                session.state = SessionState::Awaiting;
                vec![ControllerEvent::log(
                    Severity::Info,
                    "WebSocket connection established. Sending payload...",
                )]
            }
            TransportEvent::Frame(text) => handle_frame(session, &text),
            TransportEvent::Failed(reason) => {
                error!(generation = session.generation, %reason, "transport failed");
                fail(session, DashboardError::Transport(reason))
            }
            TransportEvent::Closed => {
                warn!(generation = session.generation, "socket closed before a terminal frame");
                fail(
                    session,
                    DashboardError::Transport("closed before analysis completed".to_string()),
                )
            }
        }
    }
}

fn handle_frame(session: &mut ScanSession, text: &str) -> Vec<ControllerEvent> {
    let frame: ServerFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(generation = session.generation, "malformed frame: {e}");
            return vec![ControllerEvent::log(
                Severity::Warn,
                DashboardError::MalformedFrame(e).to_string(),
            )];
        }
    };

    match frame {
        ServerFrame::Status(StatusFrame::Starting { message }) => {
            let message = if message.is_empty() {
                "Analysis started...".to_string()
            } else {
                message
            };
            vec![
                ControllerEvent::FrameAccepted,
                ControllerEvent::log(Severity::Info, message),
            ]
        }
        ServerFrame::Status(StatusFrame::Complete { data }) => {
            session.state = SessionState::Complete;
            session.close();
            info!(generation = session.generation, "analysis complete");
            vec![
                ControllerEvent::FrameAccepted,
                ControllerEvent::log(Severity::Info, "Analysis complete. Parsing results..."),
                ControllerEvent::Result(data),
                ControllerEvent::Ended {
                    state: SessionState::Complete,
                },
            ]
        }
        ServerFrame::Error { error } => {
            let mut events = vec![ControllerEvent::FrameAccepted];
            events.extend(fail(session, DashboardError::Service(error)));
            events
        }
    }
}

fn fail(session: &mut ScanSession, err: DashboardError) -> Vec<ControllerEvent> {
    session.state = SessionState::Failed;
    session.close();
    vec![
        ControllerEvent::log(Severity::Error, err.to_string()),
        ControllerEvent::Ended {
            state: SessionState::Failed,
        },
    ]
}

/// Real socket transport. Each session runs as its own tokio task.
pub struct WsConnector {
    url: Url,
    events: mpsc::UnboundedSender<Envelope>,
}

impl WsConnector {
    pub fn new(url: Url, events: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { url, events }
    }
}

impl Connector for WsConnector {
    fn open(&mut self, generation: Generation, target: &str) -> Box<dyn SessionHandle> {
        let task = tokio::spawn(run_session(
            self.url.clone(),
            generation,
            target.to_string(),
            self.events.clone(),
        ));
        Box::new(WsSession { task })
    }
}

struct WsSession {
    task: JoinHandle<()>,
}

impl SessionHandle for WsSession {
    fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for WsSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_session(
    url: Url,
    generation: Generation,
    target: String,
    events: mpsc::UnboundedSender<Envelope>,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send(Envelope { generation, event });
    };

    let socket = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((socket, _)) => socket,
        Err(e) => {
            emit(TransportEvent::Failed(e.to_string()));
            return;
        }
    };
    let (mut write, mut read) = socket.split();

    if send_json(&mut write, &ClientRequest { target }).await.is_err() {
        emit(TransportEvent::Failed("could not send request".to_string()));
        return;
    }
    emit(TransportEvent::Opened);

    while let Some(incoming) = read.next().await {
        match incoming {
            Ok(Message::Text(text)) => emit(TransportEvent::Frame(text.as_str().to_owned())),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                emit(TransportEvent::Failed(e.to_string()));
                return;
            }
        }
    }
    emit(TransportEvent::Closed);
}

async fn send_json<S, T>(sink: &mut S, msg: &T) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(payload.into())).await.map_err(|_| ())
}
