//! Listener lifecycle: bind (with retry), register with the camera, accept pushes.

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};

use super::PushServerError;
use super::handshake::{self, HandshakeOutcome, HandshakeSettings};
use super::receiver::{PushOutcome, handle_push};
use crate::collaborators::PushedFileSink;
use crate::config::CamlinkConfig;
use crate::ignore_poison::IgnorePoison;
use crate::log_buffer::{LogBuffer, LogDirection, LogEntry};

/// Pause after a failed `accept` before trying again.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Capacity of the event channel. Slow subscribers lose the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PushServerState {
    Stopped,
    /// Binding the listener (retrying while the port is taken).
    Starting,
    Listening,
    Registering,
    Approved,
    AwaitingApproval,
    /// Registration got no answer. Still listening.
    Unregistered,
}

impl PushServerState {
    /// Whether the camera may consider us registered and deserves a ByeBye.
    fn is_registered(self) -> bool {
        matches!(self, Self::Approved | Self::AwaitingApproval)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Log(LogEntry),
    StateChanged(PushServerState),
    FileReceived { filename: String, bytes: usize },
}

/// State shared by the lifecycle task and every connection handler.
struct Shared {
    listen_ip: Ipv4Addr,
    listen_port: u16,
    bind_retry_backoff: Duration,
    handshake: HandshakeSettings,
    sink: Arc<dyn PushedFileSink>,
    state: watch::Sender<PushServerState>,
    events: broadcast::Sender<PushEvent>,
    log: LogBuffer,
    /// Open inbound connections, so `stop()` can cancel them.
    handlers: Mutex<HashMap<u64, AbortHandle>>,
    next_handler_id: AtomicU64,
    /// Port actually bound; 0 while not listening.
    bound_port: AtomicU16,
}

impl Shared {
    fn set_state(&self, state: PushServerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            self.record(LogDirection::Info, format!("State: {previous:?} -> {state:?}"));
            let _ = self.events.send(PushEvent::StateChanged(state));
        }
    }

    fn record(&self, direction: LogDirection, message: impl Into<String>) {
        let entry = self.log.push(direction, message);
        let _ = self.events.send(PushEvent::Log(entry));
    }

    async fn bind(&self) -> Result<TcpListener, PushServerError> {
        let address = SocketAddr::from((self.listen_ip, self.listen_port));
        loop {
            match TcpListener::bind(address).await {
                Ok(listener) => return Ok(listener),
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    debug!("AutoShare: {address} in use, retrying in {:?}", self.bind_retry_backoff);
                    tokio::time::sleep(self.bind_retry_backoff).await;
                }
                Err(e) => return Err(PushServerError::Bind(format!("{address}: {e}"))),
            }
        }
    }

    fn spawn_handler(self: &Arc<Self>, mut stream: TcpStream, peer: SocketAddr) {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(self);

        // Held across the spawn so the handler can't deregister before it's registered.
        let mut handlers = self.handlers.lock_ignore_poison();
        let task = tokio::spawn(async move {
            let outcome = handle_push(&mut stream, shared.sink.as_ref()).await;
            shared.report(peer, outcome);
            shared.handlers.lock_ignore_poison().remove(&id);
        });
        handlers.insert(id, task.abort_handle());
    }

    fn report(&self, peer: SocketAddr, outcome: Result<PushOutcome, PushServerError>) {
        match outcome {
            Ok(PushOutcome::Bye) => self.record(LogDirection::Received, format!("ByeBye from {peer}")),
            Ok(PushOutcome::Acknowledged { request_line }) => {
                self.record(LogDirection::Received, format!("{request_line} from {peer} (acknowledged)"));
            }
            Ok(PushOutcome::Received { filename, size }) => {
                self.record(LogDirection::Received, format!("Received {filename} ({size} bytes)"));
                let _ = self.events.send(PushEvent::FileReceived { filename, bytes: size });
            }
            Ok(PushOutcome::Incomplete {
                filename,
                received,
                expected,
            }) => {
                self.record(
                    LogDirection::Error,
                    format!("Incomplete push of {filename}: {received} of {expected} bytes"),
                );
            }
            Ok(PushOutcome::SinkFailed { filename, reason }) => {
                self.record(LogDirection::Error, format!("Could not store {filename}: {reason}"));
            }
            Err(e) => self.record(LogDirection::Error, format!("Push connection from {peer}: {e}")),
        }
    }

    fn abort_handlers(&self) -> usize {
        let handlers: Vec<AbortHandle> = self.handlers.lock_ignore_poison().drain().map(|(_, h)| h).collect();
        for handle in &handlers {
            handle.abort();
        }
        handlers.len()
    }
}

async fn run_lifecycle(shared: Arc<Shared>, camera_ip: Ipv4Addr, local_ip: Ipv4Addr) {
    let listener = match shared.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            shared.record(LogDirection::Error, e.to_string());
            shared.set_state(PushServerState::Stopped);
            return;
        }
    };
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(shared.listen_port);
    shared.bound_port.store(port, Ordering::Relaxed);
    info!("AutoShare: listening on {}:{port}", shared.listen_ip);
    shared.set_state(PushServerState::Listening);

    // The camera may push as soon as it approves us, so accept while registering.
    let registration = async {
        shared.set_state(PushServerState::Registering);
        let outcome = handshake::register(&shared.handshake, camera_ip, local_ip, port, &shared.log).await;
        shared.set_state(match outcome {
            HandshakeOutcome::Accepted => PushServerState::Approved,
            HandshakeOutcome::AwaitingApproval => PushServerState::AwaitingApproval,
            HandshakeOutcome::NoResponse => PushServerState::Unregistered,
        });
    };
    tokio::join!(accept_loop(&shared, listener), registration);
}

async fn accept_loop(shared: &Arc<Shared>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("AutoShare: connection from {peer}");
                shared.spawn_handler(stream, peer);
            }
            Err(e) => {
                warn!("AutoShare: accept failed: {e}");
                tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
            }
        }
    }
}

struct Lifecycle {
    camera_ip: Ipv4Addr,
    task: JoinHandle<()>,
}

/// Receives photos the camera pushes over S2L/1.0.
///
/// `start` returns at once; progress is visible through [`Self::subscribe_state`]
/// and [`Self::subscribe`].
pub struct AutoSharePushServer {
    shared: Arc<Shared>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl AutoSharePushServer {
    pub fn new(config: &CamlinkConfig, sink: Arc<dyn PushedFileSink>) -> Self {
        let (state, _) = watch::channel(PushServerState::Stopped);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                listen_ip: config.push_listen_ip,
                listen_port: config.push_listen_port,
                bind_retry_backoff: config.bind_retry_backoff,
                handshake: HandshakeSettings::from_config(config),
                sink,
                state,
                events,
                log: LogBuffer::new("autoshare", config.log_capacity),
                handlers: Mutex::new(HashMap::new()),
                next_handler_id: AtomicU64::new(0),
                bound_port: AtomicU16::new(0),
            }),
            lifecycle: Mutex::new(None),
        }
    }

    /// Binds, registers with `camera_ip` (announcing `local_ip`), and starts
    /// accepting pushes, all in the background.
    pub fn start(&self, camera_ip: Ipv4Addr, local_ip: Ipv4Addr) -> Result<(), PushServerError> {
        let mut lifecycle = self.lifecycle.lock_ignore_poison();
        if lifecycle.is_some() {
            return Err(PushServerError::AlreadyRunning);
        }
        self.shared
            .record(LogDirection::Info, format!("Starting AutoShare for camera {camera_ip}"));
        self.shared.set_state(PushServerState::Starting);
        let task = tokio::spawn(run_lifecycle(Arc::clone(&self.shared), camera_ip, local_ip));
        *lifecycle = Some(Lifecycle { camera_ip, task });
        Ok(())
    }

    /// Says goodbye (if registered), closes the listener and cancels every open
    /// connection. Idempotent.
    pub async fn stop(&self) {
        let lifecycle = self.lifecycle.lock_ignore_poison().take();
        let Some(lifecycle) = lifecycle else {
            return;
        };

        if self.state().is_registered() {
            handshake::send_bye(&self.shared.handshake, lifecycle.camera_ip, &self.shared.log).await;
        }

        lifecycle.task.abort();
        // Wait for the listener to drop so a restart can rebind the port.
        let _ = lifecycle.task.await;
        let cancelled = self.shared.abort_handlers();
        if cancelled > 0 {
            self.shared
                .record(LogDirection::Info, format!("Cancelled {cancelled} open connection(s)"));
        }
        self.shared.bound_port.store(0, Ordering::Relaxed);
        self.shared.set_state(PushServerState::Stopped);
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock_ignore_poison().is_some()
    }

    pub fn state(&self) -> PushServerState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PushServerState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.shared.events.subscribe()
    }

    /// The bound port, once listening. Differs from the configured one when
    /// configured as 0.
    pub fn listening_port(&self) -> Option<u16> {
        match self.shared.bound_port.load(Ordering::Relaxed) {
            0 => None,
            port => Some(port),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.shared.handlers.lock_ignore_poison().len()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.shared.log.snapshot()
    }
}

impl Drop for AutoSharePushServer {
    fn drop(&mut self) {
        if let Some(lifecycle) = self.lifecycle.lock_ignore_poison().take() {
            lifecycle.task.abort();
        }
        self.shared.abort_handlers();
    }
}
