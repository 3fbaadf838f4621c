//! Top-level connection state machine.
//!
//! Detects the camera network, probes which protocol the camera is offering,
//! and drives the matching client:
//!
//! ```text
//! Disconnected -> DetectingNetwork -> NetworkFound -> Connecting
//!     -> Connected (DLNA, PTP) | PushModeActive (AutoShare) | Error
//! ```
//!
//! Transitions are serialized by one async lock. State is published on a
//! `watch` channel; the push server reports back over its own event channel.

mod errors;
mod network;
mod probe;
mod session;
mod sync;


pub use errors::OrchestratorError;
pub use network::{camera_ssid, matching_pattern};
pub use probe::{DIAGNOSTIC_PORTS, first_reachable, probe_all, probe_reachable, sweep_ports};
pub use sync::SyncReport;

use log::{debug, warn};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::autoshare::{AutoSharePushServer, PushEvent, PushServerState};
use crate::collaborators::{
    LibraryPushSink, MediaStore, NetworkInfo, PhotoLibrarySink, PushedFileSink, ThumbnailCache,
};
use crate::config::{CamlinkConfig, ProbeTarget};
use crate::dlna::DlnaClient;
use crate::ignore_poison::IgnorePoison;
use crate::log_buffer::{LogBuffer, LogEntry};
use crate::ptp::PtpClient;
use crate::types::{ConnectionMode, ConnectionStatus, DiscoveredService};
use session::PullSession;
use sync::{SyncTargets, sync_pass};

/// Services the orchestrator hands results to. Built once by the host app.
#[derive(Clone)]
pub struct Collaborators {
    pub media_store: Arc<dyn MediaStore>,
    pub library: Arc<dyn PhotoLibrarySink>,
    pub thumbnails: Arc<dyn ThumbnailCache>,
    pub network: Arc<dyn NetworkInfo>,
    pub push_sink: Arc<dyn PushedFileSink>,
}

impl Collaborators {
    /// Pushed files go to the same library and store as pulled ones.
    pub fn new(
        media_store: Arc<dyn MediaStore>,
        library: Arc<dyn PhotoLibrarySink>,
        thumbnails: Arc<dyn ThumbnailCache>,
        network: Arc<dyn NetworkInfo>,
    ) -> Self {
        let push_sink: Arc<dyn PushedFileSink> = Arc::new(LibraryPushSink::new(Arc::clone(&library), Arc::clone(&media_store)));
        Self {
            media_store,
            library,
            thumbnails,
            network,
            push_sink,
        }
    }
}

/// What `connect` found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub target: ProbeTarget,
    /// The automatic first sync (pull modes). `None` in push mode, or when the
    /// listing failed (see the logs).
    pub initial_sync: Option<SyncReport>,
}

/// Result of a remote capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Content URL (DLNA) or object handle (PTP) of the new photo, when reported.
    pub object: Option<String>,
    pub sync: SyncReport,
}

enum ActiveLink {
    Idle,
    Pull(PullSession),
    Push {
        server: AutoSharePushServer,
        forwarder: JoinHandle<()>,
    },
}

pub struct ConnectionOrchestrator {
    config: CamlinkConfig,
    collaborators: Collaborators,
    status: Arc<watch::Sender<ConnectionStatus>>,
    log: LogBuffer,
    /// Log of the current pull client, merged into `logs()`.
    session_log: Mutex<Option<LogBuffer>>,
    /// Held for the whole of every transition.
    link: tokio::sync::Mutex<ActiveLink>,
}

impl ConnectionOrchestrator {
    pub fn new(config: CamlinkConfig, collaborators: Collaborators) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let log = LogBuffer::new("orchestrator", config.log_capacity);
        Self {
            config,
            collaborators,
            status: Arc::new(status),
            log,
            session_log: Mutex::new(None),
            link: tokio::sync::Mutex::new(ActiveLink::Idle),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Orchestrator entries (including forwarded AutoShare entries) plus the
    /// current pull client's, oldest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        let mut entries = self.log.snapshot();
        if let Some(session_log) = self.session_log.lock_ignore_poison().as_ref() {
            entries.extend(session_log.snapshot());
        }
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status.clone());
        if previous != status {
            self.log.info(format!("Status: {previous:?} -> {status:?}"));
        }
    }

    fn fail(&self, error: &OrchestratorError) {
        self.log.error(error.to_string());
        self.set_status(ConnectionStatus::Error(error.to_string()));
    }

    /// Probes the configured table and returns the lowest-index row that answers.
    pub async fn detect(&self) -> Option<ProbeTarget> {
        let wait = self.config.probe_timeout;
        let target = first_reachable(&self.config.probe_table, |target| {
            probe_reachable(target.ip, target.port, wait)
        })
        .await;
        match &target {
            Some(t) => self.log.info(format!("Camera answers at {}:{} ({:?})", t.ip, t.port, t.mode)),
            None => self.log.error("No probe target answered"),
        };
        target
    }

    /// Diagnostics: which well-known camera ports answer on `ip`.
    pub async fn discover_services(&self, ip: Ipv4Addr) -> Vec<DiscoveredService> {
        sweep_ports(ip, &DIAGNOSTIC_PORTS, self.config.probe_timeout).await
    }

    /// Detects the camera and connects in whatever mode it offers. Any existing
    /// connection is torn down first. Pull modes run a first sync pass.
    pub async fn connect(&self) -> Result<ConnectOutcome, OrchestratorError> {
        let mut link = self.link.lock().await;
        self.teardown(&mut link).await;

        self.set_status(ConnectionStatus::DetectingNetwork);
        let ssid = camera_ssid(self.collaborators.network.as_ref(), &self.config.ssid_patterns);
        match &ssid {
            Some(ssid) => self.log.info(format!("Joined camera network {ssid}")),
            None => self.log.info("Camera network not recognized by SSID; probing anyway"),
        };

        let Some(target) = self.detect().await else {
            let error = OrchestratorError::NoCameraFound;
            self.fail(&error);
            return Err(error);
        };
        self.set_status(ConnectionStatus::NetworkFound(ssid.unwrap_or_else(|| target.ip.to_string())));
        self.set_status(ConnectionStatus::Connecting);

        let connected = match target.mode {
            ConnectionMode::Pull => self.connect_dlna(target).await,
            ConnectionMode::Ptp => self.connect_ptp(target).await,
            ConnectionMode::Push => self.start_push(target),
        };
        *link = match connected {
            Ok(active) => active,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        let initial_sync = match &mut *link {
            ActiveLink::Pull(session) => {
                self.set_status(ConnectionStatus::Connected);
                match sync_pass(session, &self.sync_targets(), &self.log).await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        self.log.error(format!("Initial listing failed: {e}"));
                        None
                    }
                }
            }
            ActiveLink::Push { server, .. } => {
                self.set_status(ConnectionStatus::PushModeActive);
                // The listener may have given up before the forwarder could see us active.
                if server.state() == PushServerState::Stopped {
                    self.set_status(ConnectionStatus::Error("AutoShare listener stopped".to_string()));
                }
                None
            }
            ActiveLink::Idle => None,
        };

        Ok(ConnectOutcome { target, initial_sync })
    }

    async fn connect_dlna(&self, target: ProbeTarget) -> Result<ActiveLink, OrchestratorError> {
        let mut client = DlnaClient::new(&self.config)?;
        self.adopt_session_log(client.log_buffer().clone());
        let description = client.connect(&target.ip.to_string(), target.port).await?;
        self.log.info(format!(
            "DLNA: {} {} ({})",
            description.manufacturer, description.model_name, description.friendly_name
        ));
        Ok(ActiveLink::Pull(PullSession::Dlna(client)))
    }

    async fn connect_ptp(&self, target: ProbeTarget) -> Result<ActiveLink, OrchestratorError> {
        let mut client = PtpClient::new(&self.config);
        self.adopt_session_log(client.log_buffer().clone());
        let info = match client.connect(&target.ip.to_string(), target.port).await {
            Ok(info) => info,
            Err(e) => {
                client.disconnect().await;
                return Err(e.into());
            }
        };
        self.log.info(format!("PTP/IP: {} {} ({})", info.manufacturer, info.model, info.serial_number));
        Ok(ActiveLink::Pull(PullSession::Ptp(client)))
    }

    fn start_push(&self, target: ProbeTarget) -> Result<ActiveLink, OrchestratorError> {
        let local_ip = self
            .collaborators
            .network
            .local_ip_toward(target.ip)
            .unwrap_or_else(|| {
                warn!("No local address toward {}; announcing 0.0.0.0", target.ip);
                Ipv4Addr::UNSPECIFIED
            });

        let config = CamlinkConfig {
            registration_port: target.port,
            ..self.config.clone()
        };
        let server = AutoSharePushServer::new(&config, Arc::clone(&self.collaborators.push_sink));
        let forwarder = spawn_forwarder(server.subscribe(), self.log.clone(), Arc::clone(&self.status));
        if let Err(e) = server.start(target.ip, local_ip) {
            forwarder.abort();
            return Err(e.into());
        }
        Ok(ActiveLink::Push { server, forwarder })
    }

    fn adopt_session_log(&self, log: LogBuffer) {
        *self.session_log.lock_ignore_poison() = Some(log);
    }

    fn sync_targets(&self) -> SyncTargets<'_> {
        SyncTargets {
            store: self.collaborators.media_store.as_ref(),
            library: self.collaborators.library.as_ref(),
            thumbnails: self.collaborators.thumbnails.as_ref(),
        }
    }

    async fn teardown(&self, link: &mut ActiveLink) {
        match std::mem::replace(link, ActiveLink::Idle) {
            ActiveLink::Idle => {}
            ActiveLink::Pull(mut session) => {
                session.disconnect().await;
                self.log.info("Pull session closed");
            }
            ActiveLink::Push { server, forwarder } => {
                // Stop forwarding first so our own shutdown isn't reported as a failure.
                forwarder.abort();
                server.stop().await;
                self.log.info("AutoShare stopped");
            }
        }
    }

    /// Closes whatever is open. Idempotent.
    pub async fn disconnect(&self) {
        let mut link = self.link.lock().await;
        self.teardown(&mut link).await;
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Re-lists the camera and syncs anything new. Pull modes only.
    pub async fn refresh(&self) -> Result<SyncReport, OrchestratorError> {
        let mut link = self.link.lock().await;
        let ActiveLink::Pull(session) = &mut *link else {
            return Err(OrchestratorError::NotConnected);
        };
        sync_pass(session, &self.sync_targets(), &self.log).await
    }

    /// Fires the shutter, then syncs so the new photo lands in the library.
    /// Pull modes only.
    pub async fn capture(&self) -> Result<CaptureOutcome, OrchestratorError> {
        let mut link = self.link.lock().await;
        let ActiveLink::Pull(session) = &mut *link else {
            return Err(OrchestratorError::NotConnected);
        };
        let object = session.capture(self.config.ptp_step_timeout).await?;
        match &object {
            Some(object) => self.log.info(format!("Captured {object}")),
            None => self.log.info("Capture finished without an object reference"),
        };
        let sync = sync_pass(session, &self.sync_targets(), &self.log).await?;
        Ok(CaptureOutcome { object, sync })
    }

    /// State of the AutoShare server while in push mode.
    pub async fn push_state(&self) -> Option<PushServerState> {
        match &*self.link.lock().await {
            ActiveLink::Push { server, .. } => Some(server.state()),
            _ => None,
        }
    }

    /// Port the AutoShare server is listening on while in push mode.
    pub async fn push_listening_port(&self) -> Option<u16> {
        match &*self.link.lock().await {
            ActiveLink::Push { server, .. } => server.listening_port(),
            _ => None,
        }
    }
}

/// Copies AutoShare events into the orchestrator log, and turns an unexpected
/// listener stop into an `Error` status.
fn spawn_forwarder(
    mut events: broadcast::Receiver<PushEvent>,
    log: LogBuffer,
    status: Arc<watch::Sender<ConnectionStatus>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PushEvent::Log(entry)) => {
                    log.push(entry.direction, format!("[autoshare] {}", entry.message));
                }
                Ok(PushEvent::FileReceived { filename, bytes }) => {
                    log.info(format!("Camera pushed {filename} ({bytes} bytes)"));
                }
                Ok(PushEvent::StateChanged(PushServerState::Stopped)) => {
                    status.send_if_modified(|current| {
                        if *current != ConnectionStatus::PushModeActive {
                            return false;
                        }
                        *current = ConnectionStatus::Error("AutoShare listener stopped".to_string());
                        true
                    });
                }
                Ok(PushEvent::StateChanged(_)) => {}
                Err(RecvError::Lagged(missed)) => debug!("Orchestrator missed {missed} AutoShare events"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
