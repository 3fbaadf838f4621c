//! AutoShare server tests against a fake camera registrar on loopback.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::receiver::read_message;
use super::{AutoSharePushServer, PushEvent, PushServerError, PushServerState};
use crate::collaborators::{CollaboratorError, PushedFileSink};
use crate::config::CamlinkConfig;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Reply {
    Accept,
    Pending,
    /// Accepts, but hangs up without ending the header.
    Unterminated,
    Silent,
}

/// Stands in for the camera's registration port. Records every message it gets.
struct FakeRegistrar {
    port: u16,
    messages: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeRegistrar {
    async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&messages);

        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let Ok(message) = read_message(&mut stream).await else {
                        return;
                    };
                    recorded.lock().unwrap().push(format!(
                        "{}\n{}",
                        message.header.request_line,
                        String::from_utf8_lossy(&message.body)
                    ));
                    let answer: &[u8] = match reply {
                        Reply::Accept => b"S2L/1.0 Result_OK\r\nContent-Length: 0\r\n\r\n",
                        Reply::Pending => b"S2L/1.0 Request_Pending\r\nContent-Length: 0\r\n\r\n",
                        Reply::Unterminated => b"S2L/1.0 Result_OK\r\nHost: SAMSUNG-S2L\r\n",
                        Reply::Silent => {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                            return;
                        }
                    };
                    let _ = stream.write_all(answer).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { port, messages, task }
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Drop for FakeRegistrar {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Default)]
struct RecordingSink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl PushedFileSink for RecordingSink {
    fn receive(&self, filename: &str, bytes: Vec<u8>) -> Result<(), CollaboratorError> {
        self.files.lock().unwrap().push((filename.to_string(), bytes));
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn test_config(registration_port: u16) -> CamlinkConfig {
    CamlinkConfig {
        push_listen_ip: Ipv4Addr::LOCALHOST,
        push_listen_port: 0,
        registration_port,
        handshake_attempts: 3,
        handshake_timeout: Duration::from_millis(200),
        handshake_timeout_pause: Duration::from_millis(10),
        handshake_error_pause: Duration::from_millis(10),
        bind_retry_backoff: Duration::from_millis(50),
        ..CamlinkConfig::default()
    }
}

fn server_with(config: &CamlinkConfig) -> (AutoSharePushServer, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (AutoSharePushServer::new(config, sink.clone()), sink)
}

async fn wait_until(server: &AutoSharePushServer, accept: impl Fn(PushServerState) -> bool) -> PushServerState {
    let mut states = server.subscribe_state();
    let reached = tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| accept(*s)))
        .await
        .expect("state not reached in time")
        .map(|s| *s);
    reached.expect("state channel closed")
}

/// A local port nothing listens on.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn push(port: u16, message: &[u8]) -> String {
    let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.unwrap();
    stream.write_all(message).await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    String::from_utf8(reply).unwrap()
}

async fn next_received(events: &mut broadcast::Receiver<PushEvent>) -> (String, usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let PushEvent::FileReceived { filename, bytes } = events.recv().await.unwrap() {
                return (filename, bytes);
            }
        }
    })
    .await
    .unwrap()
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn approved_camera_can_push_files() {
    let registrar = FakeRegistrar::start(Reply::Accept).await;
    let (server, sink) = server_with(&test_config(registrar.port));
    let mut events = server.subscribe();

    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();
    assert_eq!(wait_until(&server, |s| s == PushServerState::Approved).await, PushServerState::Approved);

    let port = server.listening_port().unwrap();
    let request = &registrar.messages()[0];
    assert!(request.starts_with("S2L/1.0 Request"));
    assert!(request.contains(&format!("<ClientPort>{port}</ClientPort>")));
    assert!(request.contains("<ClientIP>127.0.0.1</ClientIP>"));

    let reply = push(port, b"S2L/1.0 /DCIM/100PHOTO/SAM_0042.JPG\r\nContent-Length: 4\r\nHost: CAM\r\n\r\nJPEG").await;
    assert!(reply.starts_with("S2L/1.0 Result_OK\r\n"));
    assert_eq!(sink.files.lock().unwrap().as_slice(), &[("SAM_0042.JPG".to_string(), b"JPEG".to_vec())]);
    assert_eq!(next_received(&mut events).await, ("SAM_0042.JPG".to_string(), 4));

    server.stop().await;
}

#[tokio::test]
async fn reply_cut_off_before_blank_line_still_approves() {
    let registrar = FakeRegistrar::start(Reply::Unterminated).await;
    let (server, _sink) = server_with(&test_config(registrar.port));

    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();

    let state = wait_until(&server, |s| {
        matches!(s, PushServerState::Approved | PushServerState::AwaitingApproval | PushServerState::Unregistered)
    })
    .await;
    assert_eq!(state, PushServerState::Approved);
    assert_eq!(registrar.messages().len(), 1);
    assert!(!server.logs().iter().any(|e| e.message.contains("failed")));
    server.stop().await;
}

#[tokio::test]
async fn non_accepting_reply_means_awaiting_approval() {
    let registrar = FakeRegistrar::start(Reply::Pending).await;
    let (server, _sink) = server_with(&test_config(registrar.port));

    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();

    let state = wait_until(&server, |s| {
        matches!(s, PushServerState::Approved | PushServerState::AwaitingApproval | PushServerState::Unregistered)
    })
    .await;
    assert_eq!(state, PushServerState::AwaitingApproval);
    assert_eq!(registrar.messages().len(), 1);
    server.stop().await;
}

#[tokio::test]
async fn refused_registration_retries_then_keeps_listening() {
    let (server, sink) = server_with(&test_config(closed_port()));

    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();
    wait_until(&server, |s| s == PushServerState::Unregistered).await;

    let failures = server
        .logs()
        .iter()
        .filter(|e| e.message.contains("Registration attempt") && e.message.contains("failed"))
        .count();
    assert_eq!(failures, 3);

    // Unregistered is "init pending": pushes are still accepted.
    let port = server.listening_port().unwrap();
    let reply = push(port, b"S2L/1.0 /a/late.JPG\r\nContent-Length: 1\r\n\r\nX").await;
    assert!(reply.contains("Result_OK"));
    assert_eq!(sink.files.lock().unwrap().len(), 1);
    server.stop().await;
}

#[tokio::test]
async fn silent_camera_times_out_each_attempt() {
    let registrar = FakeRegistrar::start(Reply::Silent).await;
    let (server, _sink) = server_with(&test_config(registrar.port));
    let started = Instant::now();

    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();
    wait_until(&server, |s| s == PushServerState::Unregistered).await;

    assert!(started.elapsed() >= Duration::from_millis(600));
    assert_eq!(registrar.messages().len(), 3);
    let timeouts = server.logs().iter().filter(|e| e.message.contains("timed out")).count();
    assert_eq!(timeouts, 3);
    server.stop().await;
}

// ============================================================================
// Bind
// ============================================================================

#[tokio::test]
async fn bind_retries_while_port_is_taken() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken = blocker.local_addr().unwrap().port();
    let config = CamlinkConfig {
        push_listen_port: taken,
        ..test_config(closed_port())
    };
    let (server, _sink) = server_with(&config);

    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.state(), PushServerState::Starting);
    assert_eq!(server.listening_port(), None);

    drop(blocker);
    wait_until(&server, |s| !matches!(s, PushServerState::Starting | PushServerState::Stopped)).await;
    assert_eq!(server.listening_port(), Some(taken));
    server.stop().await;
}

#[tokio::test]
async fn unusable_address_is_terminal() {
    let config = CamlinkConfig {
        push_listen_ip: Ipv4Addr::new(203, 0, 113, 1),
        ..test_config(closed_port())
    };
    let (server, _sink) = server_with(&config);
    let mut events = server.subscribe();

    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();

    let stopped = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if events.recv().await.unwrap() == PushEvent::StateChanged(PushServerState::Stopped) {
                break;
            }
        }
    })
    .await;
    assert!(stopped.is_ok());
    assert!(server.logs().iter().any(|e| e.message.contains("Could not bind")));
    server.stop().await;
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test]
async fn stop_is_idempotent_and_safe_before_start() {
    let (server, _sink) = server_with(&test_config(closed_port()));
    server.stop().await;
    server.stop().await;
    assert_eq!(server.state(), PushServerState::Stopped);
    assert!(!server.is_running());
}

#[tokio::test]
async fn second_start_is_rejected() {
    let (server, _sink) = server_with(&test_config(closed_port()));
    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();
    assert_eq!(
        server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST),
        Err(PushServerError::AlreadyRunning)
    );
    server.stop().await;
    assert!(!server.is_running());
}

#[tokio::test]
async fn stop_says_goodbye_and_closes_listener() {
    let registrar = FakeRegistrar::start(Reply::Accept).await;
    let (server, _sink) = server_with(&test_config(registrar.port));

    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();
    wait_until(&server, |s| s == PushServerState::Approved).await;
    let port = server.listening_port().unwrap();

    server.stop().await;
    assert_eq!(server.state(), PushServerState::Stopped);
    assert_eq!(server.listening_port(), None);
    assert!(TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.is_err());

    let deadline = Instant::now() + Duration::from_secs(2);
    while !registrar.messages().iter().any(|m| m.contains("ByeBye")) {
        assert!(Instant::now() < deadline, "no ByeBye received");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn stop_cancels_open_connections() {
    let registrar = FakeRegistrar::start(Reply::Accept).await;
    let (server, sink) = server_with(&test_config(registrar.port));
    server.start(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST).unwrap();
    wait_until(&server, |s| s == PushServerState::Approved).await;

    // Header never finishes, so the handler waits forever.
    let mut camera = TcpStream::connect((Ipv4Addr::LOCALHOST, server.listening_port().unwrap()))
        .await
        .unwrap();
    camera.write_all(b"S2L/1.0 /a/slow.JPG\r\nContent-").await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while server.active_connections() == 0 {
        assert!(Instant::now() < deadline, "handler never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    server.stop().await;
    assert_eq!(server.active_connections(), 0);

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), camera.read(&mut buf))
        .await
        .expect("connection left open");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert!(sink.files.lock().unwrap().is_empty());
}
