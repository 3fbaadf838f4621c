//! Camera diagnostics from the command line.
//!
//! Usage:
//!   camlink-probe sweep <ip>                  Check every well-known camera port on <ip>
//!   camlink-probe detect                      Probe the configured table, print the winner
//!   camlink-probe connect [--out DIR] [--wait SECS] [--ssid SSID]
//!                                             Connect, sync into DIR, print the report
//!
//! Results go to stdout as JSON. Logs go to stderr (`RUST_LOG`).
//!
//! Environment variables: see `CamlinkConfig::from_env` (`CAMLINK_CAMERA_IP`,
//! `CAMLINK_PROBE_TIMEOUT_MS`, ...).

use camlink_lib::collaborators::{
    DirectoryLibrary, MemoryMediaStore, MemoryThumbnailCache, NetworkInfo, StaticNetworkInfo, SystemNetworkInfo,
};
use camlink_lib::orchestrator::Collaborators;
use camlink_lib::{CamlinkConfig, ConnectionOrchestrator};
use serde_json::{Value, json};
use std::env;
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_OUT_DIR: &str = "camlink-photos";
const DEFAULT_PUSH_WAIT_SECS: u64 = 60;

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn print_json(value: &Value) {
    let mut stdout = io::stdout();
    let _ = writeln!(stdout, "{}", serde_json::to_string_pretty(value).unwrap_or_default());
    let _ = stdout.flush();
}

/// Sweeps and detection never sync, but the orchestrator still wants a library.
fn scratch_dir() -> PathBuf {
    env::temp_dir().join("camlink-probe")
}

fn usage() -> ExitCode {
    eprintln!("usage: camlink-probe sweep <ip> | detect | connect [--out DIR] [--wait SECS] [--ssid SSID]");
    ExitCode::from(2)
}

fn orchestrator(config: CamlinkConfig, out_dir: &Path, ssid: Option<String>) -> Result<ConnectionOrchestrator, String> {
    let library = DirectoryLibrary::new(out_dir).map_err(|e| format!("Can't use {}: {e}", out_dir.display()))?;
    let network: Arc<dyn NetworkInfo> = match ssid {
        Some(ssid) => Arc::new(StaticNetworkInfo {
            ssid: Some(ssid),
            local_ip: config
                .probe_table
                .first()
                .and_then(|t| SystemNetworkInfo.local_ip_toward(t.ip)),
        }),
        None => Arc::new(SystemNetworkInfo),
    };
    let collaborators = Collaborators::new(
        Arc::new(MemoryMediaStore::new()),
        Arc::new(library),
        Arc::new(MemoryThumbnailCache::new()),
        network,
    );
    Ok(ConnectionOrchestrator::new(config, collaborators))
}

async fn sweep(config: CamlinkConfig, ip: &str) -> ExitCode {
    let Ok(ip) = ip.parse::<Ipv4Addr>() else {
        eprintln!("camlink-probe: not an IPv4 address: {ip}");
        return ExitCode::from(2);
    };
    let orchestrator = match orchestrator(config, &scratch_dir(), None) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("camlink-probe: {e}");
            return ExitCode::FAILURE;
        }
    };
    let services = orchestrator.discover_services(ip).await;
    print_json(&json!({ "ip": ip.to_string(), "services": services }));
    ExitCode::SUCCESS
}

async fn detect(config: CamlinkConfig) -> ExitCode {
    let orchestrator = match orchestrator(config, &scratch_dir(), None) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("camlink-probe: {e}");
            return ExitCode::FAILURE;
        }
    };
    match orchestrator.detect().await {
        Some(target) => {
            print_json(&json!({ "ip": target.ip.to_string(), "port": target.port, "mode": target.mode }));
            ExitCode::SUCCESS
        }
        None => {
            print_json(&json!({ "error": "no camera found" }));
            ExitCode::FAILURE
        }
    }
}

async fn connect(config: CamlinkConfig, args: &[String]) -> ExitCode {
    let wait = flag_value(args, "--wait")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PUSH_WAIT_SECS);
    let out_dir = flag_value(args, "--out").map_or_else(|| PathBuf::from(DEFAULT_OUT_DIR), PathBuf::from);
    let orchestrator = match orchestrator(config, &out_dir, flag_value(args, "--ssid")) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("camlink-probe: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match orchestrator.connect().await {
        Ok(outcome) => outcome,
        Err(e) => {
            print_json(&json!({ "status": orchestrator.status(), "error": e.to_string(), "logs": orchestrator.logs() }));
            return ExitCode::FAILURE;
        }
    };

    if orchestrator.push_state().await.is_some() {
        eprintln!("camlink-probe: AutoShare active, waiting {wait}s for pushed photos");
        tokio::time::sleep(Duration::from_secs(wait)).await;
    }

    print_json(&json!({
        "target": { "ip": outcome.target.ip.to_string(), "port": outcome.target.port, "mode": outcome.target.mode },
        "status": orchestrator.status(),
        "pushState": orchestrator.push_state().await,
        "initialSync": outcome.initial_sync,
        "logs": orchestrator.logs(),
    }));
    orchestrator.disconnect().await;
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    camlink_lib::init_logging();
    let args: Vec<String> = env::args().skip(1).collect();
    let config = CamlinkConfig::from_env();

    match args.first().map(String::as_str) {
        Some("sweep") => match args.get(1) {
            Some(ip) => sweep(config, ip).await,
            None => usage(),
        },
        Some("detect") => detect(config).await,
        Some("connect") => connect(config, &args[1..]).await,
        _ => usage(),
    }
}
