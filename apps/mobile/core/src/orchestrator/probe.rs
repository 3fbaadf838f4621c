//! Reachability probes: which (address, port, mode) rows answer a TCP connect.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use log::debug;
use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::config::ProbeTarget;
use crate::types::DiscoveredService;

/// Ports checked by the diagnostics sweep.
pub const DIAGNOSTIC_PORTS: [(u16, &str); 8] = [
    (80, "HTTP"),
    (554, "RTSP"),
    (801, "S2L registration"),
    (1801, "S2L push"),
    (7676, "DLNA control"),
    (7679, "DLNA stream"),
    (8080, "HTTP (alternate)"),
    (15740, "PTP/IP"),
];

/// TCP connect raced against `wait`. The socket is closed either way.
pub async fn probe_reachable(ip: Ipv4Addr, port: u16, wait: Duration) -> bool {
    match tokio::time::timeout(wait, TcpStream::connect((ip, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!("Probe {ip}:{port}: {e}");
            false
        }
        Err(_) => {
            debug!("Probe {ip}:{port}: no answer within {wait:?}");
            false
        }
    }
}

/// Runs `probe` on every row at once. Results come back in table order no matter
/// which probe finishes first.
pub async fn probe_all<F, Fut>(table: &[ProbeTarget], probe: F) -> Vec<bool>
where
    F: Fn(ProbeTarget) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut pending: FuturesUnordered<_> = table
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let probing = probe(*target);
            async move { (index, probing.await) }
        })
        .collect();

    let mut results = vec![false; table.len()];
    while let Some((index, reachable)) = pending.next().await {
        results[index] = reachable;
    }
    results
}

/// The lowest-index reachable row. Table order is the tie-break when several
/// rows answer.
pub async fn first_reachable<F, Fut>(table: &[ProbeTarget], probe: F) -> Option<ProbeTarget>
where
    F: Fn(ProbeTarget) -> Fut,
    Fut: Future<Output = bool>,
{
    let results = probe_all(table, probe).await;
    table
        .iter()
        .zip(results)
        .find_map(|(target, reachable)| reachable.then_some(*target))
}

/// Sweeps `ports` on `ip` in parallel and reports every one.
pub async fn sweep_ports(ip: Ipv4Addr, ports: &[(u16, &str)], wait: Duration) -> Vec<DiscoveredService> {
    let mut pending: FuturesUnordered<_> = ports
        .iter()
        .map(|(port, label)| async move {
            DiscoveredService {
                port: *port,
                label: label.to_string(),
                reachable: probe_reachable(ip, *port, wait).await,
            }
        })
        .collect();

    let mut services = Vec::with_capacity(ports.len());
    while let Some(service) = pending.next().await {
        services.push(service);
    }
    services.sort_by_key(|s| s.port);
    services
}
