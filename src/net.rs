//! Network probes for the preflight checks.
//!
//! Two outbound calls, both with short timeouts so a dead network fails the
//! check quickly instead of hanging the installer:
//! - a connectivity probe against a well-known HTTP endpoint
//! - an IP-echo lookup to learn the public address for NAT classification

use if_addrs::{get_if_addrs, IfAddr};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

const CONNECTIVITY_PROBE_URL: &str = "https://connectivitycheck.gstatic.com/generate_204";
const IP_ECHO_URL: &str = "https://api.ipify.org";

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

fn probe_client() -> Option<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(PROBE_TIMEOUT)
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| warn!("failed to build HTTP client: {}", e))
        .ok()
}

/// Probe general internet reachability.
pub async fn check_connectivity() -> bool {
    let Some(client) = probe_client() else {
        return false;
    };

    match client.get(CONNECTIVITY_PROBE_URL).send().await {
        Ok(response) => {
            debug!("connectivity probe: HTTP {}", response.status());
            response.status().is_success()
        }
        Err(e) => {
            debug!("connectivity probe failed: {}", e);
            false
        }
    }
}

/// Ask an IP-echo service for the address this host appears as publicly.
pub async fn public_ip() -> Option<IpAddr> {
    let client = probe_client()?;

    let response = client
        .get(IP_ECHO_URL)
        .send()
        .await
        .map_err(|e| debug!("IP echo request failed: {}", e))
        .ok()?;

    if !response.status().is_success() {
        debug!("IP echo returned HTTP {}", response.status());
        return None;
    }

    let body = response
        .text()
        .await
        .map_err(|e| debug!("IP echo body read failed: {}", e))
        .ok()?;

    match body.trim().parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            warn!("IP echo returned unparseable body: {:?}", body.trim());
            None
        }
    }
}

/// First non-loopback IPv4 address of any local interface.
pub fn local_ip() -> Option<IpAddr> {
    let if_addrs = get_if_addrs()
        .map_err(|e| warn!("failed to enumerate network interfaces: {}", e))
        .ok()?;

    for if_addr in if_addrs {
        if if_addr.is_loopback() {
            continue;
        }
        if let IfAddr::V4(v4) = &if_addr.addr {
            debug!("local interface {}: {}", if_addr.name, v4.ip);
            return Some(IpAddr::V4(v4.ip));
        }
    }

    None
}
