//! Host discovery and the immutable profile the requirement gate reads.
//!
//! All impurity lives in [`HostProfile::discover`]: it reads system facts,
//! probes the network and the container engines once, and freezes the
//! result. Everything downstream (the gate in particular) is a pure
//! function of the snapshot, so tests evaluate synthetic profiles without
//! touching the machine.

use crate::engine::{self, EngineKind};
use crate::net;
use anyhow::Result;
use serde::Serialize;
use std::net::IpAddr;
use sysinfo::{Disks, System};
use tracing::{debug, info};

const GIB: u64 = 1024 * 1024 * 1024;

/// OS family, used to pick package-manager suggestions and little else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsKind {
    Debian,
    Fedora,
    Arch,
    OpenSuse,
    MacOs,
    Unknown,
}

impl OsKind {
    /// Map a sysinfo distribution id (`ID=` in os-release) to a family.
    pub fn from_distribution_id(id: &str) -> Self {
        match id.trim().to_lowercase().as_str() {
            "debian" | "ubuntu" | "linuxmint" | "pop" | "raspbian" | "kali" => OsKind::Debian,
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" => OsKind::Fedora,
            "arch" | "manjaro" | "endeavouros" => OsKind::Arch,
            id if id.starts_with("opensuse") => OsKind::OpenSuse,
            "sles" => OsKind::OpenSuse,
            "macos" => OsKind::MacOs,
            _ => OsKind::Unknown,
        }
    }
}

impl std::fmt::Display for OsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsKind::Debian => write!(f, "debian"),
            OsKind::Fedora => write!(f, "fedora"),
            OsKind::Arch => write!(f, "arch"),
            OsKind::OpenSuse => write!(f, "opensuse"),
            OsKind::MacOs => write!(f, "macos"),
            OsKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Immutable snapshot of the host, built once per run.
#[derive(Debug, Clone, Serialize)]
pub struct HostProfile {
    pub hostname: String,
    pub os_kind: OsKind,
    pub arch: String,
    pub cpu_threads: usize,
    pub mem_gb: u64,
    pub disk_free_gb: u64,
    pub has_docker: bool,
    pub has_podman: bool,
    /// Whether the preferred engine is reachable without elevation.
    pub engine_access: bool,
    pub local_ip: Option<IpAddr>,
    pub public_ip: Option<IpAddr>,
    pub internet_reachable: bool,
}

impl HostProfile {
    /// Collect every host fact the requirement gate needs.
    pub async fn discover() -> Result<Self> {
        info!("Discovering host facts...");

        let mut sys = System::new_all();
        sys.refresh_all();

        let hostname = gethostname::gethostname().to_string_lossy().to_string();
        let os_kind = OsKind::from_distribution_id(&System::distribution_id());
        let arch = std::env::consts::ARCH.to_string();

        let cpu_threads = sys.cpus().len();
        // Round to the nearest GB: the kernel reserves a slice of physical
        // memory, so a 4 GB machine reports just under 4 GiB.
        let mem_gb = (sys.total_memory() as f64 / GIB as f64).round() as u64;
        let disk_free_gb = root_disk_free_gb();

        let has_docker = engine::find_executable(EngineKind::Docker.binary_name()).is_some();
        let has_podman = engine::find_executable(EngineKind::Podman.binary_name()).is_some();

        let engine_access = match preferred_engine_of(has_docker, has_podman) {
            Some(kind) => engine::access_without_elevation(kind),
            None => false,
        };

        let local_ip = net::local_ip();
        let internet_reachable = net::check_connectivity().await;
        let public_ip = if internet_reachable {
            net::public_ip().await
        } else {
            None
        };

        let profile = HostProfile {
            hostname,
            os_kind,
            arch,
            cpu_threads,
            mem_gb,
            disk_free_gb,
            has_docker,
            has_podman,
            engine_access,
            local_ip,
            public_ip,
            internet_reachable,
        };

        debug!(
            "host profile: {}",
            serde_json::to_string(&profile).unwrap_or_default()
        );
        Ok(profile)
    }

    /// The engine an adapter would be built on, if any is installed.
    pub fn preferred_engine(&self) -> Option<EngineKind> {
        preferred_engine_of(self.has_docker, self.has_podman)
    }
}

fn preferred_engine_of(has_docker: bool, has_podman: bool) -> Option<EngineKind> {
    if has_docker {
        Some(EngineKind::Docker)
    } else if has_podman {
        Some(EngineKind::Podman)
    } else {
        None
    }
}

/// Free space on the filesystem holding `/`, in whole GB.
fn root_disk_free_gb() -> u64 {
    let disks = Disks::new_with_refreshed_list();

    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"));

    let bytes = match root {
        Some(disk) => disk.available_space(),
        // No "/" mount reported (containers, unusual setups): take the
        // largest filesystem so the check is not spuriously fatal.
        None => disks
            .list()
            .iter()
            .map(|d| d.available_space())
            .max()
            .unwrap_or(0),
    };

    bytes / GIB
}
