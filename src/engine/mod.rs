//! Container engine abstraction.
//!
//! The launcher drives whichever engine is installed (docker preferred,
//! podman otherwise) through the [`ContainerEngine`] trait. Specs are
//! structured values rendered into argv arrays by the implementation;
//! user-influenced strings are never spliced into a shell line.

mod cli;

pub use cli::CliEngine;

use crate::profile::OsKind;
use async_trait::async_trait;
#[cfg(not(target_os = "macos"))]
use nix::unistd::{getgroups, Group, Uid, User};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The two interchangeable engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Docker,
    Podman,
}

impl EngineKind {
    pub fn binary_name(&self) -> &'static str {
        match self {
            EngineKind::Docker => "docker",
            EngineKind::Podman => "podman",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binary_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// One published port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortMapping {
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_addr: Option<String>,
    pub host_port: u16,
    pub container_port: u16,
}

impl PortMapping {
    /// Render as an engine `--publish` value.
    pub fn publish_arg(&self) -> String {
        let mut arg = String::new();
        if let Some(addr) = &self.host_addr {
            arg.push_str(addr);
            arg.push(':');
        }
        arg.push_str(&format!("{}:{}", self.host_port, self.container_port));
        if self.protocol == Protocol::Udp {
            arg.push_str("/udp");
        }
        arg
    }
}

/// One named-volume mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMount {
    pub volume: String,
    pub container_path: String,
}

impl VolumeMount {
    /// Render as an engine `--volume` value.
    pub fn mount_arg(&self) -> String {
        format!("{}:{}", self.volume, self.container_path)
    }
}

/// Everything needed to create or run one container. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub mounts: Vec<VolumeMount>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl ContainerSpec {
    /// The same spec under a different container name.
    pub fn with_name(&self, name: &str) -> ContainerSpec {
        let mut spec = self.clone();
        spec.name = name.to_string();
        spec
    }
}

/// Opaque reference to a container known to the engine.
///
/// The engine's own container registry is the system of record; handles are
/// only held transiently during a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}

/// An engine command returned a non-zero status (or could not be spawned).
///
/// The adapter never retries; retry policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
#[error("engine command '{}' failed ({}): {}", .op, status_label(.status), .stderr)]
pub struct EngineError {
    /// The engine subcommand that failed (`create`, `stop`, ...).
    pub op: String,
    pub status: Option<i32>,
    pub stderr: String,
}

/// Capability set every engine implementation exposes.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Create a container without starting it. When `clone_volumes_from` is
    /// given, volumes are attached from that container instead of the
    /// spec's named mounts.
    async fn create(
        &self,
        spec: &ContainerSpec,
        clone_volumes_from: Option<&ContainerHandle>,
    ) -> Result<ContainerHandle, EngineError>;

    async fn start(&self, handle: &ContainerHandle) -> Result<(), EngineError>;

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), EngineError>;

    async fn rename(
        &self,
        handle: &ContainerHandle,
        new_name: &str,
    ) -> Result<ContainerHandle, EngineError>;

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), EngineError>;

    /// Whether a container with this name exists (running or not).
    async fn exists(&self, name: &str) -> Result<bool, EngineError>;

    /// Run a container in the foreground on the operator's terminal and
    /// report its exit code.
    async fn run_foreground(&self, spec: &ContainerSpec) -> Result<i32, EngineError>;
}

/// Locate an executable on PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Whether the current user can reach the engine without elevation.
///
/// Computed once per process; the result is passed into the adapter's
/// constructor rather than consulted again later.
#[cfg(not(target_os = "macos"))]
pub fn access_without_elevation(kind: EngineKind) -> bool {
    if Uid::effective().is_root() {
        return true;
    }

    match kind {
        EngineKind::Docker => in_group("docker"),
        EngineKind::Podman => has_subuid_mapping(),
    }
}

/// Docker Desktop and podman machine both proxy through a user-owned
/// socket on macOS; no elevation is ever needed there.
#[cfg(target_os = "macos")]
pub fn access_without_elevation(_kind: EngineKind) -> bool {
    true
}

#[cfg(not(target_os = "macos"))]
fn in_group(name: &str) -> bool {
    let group = match Group::from_name(name) {
        Ok(Some(group)) => group,
        _ => return false,
    };

    getgroups()
        .map(|gids| gids.contains(&group.gid))
        .unwrap_or(false)
}

/// Rootless podman needs a subordinate-UID range for the current user.
#[cfg(not(target_os = "macos"))]
fn has_subuid_mapping() -> bool {
    let user = match User::from_uid(Uid::effective()) {
        Ok(Some(user)) => user.name,
        _ => return false,
    };

    let Ok(content) = std::fs::read_to_string("/etc/subuid") else {
        return false;
    };

    content
        .lines()
        .any(|line| line.split(':').next() == Some(user.as_str()))
}

/// Per-OS-family install suggestion shown when no engine is found.
pub fn install_suggestion(os: OsKind) -> String {
    let hint = match os {
        OsKind::Debian => "  sudo apt-get update && sudo apt-get install docker.io",
        OsKind::Fedora => "  sudo dnf install docker  (or: sudo dnf install podman)",
        OsKind::Arch => "  sudo pacman -S docker",
        OsKind::OpenSuse => "  sudo zypper install docker",
        OsKind::MacOs => "  brew install --cask docker  (then launch Docker Desktop once)",
        OsKind::Unknown => "  see https://docs.docker.com/engine/install/ for your platform",
    };
    format!("To install one:\n{}", hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: "worker".to_string(),
            image: "example/worker:1.2".to_string(),
            ports: vec![],
            mounts: vec![],
            env: BTreeMap::new(),
            extra_args: vec![],
        }
    }

    #[test]
    fn publish_arg_formats() {
        let tcp = PortMapping {
            protocol: Protocol::Tcp,
            host_addr: None,
            host_port: 8080,
            container_port: 80,
        };
        assert_eq!(tcp.publish_arg(), "8080:80");

        let udp = PortMapping {
            protocol: Protocol::Udp,
            host_addr: Some("127.0.0.1".to_string()),
            host_port: 5353,
            container_port: 53,
        };
        assert_eq!(udp.publish_arg(), "127.0.0.1:5353:53/udp");
    }

    #[test]
    fn mount_arg_formats() {
        let mount = VolumeMount {
            volume: "worker-auth".to_string(),
            container_path: "/var/lib/worker/auth".to_string(),
        };
        assert_eq!(mount.mount_arg(), "worker-auth:/var/lib/worker/auth");
    }

    #[test]
    fn with_name_changes_only_the_name() {
        let staged = spec().with_name("worker-new");
        assert_eq!(staged.name, "worker-new");
        assert_eq!(staged.image, spec().image);
    }

    #[test]
    fn engine_error_display_includes_op_and_stderr() {
        let err = EngineError {
            op: "stop".to_string(),
            status: Some(1),
            stderr: "No such container: worker".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("'stop'"));
        assert!(text.contains("exit code 1"));
        assert!(text.contains("No such container"));
    }

    #[test]
    fn suggestion_matches_package_manager() {
        assert!(install_suggestion(OsKind::Debian).contains("apt-get"));
        assert!(install_suggestion(OsKind::Fedora).contains("dnf"));
        assert!(install_suggestion(OsKind::Arch).contains("pacman"));
        assert!(install_suggestion(OsKind::OpenSuse).contains("zypper"));
        assert!(install_suggestion(OsKind::MacOs).contains("brew"));
    }

    #[test]
    fn find_executable_misses_nonsense_name() {
        assert!(find_executable("definitely-not-a-real-binary-9000").is_none());
    }
}
