//! Launcher configuration.
//!
//! A single TOML file under the OS config directory describes the worker
//! container (image, name, volume, ports) and the update preferences. CLI
//! flags override individual values for one run; `--auto-update` is the
//! only flag that writes back.

use crate::engine::{ContainerSpec, PortMapping, VolumeMount};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub worker: WorkerConfig,
    pub update: UpdateConfig,
}

/// The containerized worker this launcher manages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub container_name: String,
    pub image: String,
    /// Named durable volume holding the worker's credentials. It outlives
    /// every container instance.
    pub auth_volume: String,
    pub auth_mount_path: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// When set, update runs are unattended (as if -y was passed).
    pub auto_update: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig {
                container_name: "stevedore-worker".to_string(),
                image: "ghcr.io/stevedore-works/worker:latest".to_string(),
                auth_volume: "stevedore-auth".to_string(),
                auth_mount_path: "/var/lib/worker/auth".to_string(),
                extra_args: vec!["--restart".to_string(), "unless-stopped".to_string()],
                ports: Vec::new(),
                env: BTreeMap::new(),
            },
            update: UpdateConfig { auto_update: false },
        }
    }
}

impl LauncherConfig {
    /// Load config from the OS-specific location, falling back to defaults
    /// on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Save config to the OS-specific location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get OS-specific config file path.
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        path.push("stevedore");
        path.push("config.toml");
        Ok(path)
    }

    /// Apply a `--image-tag` override: a bare tag replaces the configured
    /// tag, a value with a `/` replaces the whole reference.
    pub fn apply_image_tag(&mut self, tag_or_ref: &str) {
        self.worker.image = override_image(&self.worker.image, tag_or_ref);
    }

    /// The spec for the long-running worker container.
    pub fn worker_spec(&self) -> ContainerSpec {
        ContainerSpec {
            name: self.worker.container_name.clone(),
            image: self.worker.image.clone(),
            ports: self.worker.ports.clone(),
            mounts: vec![VolumeMount {
                volume: self.worker.auth_volume.clone(),
                container_path: self.worker.auth_mount_path.clone(),
            }],
            env: self.worker.env.clone(),
            extra_args: self.worker.extra_args.clone(),
        }
    }
}

fn override_image(image: &str, tag_or_ref: &str) -> String {
    if tag_or_ref.contains('/') {
        return tag_or_ref.to_string();
    }

    // Replace the tag only: split on the last ':' unless it belongs to a
    // registry host:port prefix.
    let repository = match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => repo,
        _ => image,
    };
    format!("{}:{}", repository, tag_or_ref)
}
