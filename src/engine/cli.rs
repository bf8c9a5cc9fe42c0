//! Engine adapter driving the docker/podman command-line clients.
//!
//! Both engines share the same verb set, so one implementation covers them;
//! the differences that matter here (rootless access, install hints) are
//! resolved before construction. Every invocation captures stderr so a
//! failure surfaces the engine's own message, and nothing is retried.

use super::{
    install_suggestion, ContainerEngine, ContainerHandle, ContainerSpec, EngineError, EngineKind,
};
use crate::error::Error;
use crate::profile::HostProfile;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub struct CliEngine {
    kind: EngineKind,
    /// Prefix every invocation with sudo. Decided once, at construction.
    elevate: bool,
}

impl CliEngine {
    pub fn new(kind: EngineKind, elevate: bool) -> Self {
        Self { kind, elevate }
    }

    /// Build the adapter from a discovered host profile: first available of
    /// docker, podman, elevated when the profile says the engine is not
    /// reachable as the current user.
    pub fn from_profile(profile: &HostProfile) -> Result<Self, Error> {
        let kind = profile
            .preferred_engine()
            .ok_or_else(|| Error::NoRuntimeFound {
                suggestion: install_suggestion(profile.os_kind),
            })?;

        Ok(Self::new(kind, !profile.engine_access))
    }

    /// Argv for `create`: name, ports, volumes (or `--volumes-from`), env,
    /// extra args, image last.
    fn create_args(spec: &ContainerSpec, clone_volumes_from: Option<&ContainerHandle>) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            spec.name.clone(),
        ];
        Self::push_common_args(&mut args, spec, clone_volumes_from);
        args.extend(spec.extra_args.iter().cloned());
        args.push(spec.image.clone());
        args
    }

    /// Argv for a foreground interactive run that removes itself on exit.
    fn run_foreground_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--interactive".to_string(),
            "--tty".to_string(),
            "--name".to_string(),
            spec.name.clone(),
        ];
        Self::push_common_args(&mut args, spec, None);
        args.push(spec.image.clone());
        args
    }

    fn push_common_args(
        args: &mut Vec<String>,
        spec: &ContainerSpec,
        clone_volumes_from: Option<&ContainerHandle>,
    ) {
        for port in &spec.ports {
            args.push("--publish".to_string());
            args.push(port.publish_arg());
        }

        match clone_volumes_from {
            Some(handle) => {
                args.push("--volumes-from".to_string());
                args.push(handle.name().to_string());
            }
            None => {
                for mount in &spec.mounts {
                    args.push("--volume".to_string());
                    args.push(mount.mount_arg());
                }
            }
        }

        for (name, value) in &spec.env {
            args.push("--env".to_string());
            args.push(format!("{}={}", name, value));
        }
    }

    /// The program to spawn and its full argument list, with the elevation
    /// prefix applied when required.
    fn command_line(&self, args: Vec<String>) -> (String, Vec<String>) {
        if self.elevate {
            let mut full = vec![self.kind.binary_name().to_string()];
            full.extend(args);
            ("sudo".to_string(), full)
        } else {
            (self.kind.binary_name().to_string(), args)
        }
    }

    async fn exec(&self, args: Vec<String>) -> Result<std::process::Output, EngineError> {
        let op = args.first().cloned().unwrap_or_default();
        let (program, full_args) = self.command_line(args);

        debug!("exec: {} {}", program, full_args.join(" "));

        let output = Command::new(&program)
            .args(&full_args)
            .output()
            .await
            .map_err(|e| EngineError {
                op: op.clone(),
                status: None,
                stderr: format!("failed to spawn {}: {}", program, e),
            })?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(EngineError {
                op,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ContainerEngine for CliEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn create(
        &self,
        spec: &ContainerSpec,
        clone_volumes_from: Option<&ContainerHandle>,
    ) -> Result<ContainerHandle, EngineError> {
        self.exec(Self::create_args(spec, clone_volumes_from)).await?;
        Ok(ContainerHandle::new(&spec.name))
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.exec(vec!["start".to_string(), handle.name().to_string()])
            .await?;
        Ok(())
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.exec(vec!["stop".to_string(), handle.name().to_string()])
            .await?;
        Ok(())
    }

    async fn rename(
        &self,
        handle: &ContainerHandle,
        new_name: &str,
    ) -> Result<ContainerHandle, EngineError> {
        self.exec(vec![
            "rename".to_string(),
            handle.name().to_string(),
            new_name.to_string(),
        ])
        .await?;
        Ok(ContainerHandle::new(new_name))
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.exec(vec!["rm".to_string(), handle.name().to_string()])
            .await?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, EngineError> {
        let result = self
            .exec(vec![
                "inspect".to_string(),
                "--type".to_string(),
                "container".to_string(),
                "--format".to_string(),
                "{{.Id}}".to_string(),
                name.to_string(),
            ])
            .await;

        match result {
            Ok(_) => Ok(true),
            // Both engines report a missing container on stderr; any other
            // failure (daemon down, permission denied) propagates.
            Err(e) if e.stderr.to_lowercase().contains("no such") => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn run_foreground(&self, spec: &ContainerSpec) -> Result<i32, EngineError> {
        let args = Self::run_foreground_args(spec);
        let (program, full_args) = self.command_line(args);

        debug!("exec (foreground): {} {}", program, full_args.join(" "));

        let status = Command::new(&program)
            .args(&full_args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| EngineError {
                op: "run".to_string(),
                status: None,
                stderr: format!("failed to spawn {}: {}", program, e),
            })?;

        // Signal-terminated runs carry no code; report the conventional
        // interrupted status.
        Ok(status.code().unwrap_or(130))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PortMapping, Protocol, VolumeMount};
    use std::collections::BTreeMap;

    fn spec() -> ContainerSpec {
        let mut env = BTreeMap::new();
        env.insert("WORKER_REGION".to_string(), "eu-west".to_string());

        ContainerSpec {
            name: "worker".to_string(),
            image: "example/worker:1.2".to_string(),
            ports: vec![PortMapping {
                protocol: Protocol::Tcp,
                host_addr: None,
                host_port: 8080,
                container_port: 80,
            }],
            mounts: vec![VolumeMount {
                volume: "worker-auth".to_string(),
                container_path: "/var/lib/worker/auth".to_string(),
            }],
            env,
            extra_args: vec!["--restart".to_string(), "unless-stopped".to_string()],
        }
    }

    #[test]
    fn create_args_order_image_last() {
        let args = CliEngine::create_args(&spec(), None);
        assert_eq!(args[0], "create");
        assert_eq!(args[1], "--name");
        assert_eq!(args[2], "worker");
        assert!(args.contains(&"--publish".to_string()));
        assert!(args.contains(&"8080:80".to_string()));
        assert!(args.contains(&"--volume".to_string()));
        assert!(args.contains(&"worker-auth:/var/lib/worker/auth".to_string()));
        assert!(args.contains(&"WORKER_REGION=eu-west".to_string()));
        assert!(args.contains(&"--restart".to_string()));
        assert_eq!(args.last().unwrap(), "example/worker:1.2");
    }

    #[test]
    fn create_args_clone_replaces_named_mounts() {
        let old = ContainerHandle::new("worker");
        let args = CliEngine::create_args(&spec().with_name("worker-new"), Some(&old));
        assert!(args.contains(&"--volumes-from".to_string()));
        assert!(args.contains(&"worker".to_string()));
        assert!(!args.contains(&"--volume".to_string()));
    }

    #[test]
    fn run_foreground_args_are_interactive_and_ephemeral() {
        let args = CliEngine::run_foreground_args(&spec());
        assert_eq!(args[0], "run");
        assert!(args.contains(&"--rm".to_string()));
        assert!(args.contains(&"--interactive".to_string()));
        assert!(args.contains(&"--tty".to_string()));
        assert_eq!(args.last().unwrap(), "example/worker:1.2");
    }

    #[test]
    fn elevation_prefixes_sudo() {
        let engine = CliEngine::new(EngineKind::Docker, true);
        let (program, args) = engine.command_line(vec!["stop".to_string(), "worker".to_string()]);
        assert_eq!(program, "sudo");
        assert_eq!(args, vec!["docker", "stop", "worker"]);

        let engine = CliEngine::new(EngineKind::Podman, false);
        let (program, args) = engine.command_line(vec!["stop".to_string(), "worker".to_string()]);
        assert_eq!(program, "podman");
        assert_eq!(args, vec!["stop", "worker"]);
    }
}
