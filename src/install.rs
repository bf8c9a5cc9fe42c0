//! First-run install flow.
//!
//! Two steps, no state machine: run the image once in the foreground so the
//! worker can provision its credentials into the durable volume (it does
//! this on its own when the volume is empty), then create and start the
//! long-running detached container.

use crate::engine::{ContainerEngine, ContainerSpec};
use crate::error::{Error, Result};
use tracing::info;

/// Exit code the worker returns when the operator cancels setup.
///
/// This overloads a process exit code to carry user intent, a wart
/// inherited from the worker's contract (128+SIGINT). Treated as a benign
/// termination, never as a failure.
pub const SETUP_CANCELLED_CODE: i32 = 130;

/// How the install run ended. Both variants are clean terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Setup finished and the worker container is up.
    Completed,
    /// The operator cancelled the interactive setup; nothing was created.
    Cancelled,
}

/// The one-shot setup spec: same image, a `-setup` name, only the durable
/// volume and environment, without published ports or a restart policy.
fn setup_spec(spec: &ContainerSpec) -> ContainerSpec {
    let mut setup = spec.with_name(&format!("{}-setup", spec.name));
    setup.ports.clear();
    setup.extra_args.clear();
    setup
}

pub async fn run_install(
    engine: &dyn ContainerEngine,
    spec: &ContainerSpec,
) -> Result<InstallOutcome> {
    if engine.exists(&spec.name).await? {
        return Err(Error::WorkerExists {
            container: spec.name.clone(),
        });
    }

    info!("running interactive setup for '{}'", spec.name);
    println!("🔑 Starting interactive worker setup. Follow the prompts.");
    println!();

    let code = engine.run_foreground(&setup_spec(spec)).await?;
    match code {
        0 => {}
        SETUP_CANCELLED_CODE => {
            info!("setup cancelled by operator");
            return Ok(InstallOutcome::Cancelled);
        }
        code => return Err(Error::SetupFailed { code }),
    }

    info!("setup complete; launching detached worker");
    let handle = engine.create(spec, None).await?;
    engine.start(&handle).await?;

    println!("✅ Worker container '{}' is up.", spec.name);
    Ok(InstallOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ContainerHandle, EngineError, EngineKind};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: "worker".to_string(),
            image: "example/worker:1.2".to_string(),
            ports: vec![],
            mounts: vec![],
            env: BTreeMap::new(),
            extra_args: vec!["--restart".to_string(), "unless-stopped".to_string()],
        }
    }

    /// Engine stub with a programmable setup exit code.
    struct StubEngine {
        setup_exit: i32,
        worker_exists: bool,
        calls: Mutex<Vec<String>>,
    }

    impl StubEngine {
        fn new(setup_exit: i32, worker_exists: bool) -> Self {
            Self {
                setup_exit,
                worker_exists,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerEngine for StubEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Docker
        }

        async fn create(
            &self,
            spec: &ContainerSpec,
            _clone_volumes_from: Option<&ContainerHandle>,
        ) -> std::result::Result<ContainerHandle, EngineError> {
            self.record(&format!("create {}", spec.name));
            Ok(ContainerHandle::new(&spec.name))
        }

        async fn start(
            &self,
            handle: &ContainerHandle,
        ) -> std::result::Result<(), EngineError> {
            self.record(&format!("start {}", handle));
            Ok(())
        }

        async fn stop(&self, handle: &ContainerHandle) -> std::result::Result<(), EngineError> {
            self.record(&format!("stop {}", handle));
            Ok(())
        }

        async fn rename(
            &self,
            handle: &ContainerHandle,
            new_name: &str,
        ) -> std::result::Result<ContainerHandle, EngineError> {
            self.record(&format!("rename {} {}", handle, new_name));
            Ok(ContainerHandle::new(new_name))
        }

        async fn remove(&self, handle: &ContainerHandle) -> std::result::Result<(), EngineError> {
            self.record(&format!("remove {}", handle));
            Ok(())
        }

        async fn exists(&self, name: &str) -> std::result::Result<bool, EngineError> {
            self.record(&format!("exists {}", name));
            Ok(self.worker_exists && name == "worker")
        }

        async fn run_foreground(
            &self,
            spec: &ContainerSpec,
        ) -> std::result::Result<i32, EngineError> {
            self.record(&format!("run_foreground {}", spec.name));
            Ok(self.setup_exit)
        }
    }

    #[tokio::test]
    async fn successful_setup_creates_and_starts_worker() {
        let engine = StubEngine::new(0, false);
        let outcome = run_install(&engine, &spec()).await.unwrap();

        assert_eq!(outcome, InstallOutcome::Completed);
        assert_eq!(
            engine.calls(),
            vec![
                "exists worker",
                "run_foreground worker-setup",
                "create worker",
                "start worker",
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_setup_is_benign_and_creates_nothing() {
        let engine = StubEngine::new(SETUP_CANCELLED_CODE, false);
        let outcome = run_install(&engine, &spec()).await.unwrap();

        assert_eq!(outcome, InstallOutcome::Cancelled);
        assert!(!engine.calls().iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn failed_setup_surfaces_the_exit_code() {
        let engine = StubEngine::new(7, false);
        let err = run_install(&engine, &spec()).await.unwrap_err();

        assert!(matches!(err, Error::SetupFailed { code: 7 }));
        assert!(!engine.calls().iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn existing_worker_refuses_install() {
        let engine = StubEngine::new(0, true);
        let err = run_install(&engine, &spec()).await.unwrap_err();

        assert!(matches!(err, Error::WorkerExists { .. }));
        assert_eq!(engine.calls(), vec!["exists worker"]);
    }

    #[test]
    fn setup_spec_drops_ports_and_extra_args() {
        let mut base = spec();
        base.ports.push(crate::engine::PortMapping {
            protocol: crate::engine::Protocol::Tcp,
            host_addr: None,
            host_port: 8080,
            container_port: 80,
        });

        let setup = setup_spec(&base);
        assert_eq!(setup.name, "worker-setup");
        assert!(setup.ports.is_empty());
        assert!(setup.extra_args.is_empty());
        assert_eq!(setup.image, base.image);
    }
}
