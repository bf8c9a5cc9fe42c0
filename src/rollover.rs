//! Container rollover: replace the running worker with a new instance
//! without losing its auth volume and without a window where both are
//! serving.
//!
//! The procedure is a linear state machine:
//!
//! ```text
//! PreflightNameCheck → CreateNew → StopOld → StartNew → RenameSwap → Cleanup
//! ```
//!
//! Create happens before the old container is stopped, but the new one is
//! only started after the old one has stopped, so at no instant are both
//! running. Any failed transition aborts the whole rollover; recovery is a
//! manual operator action, never an automatic retry or rollback, because a
//! half-initialized new container racing a restarted old one is worse than
//! a stopped worker.

use crate::engine::{ContainerEngine, ContainerHandle, ContainerSpec};
use crate::error::{Error, Result};
use crate::prompt::Prompter;
use tracing::{info, warn};

/// Stage the rollover is currently in; used for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreflightNameCheck,
    CreateNew,
    StopOld,
    StartNew,
    RenameSwap,
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::PreflightNameCheck => "preflight-name-check",
            Stage::CreateNew => "create-new",
            Stage::StopOld => "stop-old",
            Stage::StartNew => "start-new",
            Stage::RenameSwap => "rename-swap",
            Stage::Cleanup => "cleanup",
        };
        write!(f, "{}", name)
    }
}

/// Transient, in-memory tracking of one rollover. Never persisted: a crash
/// leaves named containers behind, and the next run's name check turns
/// those into a [`Error::RolloverConflict`].
#[derive(Debug)]
struct RolloverState {
    old: ContainerHandle,
    new: Option<ContainerHandle>,
    stage: Stage,
}

impl RolloverState {
    fn enter(&mut self, stage: Stage) {
        if stage == self.stage {
            info!("rollover: {}", stage);
        } else {
            info!("rollover: {} -> {}", self.stage, stage);
        }
        self.stage = stage;
    }
}

/// Terminal result of a rollover that ran to completion. Aborted rollovers
/// surface as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverOutcome {
    Completed { old_removed: bool },
}

fn staging_name(name: &str) -> String {
    format!("{}-new", name)
}

fn retired_name(name: &str) -> String {
    format!("{}-old", name)
}

pub struct RolloverController<'a> {
    engine: &'a dyn ContainerEngine,
    prompter: &'a dyn Prompter,
    /// Skip the cleanup prompt and take its default.
    assume_yes: bool,
}

impl<'a> RolloverController<'a> {
    pub fn new(
        engine: &'a dyn ContainerEngine,
        prompter: &'a dyn Prompter,
        assume_yes: bool,
    ) -> Self {
        Self {
            engine,
            prompter,
            assume_yes,
        }
    }

    /// Replace the container named `spec.name` with a fresh one built from
    /// `spec`, carrying over its volumes.
    pub async fn run(&self, spec: &ContainerSpec) -> Result<RolloverOutcome> {
        let mut state = RolloverState {
            old: ContainerHandle::new(&spec.name),
            new: None,
            stage: Stage::PreflightNameCheck,
        };

        self.preflight(spec, &mut state).await?;
        let new = self.create_new(spec, &mut state).await?;
        self.stop_old(&mut state).await?;
        self.start_new(&mut state, &new).await?;
        self.rename_swap(spec, &mut state, new).await?;
        self.cleanup(spec, &mut state).await
    }

    /// Verify the worker exists and no staging containers were left behind
    /// by an earlier run. Issues no mutating engine call.
    async fn preflight(&self, spec: &ContainerSpec, state: &mut RolloverState) -> Result<()> {
        state.enter(Stage::PreflightNameCheck);

        if !self.engine.exists(&spec.name).await? {
            return Err(Error::WorkerMissing {
                container: spec.name.clone(),
            });
        }

        for name in [retired_name(&spec.name), staging_name(&spec.name)] {
            if self.engine.exists(&name).await? {
                return Err(Error::RolloverConflict { container: name });
            }
        }

        Ok(())
    }

    /// Create the replacement with volumes cloned from the old container.
    /// It is not started here.
    async fn create_new(
        &self,
        spec: &ContainerSpec,
        state: &mut RolloverState,
    ) -> Result<ContainerHandle> {
        state.enter(Stage::CreateNew);

        let staged = spec.with_name(&staging_name(&spec.name));
        let handle = self.engine.create(&staged, Some(&state.old)).await?;
        state.new = Some(handle.clone());
        Ok(handle)
    }

    async fn stop_old(&self, state: &mut RolloverState) -> Result<()> {
        state.enter(Stage::StopOld);

        if let Err(e) = self.engine.stop(&state.old).await {
            // The freshly created container is left in place on purpose:
            // removing it could discard diagnostic state.
            if let Some(new) = &state.new {
                warn!(
                    "stopping '{}' failed; created container '{}' is left for inspection",
                    state.old, new,
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn start_new(&self, state: &mut RolloverState, new: &ContainerHandle) -> Result<()> {
        state.enter(Stage::StartNew);

        if let Err(e) = self.engine.start(new).await {
            warn!(
                "starting '{}' failed; '{}' remains stopped and is not restarted \
                 automatically; resolve by hand",
                new, state.old,
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Move old out of the way first, then give new the canonical name.
    async fn rename_swap(
        &self,
        spec: &ContainerSpec,
        state: &mut RolloverState,
        new: ContainerHandle,
    ) -> Result<()> {
        state.enter(Stage::RenameSwap);

        // Renaming old first avoids a name collision with new. If this
        // fails nothing has been renamed: old keeps its name, just stopped.
        let retired = self
            .engine
            .rename(&state.old, &retired_name(&spec.name))
            .await?;
        state.old = retired;

        match self.engine.rename(&new, &spec.name).await {
            Ok(renamed) => {
                state.new = Some(renamed);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "old container is renamed to '{}' but '{}' could not take the \
                     name '{}'; finish by hand with the engine's rename command",
                    state.old, new, spec.name,
                );
                Err(e.into())
            }
        }
    }

    /// Offer to delete the retired container. Keeping it is a deliberate
    /// manual rollback path.
    async fn cleanup(
        &self,
        spec: &ContainerSpec,
        state: &mut RolloverState,
    ) -> Result<RolloverOutcome> {
        state.enter(Stage::Cleanup);

        let retired = retired_name(&spec.name);
        let remove = if self.assume_yes {
            true
        } else {
            self.prompter
                .confirm(&format!("Remove the previous container '{}'?", retired), true)?
        };

        if remove {
            self.engine.remove(&state.old).await?;
            info!("rollover complete; previous container removed");
            Ok(RolloverOutcome::Completed { old_removed: true })
        } else {
            println!(
                "ℹ️  Keeping '{}'. It holds disk space until you remove it, but \
                 lets you roll back by hand.",
                retired
            );
            info!("rollover complete; previous container kept");
            Ok(RolloverOutcome::Completed { old_removed: false })
        }
    }
}
