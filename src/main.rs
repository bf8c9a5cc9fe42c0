//! stevedore - install or update the containerized worker on this host
//!
//! One-shot entry point:
//! - preflight the host and refuse or confirm as the checks demand
//! - `--install`: interactive first-run setup, then a detached worker
//! - `--update`: roll the running worker over to an updated image

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::process::ExitCode;
use tracing::info;

use stevedore::config::LauncherConfig;
use stevedore::engine::CliEngine;
use stevedore::error::Error;
use stevedore::gate::{self, Thresholds, Verdict};
use stevedore::install::{self, InstallOutcome};
use stevedore::profile::HostProfile;
use stevedore::prompt::{Prompter, TtyPrompter};
use stevedore::rollover::{RolloverController, RolloverOutcome};

const TROUBLESHOOTING_URL: &str = "https://docs.stevedore.works/troubleshooting";

#[derive(Debug, Parser)]
#[command(
    name = "stevedore",
    version,
    about = "Install or update the containerized worker on this host",
    group(ArgGroup::new("mode").required(true).args(["install", "update"]))
)]
struct Cli {
    /// First-time install: interactive setup, then a detached worker
    #[arg(long)]
    install: bool,

    /// Replace the running worker with one built from the updated image
    #[arg(long)]
    update: bool,

    /// Deploy this image tag (or full reference) instead of the configured one
    #[arg(long, value_name = "REF")]
    image_tag: Option<String>,

    /// Proceed past requirement warnings without asking
    #[arg(long)]
    ignore_warnings: bool,

    /// Assume yes on every prompt
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    /// Persist unattended updates (future update runs behave as -y)
    #[arg(long)]
    auto_update: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt().init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("❌ {:#}", e);
            eprintln!("   Troubleshooting: {}", TROUBLESHOOTING_URL);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = LauncherConfig::load().context("Failed to load configuration")?;

    if let Some(tag) = &cli.image_tag {
        config.apply_image_tag(tag);
    }

    if cli.auto_update && !config.update.auto_update {
        config.update.auto_update = true;
        config.save().context("Failed to save configuration")?;
        info!("auto-update enabled; future update runs are unattended");
    }

    let assume_yes = cli.yes || (cli.update && config.update.auto_update);

    let profile = HostProfile::discover()
        .await
        .context("Failed to discover host facts")?;
    print_banner(&profile);

    let results = gate::run_checks(&profile, &Thresholds::default());
    gate::print_report(&results);
    let verdict = Verdict::from_results(&results);

    if verdict.has_errors() {
        return Err(Error::RequirementsNotMet {
            failed: verdict.errors.len(),
        }
        .into());
    }

    let prompter = TtyPrompter;

    if verdict.has_warnings() && !cli.ignore_warnings && !assume_yes {
        if !prompter.is_interactive() {
            return Err(Error::NoTty.into());
        }
        if !prompter.confirm("Continue despite the warnings above?", false)? {
            println!("🛑 Aborted at operator request.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let engine = CliEngine::from_profile(&profile)?;
    let spec = config.worker_spec();

    if cli.install {
        match install::run_install(&engine, &spec).await? {
            InstallOutcome::Completed => {
                println!("🚀 Install complete.");
            }
            InstallOutcome::Cancelled => {
                println!("🛑 Setup cancelled; nothing was installed.");
            }
        }
    } else {
        println!("🔄 Updating worker container '{}'...", spec.name);
        let controller = RolloverController::new(&engine, &prompter, assume_yes);
        let RolloverOutcome::Completed { old_removed } = controller.run(&spec).await?;
        if old_removed {
            println!("🚀 Update complete.");
        } else {
            println!("🚀 Update complete; previous container kept.");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_banner(profile: &HostProfile) {
    println!();
    println!("🚢 ======================================");
    println!("   STEVEDORE WORKER LAUNCHER");
    println!("🚢 ======================================");
    println!();
    println!("🖥️  Hostname: {}", profile.hostname);
    println!("🔧 OS: {} ({})", profile.os_kind, profile.arch);
    println!();
}
