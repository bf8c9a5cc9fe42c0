//! Host requirement gate.
//!
//! `evaluate` is a pure function of a [`HostProfile`] snapshot and a
//! [`Thresholds`] table: no tallies, no globals, no I/O. The caller prints
//! the per-check report, then acts on the accumulated [`Verdict`]: any error
//! refuses to proceed, warnings require operator confirmation.

use crate::profile::HostProfile;

/// Pass/warn/fail limits for the resource checks.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub min_cpu_threads: usize,
    pub recommended_cpu_threads: usize,
    pub min_mem_gb: u64,
    pub recommended_mem_gb: u64,
    pub min_disk_free_gb: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_cpu_threads: 2,
            recommended_cpu_threads: 4,
            min_mem_gb: 2,
            recommended_mem_gb: 4,
            min_disk_free_gb: 20,
        }
    }
}

/// The individual preflight checks, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Platform,
    Cpu,
    Memory,
    Disk,
    Runtime,
    Privilege,
    Connectivity,
    Nat,
}

impl Check {
    fn label(&self) -> &'static str {
        match self {
            Check::Platform => "Platform",
            Check::Cpu => "CPU threads",
            Check::Memory => "Memory",
            Check::Disk => "Disk space",
            Check::Runtime => "Container runtime",
            Check::Privilege => "Engine privileges",
            Check::Connectivity => "Internet connectivity",
            Check::Nat => "NAT reachability",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Outcome of a single check, including passes, for the operator report.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub check: Check,
    pub status: CheckStatus,
    pub message: String,
}

/// A hard failure: the run must stop before any container operation.
#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub check: Check,
    pub message: String,
}

/// A soft failure: promptable, suppressible with a flag.
#[derive(Debug, Clone)]
pub struct CheckWarning {
    pub check: Check,
    pub message: String,
}

/// Accumulated result of all checks.
#[derive(Debug, Clone, Default)]
pub struct Verdict {
    pub errors: Vec<CheckFailure>,
    pub warnings: Vec<CheckWarning>,
}

impl Verdict {
    pub fn from_results(results: &[CheckResult]) -> Self {
        let mut verdict = Verdict::default();
        for result in results {
            match result.status {
                CheckStatus::Pass => {}
                CheckStatus::Warn => verdict.warnings.push(CheckWarning {
                    check: result.check,
                    message: result.message.clone(),
                }),
                CheckStatus::Fail => verdict.errors.push(CheckFailure {
                    check: result.check,
                    message: result.message.clone(),
                }),
            }
        }
        verdict
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Evaluate every check against the profile.
///
/// The checks are independent of one another; the returned order is the
/// fixed display order (platform, CPU, memory, disk, runtime, privilege,
/// connectivity, NAT).
pub fn run_checks(profile: &HostProfile, thresholds: &Thresholds) -> Vec<CheckResult> {
    vec![
        check_platform(profile),
        check_cpu(profile, thresholds),
        check_memory(profile, thresholds),
        check_disk(profile, thresholds),
        check_runtime(profile),
        check_privilege(profile),
        check_connectivity(profile),
        check_nat(profile),
    ]
}

/// Evaluate the profile and accumulate the verdict.
pub fn evaluate(profile: &HostProfile, thresholds: &Thresholds) -> Verdict {
    Verdict::from_results(&run_checks(profile, thresholds))
}

/// Print the per-check glyph report the way the operator sees it.
pub fn print_report(results: &[CheckResult]) {
    println!("📋 HOST REQUIREMENTS");
    println!("────────────────────────────────────────");
    for result in results {
        let glyph = match result.status {
            CheckStatus::Pass => "✅",
            CheckStatus::Warn => "⚠️ ",
            CheckStatus::Fail => "❌",
        };
        println!("{} {:<22} {}", glyph, result.check.label(), result.message);
    }

    let verdict = Verdict::from_results(results);
    println!("────────────────────────────────────────");
    println!(
        "   {} error(s), {} warning(s)",
        verdict.errors.len(),
        verdict.warnings.len()
    );
    println!();
}

fn check_platform(profile: &HostProfile) -> CheckResult {
    // Worker images are published for x86_64; aarch64 hosts run them
    // through the engine's emulation layer.
    let (status, message) = match profile.arch.as_str() {
        "x86_64" => (
            CheckStatus::Pass,
            format!("{} on {}", profile.arch, profile.os_kind),
        ),
        "aarch64" => (
            CheckStatus::Warn,
            format!(
                "{} is supported through emulation only; expect reduced performance",
                profile.arch
            ),
        ),
        other => (
            CheckStatus::Fail,
            format!("unsupported architecture: {}", other),
        ),
    };

    CheckResult {
        check: Check::Platform,
        status,
        message,
    }
}

fn check_cpu(profile: &HostProfile, thresholds: &Thresholds) -> CheckResult {
    let threads = profile.cpu_threads;
    let (status, message) = if threads < thresholds.min_cpu_threads {
        (
            CheckStatus::Fail,
            format!(
                "{} thread(s) available, at least {} required",
                threads, thresholds.min_cpu_threads
            ),
        )
    } else if threads < thresholds.recommended_cpu_threads {
        (
            CheckStatus::Warn,
            format!(
                "{} threads available, {} recommended",
                threads, thresholds.recommended_cpu_threads
            ),
        )
    } else {
        (CheckStatus::Pass, format!("{} threads", threads))
    };

    CheckResult {
        check: Check::Cpu,
        status,
        message,
    }
}

fn check_memory(profile: &HostProfile, thresholds: &Thresholds) -> CheckResult {
    let mem = profile.mem_gb;
    let (status, message) = if mem < thresholds.min_mem_gb {
        (
            CheckStatus::Fail,
            format!(
                "{} GB installed, at least {} GB required",
                mem, thresholds.min_mem_gb
            ),
        )
    } else if mem < thresholds.recommended_mem_gb {
        (
            CheckStatus::Warn,
            format!(
                "{} GB installed, {} GB recommended",
                mem, thresholds.recommended_mem_gb
            ),
        )
    } else {
        (CheckStatus::Pass, format!("{} GB", mem))
    };

    CheckResult {
        check: Check::Memory,
        status,
        message,
    }
}

fn check_disk(profile: &HostProfile, thresholds: &Thresholds) -> CheckResult {
    let free = profile.disk_free_gb;
    let (status, message) = if free < thresholds.min_disk_free_gb {
        (
            CheckStatus::Fail,
            format!(
                "{} GB free, at least {} GB required",
                free, thresholds.min_disk_free_gb
            ),
        )
    } else {
        (CheckStatus::Pass, format!("{} GB free", free))
    };

    CheckResult {
        check: Check::Disk,
        status,
        message,
    }
}

fn check_runtime(profile: &HostProfile) -> CheckResult {
    let (status, message) = match (profile.has_docker, profile.has_podman) {
        (true, _) => (CheckStatus::Pass, "docker found".to_string()),
        (false, true) => (CheckStatus::Pass, "podman found".to_string()),
        (false, false) => (
            CheckStatus::Fail,
            "neither docker nor podman is installed".to_string(),
        ),
    };

    CheckResult {
        check: Check::Runtime,
        status,
        message,
    }
}

fn check_privilege(profile: &HostProfile) -> CheckResult {
    let (status, message) = if !profile.has_docker && !profile.has_podman {
        (
            CheckStatus::Pass,
            "skipped (no container runtime)".to_string(),
        )
    } else if profile.engine_access {
        (CheckStatus::Pass, "engine reachable without sudo".to_string())
    } else {
        (
            CheckStatus::Warn,
            "no passwordless engine access; commands will be run through sudo".to_string(),
        )
    };

    CheckResult {
        check: Check::Privilege,
        status,
        message,
    }
}

fn check_connectivity(profile: &HostProfile) -> CheckResult {
    let (status, message) = if profile.internet_reachable {
        (CheckStatus::Pass, "internet reachable".to_string())
    } else {
        (CheckStatus::Fail, "internet unreachable".to_string())
    };

    CheckResult {
        check: Check::Connectivity,
        status,
        message,
    }
}

fn check_nat(profile: &HostProfile) -> CheckResult {
    let (status, message) = match (profile.local_ip, profile.public_ip) {
        (Some(local), Some(public)) if local == public => (
            CheckStatus::Pass,
            format!("directly reachable at {}", public),
        ),
        (Some(local), Some(public)) => (
            CheckStatus::Warn,
            format!("behind NAT ({} locally, {} publicly)", local, public),
        ),
        _ => (
            CheckStatus::Warn,
            "could not determine local/public address pair".to_string(),
        ),
    };

    CheckResult {
        check: Check::Nat,
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::OsKind;
    use std::net::{IpAddr, Ipv4Addr};

    fn profile() -> HostProfile {
        HostProfile {
            hostname: "test-host".to_string(),
            os_kind: OsKind::Debian,
            arch: "x86_64".to_string(),
            cpu_threads: 8,
            mem_gb: 16,
            disk_free_gb: 100,
            has_docker: true,
            has_podman: false,
            engine_access: true,
            local_ip: Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))),
            public_ip: Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))),
            internet_reachable: true,
        }
    }

    #[test]
    fn healthy_host_is_clean() {
        let verdict = evaluate(&profile(), &Thresholds::default());
        assert!(verdict.is_clean());
    }

    #[test]
    fn minimum_host_warns_on_cpu_and_memory() {
        let mut p = profile();
        p.cpu_threads = 2;
        p.mem_gb = 2;
        p.disk_free_gb = 25;

        let verdict = evaluate(&p, &Thresholds::default());
        assert!(verdict.errors.is_empty());
        let warned: Vec<Check> = verdict.warnings.iter().map(|w| w.check).collect();
        assert!(warned.contains(&Check::Cpu));
        assert!(warned.contains(&Check::Memory));
    }

    #[test]
    fn low_disk_and_missing_runtime_both_fail() {
        let mut p = profile();
        p.disk_free_gb = 5;
        p.has_docker = false;
        p.has_podman = false;

        let verdict = evaluate(&p, &Thresholds::default());
        let failed: Vec<Check> = verdict.errors.iter().map(|e| e.check).collect();
        assert!(failed.contains(&Check::Disk));
        assert!(failed.contains(&Check::Runtime));
    }

    #[test]
    fn below_minimum_cpu_is_an_error() {
        let mut p = profile();
        p.cpu_threads = 1;

        let verdict = evaluate(&p, &Thresholds::default());
        assert!(verdict.has_errors());
        assert_eq!(verdict.errors[0].check, Check::Cpu);
    }

    #[test]
    fn unreachable_internet_is_an_error() {
        let mut p = profile();
        p.internet_reachable = false;

        let verdict = evaluate(&p, &Thresholds::default());
        assert!(verdict
            .errors
            .iter()
            .any(|e| e.check == Check::Connectivity));
    }

    #[test]
    fn nat_mismatch_is_a_warning() {
        let mut p = profile();
        p.public_ip = Some(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)));

        let verdict = evaluate(&p, &Thresholds::default());
        assert!(verdict.errors.is_empty());
        assert!(verdict.warnings.iter().any(|w| w.check == Check::Nat));
    }

    #[test]
    fn undeterminable_public_ip_is_a_warning() {
        let mut p = profile();
        p.public_ip = None;

        let verdict = evaluate(&p, &Thresholds::default());
        assert!(verdict.warnings.iter().any(|w| w.check == Check::Nat));
    }

    #[test]
    fn missing_privilege_is_a_warning_not_an_error() {
        let mut p = profile();
        p.engine_access = false;

        let verdict = evaluate(&p, &Thresholds::default());
        assert!(verdict.errors.is_empty());
        assert!(verdict
            .warnings
            .iter()
            .any(|w| w.check == Check::Privilege));
    }

    #[test]
    fn emulated_arch_warns_unsupported_arch_fails() {
        let mut p = profile();
        p.arch = "aarch64".to_string();
        let verdict = evaluate(&p, &Thresholds::default());
        assert!(verdict.errors.is_empty());
        assert!(verdict.warnings.iter().any(|w| w.check == Check::Platform));

        p.arch = "riscv64".to_string();
        let verdict = evaluate(&p, &Thresholds::default());
        assert!(verdict.errors.iter().any(|e| e.check == Check::Platform));
    }

    #[test]
    fn results_follow_display_order() {
        let results = run_checks(&profile(), &Thresholds::default());
        let order: Vec<Check> = results.iter().map(|r| r.check).collect();
        assert_eq!(
            order,
            vec![
                Check::Platform,
                Check::Cpu,
                Check::Memory,
                Check::Disk,
                Check::Runtime,
                Check::Privilege,
                Check::Connectivity,
                Check::Nat,
            ]
        );
    }

    #[test]
    fn evaluation_is_order_insensitive_per_check() {
        // Same profile evaluated twice yields the same verdict: the checks
        // share no state.
        let p = profile();
        let first = evaluate(&p, &Thresholds::default());
        let second = evaluate(&p, &Thresholds::default());
        assert_eq!(first.errors.len(), second.errors.len());
        assert_eq!(first.warnings.len(), second.warnings.len());
    }
}
