// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use storage_provision::{ProvisionOutcome, config, execute_strategy, export_json, teardown};
use storage_sys::{Host, RecordingHost, SystemHost};
use storage_types::InstallPlan;

#[derive(Debug, Parser)]
#[command(name = "storage-provision")]
#[command(about = "Partition, compose, format and mount target disks for installation")]
#[command(version)]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Provision the disks named in a plan file
    Run {
        #[arg(long)]
        plan: PathBuf,
        /// Record the commands instead of executing them
        #[arg(long)]
        dry_run: bool,
        /// Write the captured identities here instead of stdout
        #[arg(long)]
        identities: Option<PathBuf>,
    },
    /// Print the commands a plan would issue
    Plan {
        #[arg(long)]
        plan: PathBuf,
    },
    /// Unmount and release everything a plan sets up
    Teardown {
        #[arg(long)]
        plan: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

fn require_root() -> Result<()> {
    if unsafe { libc::geteuid() } != 0 {
        tracing::error!("storage-provision must run as root");
        anyhow::bail!("refusing to modify disks without root privileges");
    }
    Ok(())
}

fn load(path: &Path) -> Result<InstallPlan> {
    let plan = config::load_plan(path)?;
    tracing::info!(
        "loaded plan {}: strategy {}, {} boot, disks {:?}",
        path.display(),
        plan.strategy,
        plan.boot_mode,
        plan.disks
    );
    Ok(plan)
}

fn print_transcript(host: &RecordingHost) {
    for action in host.actions() {
        println!("{action}");
    }
}

fn emit_identities(outcome: &ProvisionOutcome, destination: Option<&Path>) -> Result<()> {
    let json = export_json(&outcome.identities).context("failed to serialise identities")?;
    match destination {
        Some(path) => fs::write(path, format!("{json}\n"))
            .with_context(|| format!("failed to write identities to {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn provision<H: Host>(host: &mut H, plan: &InstallPlan) -> Result<ProvisionOutcome> {
    execute_strategy(host, plan).map_err(|error| {
        if error.is_precondition() {
            tracing::error!("plan rejected, no disk was touched: {error}");
        } else {
            tracing::error!("provisioning aborted, disks are left partially provisioned: {error}");
        }
        anyhow::Error::new(error)
    })
}

fn release<H: Host>(host: &mut H, plan: &InstallPlan) -> Result<()> {
    let report = teardown(host, plan);
    if report.is_clean() {
        return Ok(());
    }

    for failure in &report.failures {
        tracing::warn!("{failure}");
    }
    anyhow::bail!("teardown left {} object(s) in place", report.failures.len())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = storage_provision::logging::init(cli.log_file.as_deref())?;

    match cli.command {
        Command::Run {
            plan,
            dry_run,
            identities,
        } => {
            let plan = load(&plan)?;
            let outcome = if dry_run {
                let mut host = RecordingHost::new();
                let outcome = provision(&mut host, &plan)?;
                print_transcript(&host);
                outcome
            } else {
                require_root()?;
                provision(&mut SystemHost::new(), &plan)?
            };
            emit_identities(&outcome, identities.as_deref())
        }
        Command::Plan { plan } => {
            let plan = load(&plan)?;
            let mut host = RecordingHost::new();
            provision(&mut host, &plan)?;
            print_transcript(&host);
            Ok(())
        }
        Command::Teardown { plan, dry_run } => {
            let plan = load(&plan)?;
            if dry_run {
                let mut host = RecordingHost::new();
                release(&mut host, &plan)?;
                print_transcript(&host);
                Ok(())
            } else {
                require_root()?;
                release(&mut SystemHost::new(), &plan)
            }
        }
    }
}
