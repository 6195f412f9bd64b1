// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotlink::{
    backup::SnapshotOutcome,
    config::Config,
    path::default_config_path,
    Dotfiles, Timestamp,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use std::{fs::write, path::PathBuf, process::exit, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "dotlink [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Directory holding dotfiles to deploy.
    #[arg(short, long, global = true, value_name = "dir")]
    pub source: Option<PathBuf>,

    /// Directory to deploy dotfiles into.
    #[arg(short, long, global = true, value_name = "dir")]
    pub target: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<bool> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };

        let mut config = Config::load(&config_path)?;
        if let Some(source) = self.source {
            config.source_dir = source;
        }
        if let Some(target) = self.target {
            config.target_dir = target;
        }

        match self.command {
            Command::Deploy(opts) => run_deploy(config, opts),
            Command::Status => run_status(config),
            Command::Remove(opts) => run_remove(config, opts),
            Command::Backup(opts) => run_backup(config, opts),
            Command::Init(opts) => run_init(config, config_path, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Link every dotfile into target directory, backing up what is in the way.
    #[command(override_usage = "dotlink deploy [options]")]
    Deploy(DeployOptions),

    /// Show link state of every dotfile.
    #[command(override_usage = "dotlink status [options]")]
    Status,

    /// Remove deployed links from target directory.
    #[command(override_usage = "dotlink remove [options]")]
    Remove(RemoveOptions),

    /// Archive dotfile targets holding real content, and prune old archives.
    #[command(override_usage = "dotlink backup [options]")]
    Backup(BackupOptions),

    /// Write configuration file with current settings.
    #[command(override_usage = "dotlink init [options]")]
    Init(InitOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeployOptions {
    /// Show what would be done without touching anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Also delete file backups made during deployment.
    #[arg(short, long)]
    pub backups: bool,

    /// Do not ask for confirmation before deleting backups.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BackupOptions {
    /// Directory to write snapshot archives into.
    #[arg(short, long, value_name = "dir")]
    pub root: Option<PathBuf>,

    /// Maximum number of snapshot archives to keep.
    #[arg(short, long, value_name = "count")]
    pub limit: Option<usize>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Overwrite existing configuration file.
    #[arg(short, long)]
    pub force: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match run() {
        Ok(true) => exit(0),
        Ok(false) => exit(1),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

fn run() -> Result<bool> {
    Cli::parse().run()
}

fn run_deploy(config: Config, opts: DeployOptions) -> Result<bool> {
    let dotfiles = Dotfiles::open(config)?;
    let timestamp = Timestamp::now();

    if opts.dry_run {
        let plan = dotfiles.plan(timestamp)?;
        for (name, action) in &plan.actions {
            println!("{:<32} {action}", name.to_string_lossy());
        }
        for skipped in &plan.skipped {
            println!("{:<32} ERROR: {}", skipped.name.to_string_lossy(), skipped.error);
        }

        return Ok(plan.skipped.is_empty());
    }

    let report = dotfiles.deploy(timestamp)?;
    for skipped in &report.skipped {
        error!(
            "{:?} not deployed ({:?}): {}",
            skipped.name.to_string_lossy(),
            skipped.error.kind(),
            skipped.error
        );
    }

    Ok(report.is_success())
}

fn run_status(config: Config) -> Result<bool> {
    let dotfiles = Dotfiles::open(config)?;
    let report = dotfiles.status()?;

    for (name, state) in &report.details {
        println!("{:<32} {state}", name.to_string_lossy());
    }
    for (name, err) in &report.failures {
        println!("{:<32} ERROR: {err}", name.to_string_lossy());
    }

    info!("{} ok, {} errors", report.ok, report.errors);

    Ok(report.is_success())
}

fn run_remove(config: Config, opts: RemoveOptions) -> Result<bool> {
    let dotfiles = Dotfiles::open(config)?;

    if opts.backups && !opts.yes {
        let confirmed = Confirm::new("Delete every file backup of managed dotfiles?")
            .with_default(false)
            .prompt()?;
        if !confirmed {
            warn!("nothing removed");
            return Ok(true);
        }
    }

    let report = dotfiles.remove(opts.backups)?;

    Ok(report.is_success())
}

fn run_backup(mut config: Config, opts: BackupOptions) -> Result<bool> {
    if let Some(root) = opts.root {
        config.backup.root = root;
    }
    if let Some(limit) = opts.limit {
        if limit == 0 {
            bail!("backup retention limit must be at least 1");
        }
        config.backup.retention_limit = limit;
    }

    let dotfiles = Dotfiles::open(config)?;

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {pos} staged  {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));
    let result = dotfiles.backup(Timestamp::now(), bar.clone());
    bar.finish_and_clear();
    let report = result?;

    match &report.snapshot {
        SnapshotOutcome::Created(record) => info!(
            "snapshot {:?}: {} files, {} bytes",
            record.archive.display(),
            record.files,
            record.bytes
        ),
        SnapshotOutcome::NothingToBackUp => warn!("no dotfile target holds real content"),
    }

    info!(
        "{} old snapshots removed, {} kept",
        report.cleanup.removed.len(),
        report.cleanup.kept
    );

    Ok(report.is_success())
}

fn run_init(config: Config, config_path: PathBuf, opts: InitOptions) -> Result<bool> {
    if config_path.exists() && !opts.force {
        bail!(
            "configuration file {:?} already exists, use --force to overwrite",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        mkdirp::mkdirp(parent)?;
    }

    write(&config_path, config.to_string())?;
    info!("wrote configuration to {:?}", config_path.display());

    Ok(true)
}
