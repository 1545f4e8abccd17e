use std::path::{Path, PathBuf};
use std::sync::Mutex;

use breakpoints::{BreakpointManager, BreakpointOptions, Project, StagingFileResolver};
use clap::Parser;
use color_eyre::eyre::{self, Context};
use debugger::{AdapterOptions, RokuAdapter};
use launch_configuration::{ChosenLaunchConfiguration, LaunchConfiguration, ResolvedBrightScript};
use tracing_subscriber::filter::EnvFilter;

use crate::app::App;
use crate::breakpoint_arg::BreakpointArg;
use crate::session::SessionBreakpoints;

mod app;
mod breakpoint_arg;
mod command;
mod location;
mod session;

#[derive(Debug, Parser)]
struct Args {
    /// `launch.json` or `.code-workspace` file
    launch_configuration: PathBuf,

    #[clap(short, long)]
    name: String,

    /// `path:line`, may be repeated
    #[clap(short, long)]
    breakpoint: Vec<BreakpointArg>,

    /// Folder `${workspaceFolder}` refers to, defaults to the folder holding
    /// the configuration
    #[clap(short, long)]
    workspace_folder: Option<PathBuf>,
}

/// `.vscode/launch.json` belongs to the folder above `.vscode`.
fn default_workspace_folder(config_path: &Path) -> eyre::Result<PathBuf> {
    let config_path = config_path
        .canonicalize()
        .wrap_err("locating launch configuration")?;
    let parent = config_path.parent().unwrap_or(Path::new("/"));
    let folder = if parent.file_name().is_some_and(|name| name == ".vscode") {
        parent.parent().unwrap_or(parent)
    } else {
        parent
    };
    Ok(folder.to_path_buf())
}

fn load_configuration(args: &Args) -> eyre::Result<ResolvedBrightScript> {
    let config = launch_configuration::load_from_path(Some(&args.name), &args.launch_configuration)
        .wrap_err("loading launch configuration")?;
    let LaunchConfiguration::Brightscript(config) = match config {
        ChosenLaunchConfiguration::Specific(config) => config,
        ChosenLaunchConfiguration::NotFound => {
            eyre::bail!("no launch configuration named {:?}", args.name)
        }
        ChosenLaunchConfiguration::ToBeChosen(names) => {
            eyre::bail!("choose a launch configuration: {}", names.join(", "))
        }
    };

    let workspace_folder = match &args.workspace_folder {
        Some(folder) => folder.clone(),
        None => default_workspace_folder(&args.launch_configuration)?,
    };
    config
        .resolve(&workspace_folder)
        .wrap_err("resolving launch configuration")
}

async fn apply_bs_consts(config: &ResolvedBrightScript) -> eyre::Result<()> {
    if config.bs_const.is_empty() {
        return Ok(());
    }
    let manifest_path = config.staging_folder_path.join("manifest");
    let contents = tokio::fs::read_to_string(&manifest_path)
        .await
        .wrap_err_with(|| format!("reading {}", manifest_path.display()))?;
    let updated = breakpoints::manifest::update_bs_consts(&contents, &config.bs_const)
        .wrap_err("updating bs_const")?;
    tokio::fs::write(&manifest_path, updated)
        .await
        .wrap_err_with(|| format!("writing {}", manifest_path.display()))?;
    Ok(())
}

async fn instrument_staging(
    config: &ResolvedBrightScript,
    project: &Project,
    breakpoint_args: &[BreakpointArg],
) -> eyre::Result<SessionBreakpoints> {
    let mut session = SessionBreakpoints::new(BreakpointManager::new(
        Box::new(StagingFileResolver),
        BreakpointOptions {
            enable_source_maps: config.enable_source_maps,
        },
    ));

    for arg in breakpoint_args {
        if !session.add(arg).is_some_and(|breakpoint| breakpoint.verified) {
            println!("breakpoint at {}:{} cannot be set", arg.path.display(), arg.line);
        }
    }

    let manager = session.manager_mut();
    if config.stop_on_entry {
        manager
            .register_entry_breakpoint(&project.staging_folder_path)
            .await
            .wrap_err("adding entry breakpoint")?;
    }

    manager
        .write_breakpoints_for_project(project)
        .await
        .wrap_err("writing breakpoints")?;
    manager.lock_breakpoints(project);
    tracing::debug!("breakpoints written");
    Ok(session)
}

/// The staging folder only holds a copy made for this session.
async fn remove_staging_folder(config: &ResolvedBrightScript) {
    if config.retain_staging_folder {
        return;
    }
    let path = &config.staging_folder_path;
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed staging folder"),
        Err(e) => tracing::warn!(error = %e, path = %path.display(), "removing staging folder"),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install().context("installing color_eyre")?;
    let log_file = std::fs::File::create("log.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(log_file))
        .init();

    let args = Args::parse();
    let config = load_configuration(&args)?;
    tracing::debug!(name = %config.name, host = %config.host, "resolved launch configuration");

    let project = Project {
        root_dir: config.root_dir.clone(),
        source_dirs: config.source_dirs.clone(),
        staging_folder_path: config.staging_folder_path.clone(),
    };

    apply_bs_consts(&config).await?;
    let breakpoints = instrument_staging(&config, &project, &args.breakpoint).await?;

    let adapter = RokuAdapter::connect(
        &config.host,
        AdapterOptions {
            enable_debugger_auto_recovery: config.enable_debugger_auto_recovery,
            ..Default::default()
        },
    )
    .await
    .wrap_err("connecting to device")?;
    adapter.activate().await;
    println!("connected to {}, waiting for the channel to start", config.host);

    let mut app = App::new(
        adapter,
        breakpoints,
        config.staging_folder_path.clone(),
        config.console_output,
    );
    let result = app.run().await;
    app.shutdown().await;
    remove_staging_folder(&config).await;
    result
}
