mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use contextweaver_core::{AppError, Config, PresetCatalog, TreeNode};
use log;
use std::path::Path;
use std::process;

use cli_args::{Cli, Commands, ProjectConfigOpts, SelectionOpts};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);

            // Configuration and usage problems are always shown, even with -q.
            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }

            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::TomlSerialize(_)) => 1,
        Some(AppError::Io(_)) => 2,
        Some(AppError::Scan { .. }) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::FileWrite { .. }) => 2,
        Some(AppError::Validation(_)) => 5,
        Some(AppError::InvalidArgument(_)) => 5,
        Some(AppError::JsonSerialize(_)) => 6,
        Some(AppError::YamlError(_)) => 6,
        Some(AppError::XmlSerialize(_)) => 6,
        Some(AppError::TikToken(_)) => 8,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Weave(args) => {
                log::debug!("Executing 'weave' command...");
                commands::weave::handle_weave_command(args, quiet)?;
            }
            Commands::Tree(args) => {
                log::debug!("Executing 'tree' command...");
                commands::tree::handle_tree_command(args)?;
            }
            Commands::Metrics(args) => {
                log::debug!("Executing 'metrics' command...");
                commands::metrics::handle_metrics_command(args, quiet)?;
            }
            Commands::Presets(args) => {
                log::debug!("Executing 'presets' command...");
                commands::presets::handle_presets_command(args)?;
            }
            Commands::Config(args) => {
                log::debug!("Executing 'config' command...");
                commands::config::handle_config_command(args)?;
            }
        },
    }
    Ok(())
}

/// Resolves the project root and loads the config file the options point at.
pub fn load_config_for_command(
    project_opts: &ProjectConfigOpts,
) -> Result<(std::path::PathBuf, Config)> {
    let project_root = Config::determine_project_root(project_opts.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config_path = Config::resolve_config_path(
        &project_root,
        project_opts.config_file.as_ref(),
        project_opts.no_config,
    )
    .context("Failed to resolve configuration path")?;

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    log::trace!("Effective config: {:?}", config);
    Ok((project_root, config))
}

/// Applies `--select` / `--file` to a loaded tree, falling back to the
/// configured default preset when neither flag is given. Returns the number
/// of files selected.
pub fn apply_selection(
    tree: &TreeNode,
    selection: &SelectionOpts,
    config: &Config,
    catalog: &PresetCatalog,
) -> Result<usize> {
    if selection.is_empty() {
        if let Some(name) = &config.general.default_preset {
            let preset = catalog.resolve(name)?;
            log::info!("Applying default preset '{}'", preset.name());
            tree.select_by_preset(&preset);
        }
    }
    if let Some(selector) = selection.select.last() {
        let preset = catalog
            .resolve(selector)
            .with_context(|| format!("Failed to resolve selection '{}'", selector))?;
        let count = tree.select_by_preset(&preset);
        log::info!("Preset '{}' selected {} files", preset.name(), count);
    }
    for file in &selection.files {
        let path = resolve_against(tree.path(), file);
        if !tree.set_file_selected(&path, true) {
            return Err(AppError::InvalidArgument(format!(
                "'{}' is not a file of the filtered project tree",
                file.display()
            )))
            .context("Failed to apply --file selection");
        }
    }
    Ok(tree.files().filter(|f| f.is_selected()).count())
}

/// Joins relative paths onto `base` and canonicalizes when the target exists.
pub fn resolve_against(base: &Path, path: &Path) -> std::path::PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    joined.canonicalize().unwrap_or(joined)
}
