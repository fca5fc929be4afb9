use crate::cli_args::WeaveArgs;
use crate::{apply_selection, load_config_for_command, resolve_against};
use anyhow::{Context, Result, anyhow};
use colored::*;
use contextweaver_core::{AppError, Session, SessionEvent, WeaveResult, WeaveStatus};
use log;
use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn handle_weave_command(args: WeaveArgs, quiet: bool) -> Result<()> {
    let (project_root, config) = load_config_for_command(&args.project_config)
        .context("Failed to load configuration for weave command")?;
    let catalog = config.preset_catalog();

    let (mut session, events) = Session::from_config(&config);
    if let Some(mode) = args.filter.mode {
        session.set_filter_mode(mode);
    }

    log::debug!("Scanning {} ({} mode)", project_root.display(), session.filter_mode());
    session.select_root(&project_root);
    session.wait_idle();
    let mut files_in_tree = 0;
    for event in events.try_iter() {
        match event {
            SessionEvent::LoadFailed { message } => {
                return Err(anyhow!(AppError::Scan {
                    path: project_root.clone(),
                    source: io::Error::other(message),
                }));
            }
            SessionEvent::TreeReady { files, .. } => files_in_tree = files,
            _ => {}
        }
    }
    let master = session
        .master()
        .context("Project tree was not loaded")?;

    let selected = apply_selection(master, &args.selection, &config, &catalog)?;
    log::info!("{} of {} files selected", selected, files_in_tree);

    let destination = resolve_against(
        &project_root,
        args.out.as_deref().unwrap_or(config.output.filename.as_path()),
    );
    session
        .start_weave(&destination)
        .context("Failed to start weave")?;

    let result = wait_for_weave(&mut session, &events, quiet)?;
    report(&result, quiet);
    Ok(())
}

/// Pumps session outcomes and events until the weave reports back.
fn wait_for_weave(
    session: &mut Session,
    events: &Receiver<SessionEvent>,
    quiet: bool,
) -> Result<WeaveResult> {
    loop {
        session.process_pending();
        let event = match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("Session closed before the weave finished"));
            }
        };
        match event {
            SessionEvent::WeaveProgress { processed, total } => {
                log::debug!("Woven {}/{}", processed, total);
                if !quiet {
                    eprint!("\r{} {}/{}", "Weaving".dimmed(), processed, total);
                }
            }
            SessionEvent::WeaveFinished(result) => {
                if !quiet {
                    eprintln!();
                }
                return Ok(result);
            }
            SessionEvent::WeaveFailed { message } => {
                if !quiet {
                    eprintln!();
                }
                return Err(anyhow!(AppError::Io(io::Error::other(message))));
            }
            other => log::trace!("Ignoring session event: {:?}", other),
        }
    }
}

fn report(result: &WeaveResult, quiet: bool) {
    if quiet {
        return;
    }
    match result.status {
        WeaveStatus::Completed => println!(
            "{} Wove {} files into: {}",
            "✅".green(),
            result.processed,
            result.destination.display().to_string().blue()
        ),
        WeaveStatus::Cancelled => println!(
            "{} Cancelled after {} of {} files; partial output in: {}",
            "⚠".yellow(),
            result.processed,
            result.requested,
            result.destination.display().to_string().blue()
        ),
    }
    if result.read_errors > 0 {
        println!(
            "{} {} file(s) could not be read; see the error markers in the output.",
            "⚠".yellow(),
            result.read_errors
        );
    }
}
