use crate::cli_args::MetricsArgs;
use crate::output::{print_data_or_text, print_metrics_pretty_table};
use crate::{apply_selection, load_config_for_command};
use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use contextweaver_core::{AppError, build_tree, weave::relative_display_path};
use log;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tiktoken_rs::{CoreBPE, cl100k_base};

#[derive(Debug, Serialize)]
pub struct ProjectMetrics {
    pub total_files: usize,
    pub total_lines: usize,
    pub total_bytes: u128,
    pub total_bytes_readable: String,
    pub estimated_tokens: usize,
    pub unreadable_files: usize,
    pub files_details: Vec<FileMetrics>,
}

#[derive(Debug, Serialize)]
pub struct FileMetrics {
    pub path: String,
    pub lines: usize,
    pub bytes: usize,
    pub bytes_readable: String,
    pub estimated_tokens: usize,
}

pub fn handle_metrics_command(args: MetricsArgs, quiet: bool) -> Result<()> {
    let (project_root, config) = load_config_for_command(&args.project_config)
        .context("Failed to load configuration for metrics command")?;
    let mode = args.filter.mode.unwrap_or(config.general.filter_mode);
    let rules = config.exclusion_rules();

    let master = build_tree(&project_root, mode, &rules)
        .with_context(|| format!("Failed to scan {}", project_root.display()))?;
    let selected = apply_selection(&master, &args.selection, &config, &config.preset_catalog())?;

    // Without any selection source, measure everything the filter kept.
    let files: Vec<PathBuf> = if selected == 0
        && args.selection.is_empty()
        && config.general.default_preset.is_none()
    {
        log::info!("No selection given; measuring every file in the tree.");
        master.files().map(|f| f.path().to_path_buf()).collect()
    } else {
        master.selected_paths()
    };

    if files.is_empty() && args.format_output.format.is_none() {
        if !quiet {
            println!("No files selected to calculate metrics.");
        }
        return Ok(());
    }

    log::debug!("Calculating metrics for {} files...", files.len());
    let metrics = calculate_metrics(&files, master.path())?;
    log::debug!("Metrics calculation complete.");

    if args.format_output.format.is_none() {
        print_metrics_pretty_table(&metrics)
    } else {
        print_data_or_text(&metrics, String::new, &args.format_output, "ProjectMetrics")
    }
}

fn calculate_metrics(files: &[PathBuf], project_root: &Path) -> Result<ProjectMetrics> {
    let bpe = cl100k_base().map_err(|e| AppError::TikToken(e.to_string()))?;

    // Order of `files` is kept; unreadable files come back as None.
    let measured: Vec<Option<FileMetrics>> = files
        .par_iter()
        .map(|path| measure_file(path, project_root, &bpe))
        .collect();

    let unreadable_files = measured.iter().filter(|m| m.is_none()).count();
    let files_details: Vec<FileMetrics> = measured.into_iter().flatten().collect();

    let total_lines = files_details.iter().map(|f| f.lines).sum();
    let total_bytes: u128 = files_details.iter().map(|f| f.bytes as u128).sum();
    let estimated_tokens = files_details.iter().map(|f| f.estimated_tokens).sum();

    Ok(ProjectMetrics {
        total_files: files_details.len(),
        total_lines,
        total_bytes,
        total_bytes_readable: readable_size(total_bytes),
        estimated_tokens,
        unreadable_files,
        files_details,
    })
}

fn measure_file(path: &Path, project_root: &Path, bpe: &CoreBPE) -> Option<FileMetrics> {
    let content = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            log::warn!("Skipping unreadable file {}: {}", path.display(), e);
            return None;
        }
    };
    let bytes = content.len();
    Some(FileMetrics {
        path: relative_display_path(path, project_root),
        lines: content.lines().count(),
        bytes,
        bytes_readable: readable_size(bytes as u128),
        estimated_tokens: bpe.encode_ordinary(&content).len(),
    })
}

fn readable_size(bytes: u128) -> String {
    Byte::from_u128(bytes)
        .unwrap_or_default()
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_and_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "one\ntwo\n").unwrap();
        fs::write(root.join("b.txt"), "three").unwrap();
        let files = vec![root.join("a.txt"), root.join("missing.txt"), root.join("b.txt")];

        let metrics = calculate_metrics(&files, root).unwrap();
        assert_eq!(metrics.total_files, 2);
        assert_eq!(metrics.unreadable_files, 1);
        assert_eq!(metrics.total_lines, 3);
        assert_eq!(metrics.total_bytes, 13);
        let paths: Vec<&str> = metrics.files_details.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
        assert!(metrics.estimated_tokens > 0);
    }
}
