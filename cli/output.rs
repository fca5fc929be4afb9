use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use contextweaver_core::output_formats::{self, OutputFormat};
use contextweaver_core::TreeNode;
use serde::Serialize;
use std::io::{self, Write};

use crate::cli_args::FormatOutputOpts;
use crate::commands::metrics::ProjectMetrics;

/// Serializes `data` in the requested structured format, or prints the plain
/// text rendering when no format was given.
pub fn print_data_or_text<T: Serialize>(
    data: &T,
    plain_text: impl FnOnce() -> String,
    format_opts: &FormatOutputOpts,
    root_name: &str,
) -> Result<()> {
    match &format_opts.format {
        None => write_to_stdout(&plain_text()),
        Some(name) => {
            let format: OutputFormat = name.parse()?;
            let content =
                output_formats::serialize(data, format, format_opts.pretty, root_name)?;
            write_to_stdout(&content)
        }
    }
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Indented text rendering with `[x]` / `[ ]` markers on files.
pub fn render_tree_text(root: &TreeNode) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}/\n", root.name()));
    render_children(root, 1, &mut out);
    out
}

fn render_children(node: &TreeNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for child in node.children() {
        if child.is_file() {
            let marker = if child.is_selected() { "[x]" } else { "[ ]" };
            out.push_str(&format!("{}{} {}\n", indent, marker, child.name()));
        } else {
            out.push_str(&format!("{}{}/\n", indent, child.name()));
            render_children(child, depth + 1, out);
        }
    }
}

pub fn print_metrics_pretty_table(metrics: &ProjectMetrics) -> Result<()> {
    println!();
    println!("{}", " Selection Metrics Summary ".green().bold().underline());
    println!(
        "{:<20} {}",
        "Selected Files:".green(),
        metrics.total_files.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Lines:".green(),
        metrics.total_lines.to_string().cyan()
    );
    println!(
        "{:<20} {}",
        "Total Size:".green(),
        metrics.total_bytes_readable.cyan()
    );
    println!(
        "{:<20} {}",
        "Est. Tokens:".green(),
        metrics.estimated_tokens.to_string().cyan()
    );
    if metrics.unreadable_files > 0 {
        println!(
            "{:<20} {}",
            "Unreadable:".yellow(),
            metrics.unreadable_files.to_string().yellow()
        );
    }

    if metrics.files_details.is_empty() {
        println!("\n{}", "(No files selected)".yellow());
    } else {
        println!("\n{}", " File Details ".green().bold().underline());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Path").fg(Color::Green),
            Cell::new("Lines").fg(Color::Green),
            Cell::new("Size").fg(Color::Green),
            Cell::new("Tokens").fg(Color::Green),
        ]);
        for file in &metrics.files_details {
            table.add_row(vec![
                Cell::new(&file.path).fg(Color::Cyan),
                Cell::new(file.lines).set_alignment(CellAlignment::Right),
                Cell::new(&file.bytes_readable)
                    .set_alignment(CellAlignment::Right)
                    .fg(Color::DarkGrey),
                Cell::new(file.estimated_tokens).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }
    println!();
    Ok(())
}
