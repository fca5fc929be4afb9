use crate::cli_args::PresetsArgs;
use crate::load_config_for_command;
use crate::output::print_data_or_text;
use anyhow::{Context, Result};
use colored::*;
use contextweaver_core::Preset;
use serde::Serialize;

#[derive(Serialize)]
struct PresetListing<'a> {
    default: Option<&'a str>,
    preset: Vec<&'a Preset>,
}

pub fn handle_presets_command(args: PresetsArgs) -> Result<()> {
    let (_, config) = load_config_for_command(&args.project_config)
        .context("Failed to load configuration for presets command")?;
    let catalog = config.preset_catalog();
    let listing = PresetListing {
        default: config.general.default_preset.as_deref(),
        preset: catalog.iter().collect(),
    };

    print_data_or_text(
        &listing,
        || render_presets_text(&listing),
        &args.format_output,
        "Presets",
    )
}

fn render_presets_text(listing: &PresetListing<'_>) -> String {
    let mut out = format!("{}\n", "Available presets:".bold());
    for preset in &listing.preset {
        let marker = if listing.default == Some(preset.name()) {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };
        out.push_str(&format!(
            "  - {}{}: {}\n",
            preset.name().blue(),
            marker,
            preset.suffixes().join(" ")
        ));
    }
    out
}
