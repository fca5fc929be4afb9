use crate::cli_args::TreeArgs;
use crate::output::{print_data_or_text, render_tree_text};
use crate::{apply_selection, load_config_for_command};
use anyhow::{Context, Result};
use contextweaver_core::{build_tree, project};
use log;

pub fn handle_tree_command(args: TreeArgs) -> Result<()> {
    let (project_root, config) = load_config_for_command(&args.project_config)
        .context("Failed to load configuration for tree command")?;
    let mode = args.filter.mode.unwrap_or(config.general.filter_mode);
    let rules = config.exclusion_rules();

    let master = build_tree(&project_root, mode, &rules)
        .with_context(|| format!("Failed to scan {}", project_root.display()))?;
    apply_selection(&master, &args.selection, &config, &config.preset_catalog())?;

    let flatten = args.flat || (config.general.flat_view && !args.nested);
    log::debug!("Rendering tree (mode: {}, flat: {})", mode, flatten);
    let view = project(&master, flatten);

    print_data_or_text(
        view.as_ref(),
        || render_tree_text(&view),
        &args.format_output,
        "Tree",
    )
}
