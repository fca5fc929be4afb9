use crate::cli_args::ConfigArgs;
use crate::load_config_for_command;
use crate::output::write_to_stdout;
use anyhow::{Context, Result};
use contextweaver_core::Config;
use log;

pub fn handle_config_command(args: ConfigArgs) -> Result<()> {
    let config = if args.effective {
        let (_, config) = load_config_for_command(&args.project_config)
            .context("Failed to load configuration for config command")?;
        config
    } else {
        log::debug!("Printing default configuration.");
        Config::default()
    };
    let toml_string = config
        .to_toml_string()
        .context("Failed to serialize configuration to TOML")?;
    write_to_stdout(&toml_string)
}
