use clap::{Args, Parser, Subcommand};
use contextweaver_core::FilterMode;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        short = 'r',
        long = "root",
        help = "Specify the project directory (default: $PROJECT_ROOT or current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long = "config",
        help = "Specify path/filename of the TOML config file (default: .contextweaver/contextweaver.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Project Setup"
    )]
    pub config_file: Option<String>,

    #[arg(
        long = "no-config",
        help = "Disable loading any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Project Setup"
    )]
    pub no_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOpts {
    #[arg(
        short = 'm',
        long = "mode",
        value_name = "MODE",
        help = "Filtering mode: 'smart' prunes build and dependency folders, 'all' keeps them [default: from config, else smart].",
        help_heading = "Filtering"
    )]
    pub mode: Option<FilterMode>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SelectionOpts {
    #[arg(
        short = 's',
        long = "select",
        value_name = "PRESET",
        action = clap::ArgAction::Append,
        help = "Select files by preset name or comma-separated suffixes (e.g. 'code', '.rs,.toml'). Repeatable; the last one wins.",
        help_heading = "Selection"
    )]
    pub select: Vec<String>,

    #[arg(
        long = "file",
        value_name = "PATH",
        action = clap::ArgAction::Append,
        help = "Add a single file (relative to the root) to the selection. Repeatable.",
        help_heading = "Selection"
    )]
    pub files: Vec<PathBuf>,
}

impl SelectionOpts {
    pub fn is_empty(&self) -> bool {
        self.select.is_empty() && self.files.is_empty()
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct FormatOutputOpts {
    #[arg(short = 'f', long, help = "Set a structured output format.", value_name = "FORMAT", value_parser = ["json", "yaml", "xml"], help_heading = "Output Formatting")]
    pub format: Option<String>,

    #[arg(
        long,
        help = "Pretty-print JSON output.",
        help_heading = "Output Formatting"
    )]
    pub pretty: bool,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Weave selected project files into one text context.",
    long_about = "contextweaver scans a project directory, filters out noise (lockfiles, binaries, \nbuild and dependency folders), lets you select files by preset or by path, and \nconcatenates them into a single delimited text artifact for AI assistants.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  contextweaver weave --select code\n  contextweaver weave -r ~/proj --mode all --select .rs,.toml --out ctx.txt\n  contextweaver tree --flat --select docs\n  contextweaver metrics -f json",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "w",
        about = "Concatenate the selected files into one context file."
    )]
    Weave(WeaveArgs),

    #[command(
        visible_alias = "t",
        about = "Show the filtered project tree with selection markers."
    )]
    Tree(TreeArgs),

    #[command(
        visible_alias = "m",
        about = "Show size and token statistics for the selected files."
    )]
    Metrics(MetricsArgs),

    #[command(visible_alias = "p", about = "List the available selection presets.")]
    Presets(PresetsArgs),

    #[command(about = "Show the default configuration file structure.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WeaveArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filter: FilterOpts,
    #[clap(flatten)]
    pub selection: SelectionOpts,

    #[arg(
        short = 'o',
        long = "out",
        value_name = "PATH",
        help = "Destination file; relative paths resolve against the project root [default: woven_context.txt].",
        help_heading = "Output Control"
    )]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filter: FilterOpts,
    #[clap(flatten)]
    pub selection: SelectionOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,

    #[arg(
        long,
        help = "List every file directly under the root instead of nesting.",
        overrides_with = "nested",
        help_heading = "Display"
    )]
    pub flat: bool,

    #[arg(
        long,
        help = "Show the nested hierarchy even when the config enables flat view.",
        overrides_with = "flat",
        help_heading = "Display"
    )]
    pub nested: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MetricsArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filter: FilterOpts,
    #[clap(flatten)]
    pub selection: SelectionOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct PresetsArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,

    #[arg(
        long,
        help = "Show the effective configuration (defaults merged with the loaded file) instead of the defaults."
    )]
    pub effective: bool,
}
