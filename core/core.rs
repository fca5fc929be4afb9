pub mod config;
pub mod error;
pub mod gather;
pub mod output_formats;
pub mod rules;
pub mod selection;
pub mod session;
pub mod view;
pub mod weave;

pub use config::Config;
pub use error::{AppError, Result};
pub use gather::{EntryKind, FileSystemEntry, SelectionFlag, TreeNode, build_tree};
pub use output_formats::OutputFormat;
pub use rules::presets::{Preset, PresetCatalog};
pub use rules::{ExclusionRules, FilterMode};
pub use selection::{SelectionSnapshot, SelectionSummary};
pub use session::{Session, SessionEvent};
pub use view::project;
pub use weave::{CancelToken, WeaveRequest, WeaveResult, WeaveStatus, weave};
