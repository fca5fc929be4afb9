pub mod config;
pub mod metrics;
pub mod presets;
pub mod tree;
pub mod weave;
