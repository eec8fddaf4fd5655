//! Configuration for toolwire.
//!
//! Provides TOML-based configuration with:
//! - Named MCP server launch entries (`[[servers]]`), with built-in `git`
//!   and `aws-docs` entries when none are configured
//! - Timeout policy (`[timeouts]`) for handshake, listing, calls and shutdown
//! - Config file layering (user config dir + project-local overrides), with
//!   edits confined to the user layer

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_DIR_ENV, ConfigFiles, Layer, LayerOutcome, LayerReport, LoadedConfig,
    default_config_dir, edit_user_layer, read_layer,
};
pub use error::{ConfigError, EntryDefect, FileOp, Result};
pub use types::{ServerEntry, TimeoutConfig, ToolwireConfig};
